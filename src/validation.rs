//! Candidate validation.
//!
//! Checks every field of a submitted item before the store is touched and
//! reports all problems at once, so a form can highlight each bad field.

use chrono::NaiveDate;
use log::{debug, warn};

use crate::error::ValidationError;
use crate::models::{Candidate, Category, RawCandidate};

/// Date format accepted for expiry dates (what an HTML date input sends).
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Validates a raw candidate.
///
/// # Returns
/// The typed candidate, or a `ValidationError` naming every offending field.
pub fn validate_candidate(raw: &RawCandidate) -> Result<Candidate, ValidationError> {
    debug!("Validating candidate '{}'", raw.name);
    let mut errors = ValidationError::default();

    let name = raw.name.trim();
    if name.is_empty() {
        errors.push("name", "must not be empty");
    }

    let quantity = match parse_quantity(&raw.quantity) {
        Some(q) => Some(q),
        None => {
            errors.push("quantity", "must be a whole number of 0 or more");
            None
        }
    };

    let expiry_date = match parse_expiry_date(&raw.expiry_date) {
        Some(d) => Some(d),
        None => {
            errors.push("expiry_date", "must be a valid date (YYYY-MM-DD)");
            None
        }
    };

    let category = match Category::from_name(&raw.category) {
        Some(c) => Some(c),
        None => {
            errors.push(
                "category",
                format!("must be one of: {}", category_names().join(", ")),
            );
            None
        }
    };

    match (quantity, expiry_date, category) {
        (Some(quantity), Some(expiry_date), Some(category)) if errors.is_empty() => Ok(Candidate {
            name: name.to_string(),
            quantity,
            expiry_date,
            category,
        }),
        _ => {
            warn!("Rejected candidate: {errors}");
            Err(errors)
        }
    }
}

/// Parses a non-negative integer quantity.
///
/// Fractions, signs other than a leading `+`, and blank input are rejected.
pub fn parse_quantity(input: &str) -> Option<i64> {
    input.trim().parse::<i64>().ok().filter(|q| *q >= 0)
}

/// Parses a calendar date in `YYYY-MM-DD` form.
pub fn parse_expiry_date(input: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT).ok()
}

fn category_names() -> Vec<&'static str> {
    Category::ALL.iter().map(|c| c.as_str()).collect()
}

#[cfg(test)]
#[path = "validation_tests.rs"]
mod tests;
