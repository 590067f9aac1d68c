//! Error types for pantry_tracker

use chrono::NaiveDate;
use rusqlite::ErrorCode;
use serde::Serialize;
use thiserror::Error;

use crate::models::{Category, ItemId};

/// A single rejected field of a candidate item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Candidate input that failed validation, with every offending field
#[derive(Debug, Clone, PartialEq, Eq, Default, Error)]
#[error("{}", join_fields(.fields))]
pub struct ValidationError {
    pub fields: Vec<FieldError>,
}

impl ValidationError {
    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Names of the rejected fields, in the order they were checked
    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.field).collect()
    }
}

fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Unified error type for pantry operations
#[derive(Debug, Error)]
pub enum PantryError {
    /// Malformed candidate input. Never retried, nothing was written.
    #[error("invalid item: {0}")]
    Validation(#[from] ValidationError),
    /// No current owner id is available
    #[error("not authenticated")]
    NotAuthenticated,
    /// The database is busy or locked; safe to retry reads
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    /// Item does not exist or belongs to another owner
    #[error("item {0} not found")]
    NotFound(ItemId),
    /// Another item of the same owner already holds this identity key
    #[error("an item named '{name}' in {category} expiring {expiry_date} already exists")]
    Conflict {
        name: String,
        expiry_date: NaiveDate,
        category: Category,
    },
    /// Any other database failure
    #[error("database error: {0}")]
    Store(#[source] rusqlite::Error),
    /// Filesystem error while preparing the database location
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PantryError {
    /// Whether the caller may retry the operation after backing off
    pub fn is_retryable(&self) -> bool {
        matches!(self, PantryError::StoreUnavailable(_))
    }
}

impl From<rusqlite::Error> for PantryError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                PantryError::StoreUnavailable(err.to_string())
            }
            _ => PantryError::Store(err),
        }
    }
}

/// Result alias for pantry operations
pub type Result<T> = std::result::Result<T, PantryError>;
