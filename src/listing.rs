//! Filtering, sorting and expiry annotation of an owner's items.
//!
//! Works on an already-loaded item set; never reads from the store.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::error::ValidationError;
use crate::expiry::{classify, ExpiryStatus};
use crate::models::{Category, Item};

/// Which field the list is ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortKey {
    #[default]
    #[serde(rename = "name")]
    Name,
    #[serde(rename = "quantity")]
    Quantity,
    #[serde(rename = "expiryDate", alias = "expiry_date")]
    ExpiryDate,
}

impl SortKey {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "name" => Some(SortKey::Name),
            "quantity" => Some(SortKey::Quantity),
            "expiryDate" | "expiry_date" | "expiry" => Some(SortKey::ExpiryDate),
            _ => None,
        }
    }
}

/// Search text, optional category filter and sort key selected by the user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub search: String,
    pub category: Option<Category>,
    pub sort: SortKey,
}

impl ListQuery {
    /// Build a query from UI text; a blank category means "all categories"
    pub fn parse(search: &str, category: &str, sort: &str) -> Result<Self, ValidationError> {
        let mut errors = ValidationError::default();

        let category = if category.trim().is_empty() {
            None
        } else {
            let parsed = Category::from_name(category);
            if parsed.is_none() {
                errors.push("category", format!("unknown category '{category}'"));
            }
            parsed
        };

        let sort = if sort.trim().is_empty() {
            SortKey::default()
        } else {
            SortKey::from_name(sort).unwrap_or_else(|| {
                errors.push("sort", "must be one of: name, quantity, expiryDate");
                SortKey::default()
            })
        };

        if errors.is_empty() {
            Ok(Self {
                search: search.trim().to_string(),
                category,
                sort,
            })
        } else {
            Err(errors)
        }
    }
}

/// An item together with its expiry status at listing time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedItem {
    #[serde(flatten)]
    pub item: Item,
    pub status: ExpiryStatus,
}

/// Whether an item passes the search text and category filter
pub fn matches(item: &Item, query: &ListQuery) -> bool {
    let needle = query.search.to_lowercase();
    let name_ok = needle.is_empty() || item.name.to_lowercase().contains(&needle);
    let category_ok = query.category.map_or(true, |c| item.category == c);
    name_ok && category_ok
}

/// Base letters only: compatibility-decomposed, combining marks removed,
/// lowercased. "Éclair" and "eclair" share a key.
fn collation_key(name: &str) -> String {
    name.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Dictionary order for item names
///
/// Compares base letters first, then accents ("eclair" before "éclair"),
/// then case with lowercase first, then the raw text.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| {
            a.nfkd()
                .collect::<String>()
                .to_lowercase()
                .cmp(&b.nfkd().collect::<String>().to_lowercase())
        })
        .then_with(|| {
            a.chars()
                .map(char::is_uppercase)
                .cmp(b.chars().map(char::is_uppercase))
        })
        .then_with(|| a.cmp(b))
}

/// Filter then stable-sort a set of items
pub fn apply(items: &[Item], query: &ListQuery) -> Vec<Item> {
    let mut selected: Vec<Item> = items
        .iter()
        .filter(|item| matches(item, query))
        .cloned()
        .collect();

    match query.sort {
        SortKey::Name => selected.sort_by(|a, b| compare_names(&a.name, &b.name)),
        SortKey::Quantity => selected.sort_by_key(|item| item.quantity),
        SortKey::ExpiryDate => selected.sort_by_key(|item| item.expiry_date),
    }

    selected
}

/// Attach the expiry status of each item relative to `now`
pub fn annotate(items: Vec<Item>, now: NaiveDateTime) -> Vec<ListedItem> {
    items
        .into_iter()
        .map(|item| {
            let status = classify(item.expiry_date, now);
            ListedItem { item, status }
        })
        .collect()
}
