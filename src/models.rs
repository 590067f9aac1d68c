use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Authenticated user who exclusively controls a set of items
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    /// Returns `None` for blank ids so a missing session never becomes an owner
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Store-assigned item identifier (SQLite rowid)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub i64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// The closed set of pantry categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Grains,
    Dairy,
    Snacks,
    Vegetables,
    Fruits,
    Beverages,
    Frozen,
    Other,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Grains,
        Category::Dairy,
        Category::Snacks,
        Category::Vegetables,
        Category::Fruits,
        Category::Beverages,
        Category::Frozen,
        Category::Other,
    ];

    /// Canonical name, as stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Grains => "Grains",
            Category::Dairy => "Dairy",
            Category::Snacks => "Snacks",
            Category::Vegetables => "Vegetables",
            Category::Fruits => "Fruits",
            Category::Beverages => "Beverages",
            Category::Frozen => "Frozen",
            Category::Other => "Other",
        }
    }

    /// Parse a category name, ignoring case and surrounding whitespace
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A quantity of a named good expiring on a date, owned by one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub owner_id: OwnerId,
    pub name: String,
    pub quantity: i64,
    pub expiry_date: NaiveDate,
    pub category: Category,
}

/// What a history entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    Added,
    Updated,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Added => "added",
            HistoryAction::Updated => "updated",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "added" => Some(HistoryAction::Added),
            "updated" => Some(HistoryAction::Updated),
            _ => None,
        }
    }
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Immutable audit record. Copies the item's fields instead of referencing it,
/// so it stays meaningful after the item is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub owner_id: OwnerId,
    pub item_name: String,
    /// The quantity submitted by the triggering operation, not the resulting total
    pub item_quantity: i64,
    pub expiry_date: NaiveDate,
    pub category: Category,
    pub action: HistoryAction,
    pub timestamp: DateTime<Utc>,
}

/// Form-like input exactly as the user typed it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCandidate {
    pub name: String,
    pub quantity: String,
    pub expiry_date: String,
    pub category: String,
}

/// A validated candidate item, ready for reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub quantity: i64,
    pub expiry_date: NaiveDate,
    pub category: Category,
}
