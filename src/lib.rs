//! Pantry Tracker - owner-scoped perishable goods inventory
//!
//! Tracks items by name, expiry date and category in SQLite, merges repeat
//! submissions into one record, flags items nearing expiry and keeps an
//! append-only history of every add and update.

pub mod config;
pub mod database;
pub mod error;
pub mod expiry;
pub mod history_feed;
pub mod identity;
pub mod listing;
pub mod models;
pub mod reconcile;
pub mod service;
pub mod validation;
pub mod web;

pub use error::{FieldError, PantryError, Result, ValidationError};
pub use expiry::{classify, ExpiryStatus, NEARING_WINDOW_DAYS};
pub use history_feed::{HistorySnapshot, HistorySubscription};
pub use identity::{require_owner, Identity, SessionIdentity};
pub use listing::{ListQuery, ListedItem, SortKey};
pub use models::{
    Candidate, Category, HistoryAction, HistoryEntry, Item, ItemId, OwnerId, RawCandidate,
};
pub use reconcile::Submission;
pub use service::Pantry;
