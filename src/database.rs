//! Database operations for the pantry
//!
//! Uses parameterized queries exclusively (no SQL string concatenation).
//! Every query is scoped by owner id, so one owner can never read or modify
//! another owner's rows.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::time::Duration;

use crate::models::{Candidate, Category, HistoryAction, HistoryEntry, Item, ItemId, OwnerId};
use crate::validation::DATE_FORMAT;

/// Result type for database operations
pub type DbResult<T> = rusqlite::Result<T>;

/// Open (or create) the pantry database at `path`
///
/// Creates the parent directory, applies connection pragmas and initialises
/// the schema.
pub fn open(path: &Path, busy_timeout: Duration) -> crate::Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
            log::info!("Created directory: {}", parent.display());
        }
    }

    let conn = Connection::open(path)?;
    apply_pragmas(&conn, busy_timeout)?;
    init_schema(&conn)?;
    log::info!("Opened database: {}", path.display());
    Ok(conn)
}

/// Apply the pragmas every pantry connection runs with
///
/// The busy timeout bounds how long a write waits for another writer before
/// failing with `SQLITE_BUSY`.
pub fn apply_pragmas(conn: &Connection, busy_timeout: Duration) -> DbResult<()> {
    conn.busy_timeout(busy_timeout)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    Ok(())
}

/// Initialize the database schema
///
/// Creates tables if they don't exist:
/// - `items`: current pantry contents, one row per identity key
/// - `item_history`: append-only audit trail
pub fn init_schema(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id TEXT NOT NULL,
            name TEXT NOT NULL,
            quantity INTEGER NOT NULL CHECK (quantity >= 0),
            expiry_date TEXT NOT NULL,
            category TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            -- Identity key: at most one item per (owner, name, expiry, category)
            UNIQUE (owner_id, name, expiry_date, category)
        );

        CREATE INDEX IF NOT EXISTS idx_items_owner_expiry ON items(owner_id, expiry_date, id);

        CREATE TABLE IF NOT EXISTS item_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id TEXT NOT NULL,
            item_name TEXT NOT NULL,
            item_quantity INTEGER NOT NULL,
            expiry_date TEXT NOT NULL,
            category TEXT NOT NULL,
            action TEXT NOT NULL CHECK (action IN ('added', 'updated')),
            timestamp TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_item_history_owner_time ON item_history(owner_id, timestamp);

        CREATE TRIGGER IF NOT EXISTS item_history_no_update
        BEFORE UPDATE ON item_history
        BEGIN
            SELECT RAISE(ABORT, 'item_history is append-only');
        END;

        CREATE TRIGGER IF NOT EXISTS item_history_no_delete
        BEFORE DELETE ON item_history
        BEGIN
            SELECT RAISE(ABORT, 'item_history is append-only');
        END;
        ",
    )?;

    log::debug!("Database schema initialized");
    Ok(())
}

/// Look up the item holding an identity key
pub fn find_by_key(
    conn: &Connection,
    owner: &OwnerId,
    name: &str,
    expiry_date: NaiveDate,
    category: Category,
) -> DbResult<Option<Item>> {
    conn.query_row(
        "SELECT id, owner_id, name, quantity, expiry_date, category
         FROM items
         WHERE owner_id = ?1 AND name = ?2 AND expiry_date = ?3 AND category = ?4",
        params![
            owner.as_str(),
            name,
            format_date(expiry_date),
            category.as_str()
        ],
        row_to_item,
    )
    .optional()
}

/// Get one of the owner's items by id
pub fn get_item(conn: &Connection, owner: &OwnerId, id: ItemId) -> DbResult<Option<Item>> {
    conn.query_row(
        "SELECT id, owner_id, name, quantity, expiry_date, category
         FROM items
         WHERE owner_id = ?1 AND id = ?2",
        params![owner.as_str(), id.0],
        row_to_item,
    )
    .optional()
}

/// Insert a new item; the store assigns its id
pub fn insert_item(conn: &Connection, owner: &OwnerId, candidate: &Candidate) -> DbResult<ItemId> {
    conn.execute(
        "INSERT INTO items (owner_id, name, quantity, expiry_date, category)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            owner.as_str(),
            &candidate.name,
            candidate.quantity,
            format_date(candidate.expiry_date),
            candidate.category.as_str(),
        ],
    )?;
    Ok(ItemId(conn.last_insert_rowid()))
}

/// Set the quantity of an owned item
///
/// Returns `false` when no owned item has this id.
pub fn update_quantity(
    conn: &Connection,
    owner: &OwnerId,
    id: ItemId,
    quantity: i64,
) -> DbResult<bool> {
    let changed = conn.execute(
        "UPDATE items
         SET quantity = ?1, updated_at = datetime('now')
         WHERE owner_id = ?2 AND id = ?3",
        params![quantity, owner.as_str(), id.0],
    )?;
    Ok(changed > 0)
}

/// Replace every editable field of an owned item
///
/// Returns `false` when no owned item has this id.
pub fn update_item(
    conn: &Connection,
    owner: &OwnerId,
    id: ItemId,
    candidate: &Candidate,
) -> DbResult<bool> {
    let changed = conn.execute(
        "UPDATE items
         SET name = ?1, quantity = ?2, expiry_date = ?3, category = ?4,
             updated_at = datetime('now')
         WHERE owner_id = ?5 AND id = ?6",
        params![
            &candidate.name,
            candidate.quantity,
            format_date(candidate.expiry_date),
            candidate.category.as_str(),
            owner.as_str(),
            id.0,
        ],
    )?;
    Ok(changed > 0)
}

/// Permanently delete an owned item
///
/// Returns `false` when no owned item has this id.
pub fn delete_item(conn: &Connection, owner: &OwnerId, id: ItemId) -> DbResult<bool> {
    let changed = conn.execute(
        "DELETE FROM items WHERE owner_id = ?1 AND id = ?2",
        params![owner.as_str(), id.0],
    )?;
    Ok(changed > 0)
}

/// Append an audit record
pub fn append_history(conn: &Connection, entry: &HistoryEntry) -> DbResult<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO item_history
         (owner_id, item_name, item_quantity, expiry_date, category, action, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    stmt.execute(params![
        entry.owner_id.as_str(),
        &entry.item_name,
        entry.item_quantity,
        format_date(entry.expiry_date),
        entry.category.as_str(),
        entry.action.as_str(),
        format_timestamp(entry.timestamp),
    ])?;
    Ok(())
}

/// All of an owner's items, ordered by expiry date then id
pub fn list_by_owner(conn: &Connection, owner: &OwnerId) -> DbResult<Vec<Item>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, owner_id, name, quantity, expiry_date, category
         FROM items
         WHERE owner_id = ?1
         ORDER BY expiry_date ASC, id ASC",
    )?;
    let results: DbResult<Vec<Item>> = stmt
        .query_map(params![owner.as_str()], row_to_item)?
        .collect();
    results
}

/// An owner's full history, newest first
pub fn list_history(conn: &Connection, owner: &OwnerId) -> DbResult<Vec<HistoryEntry>> {
    let mut stmt = conn.prepare_cached(
        "SELECT owner_id, item_name, item_quantity, expiry_date, category, action, timestamp
         FROM item_history
         WHERE owner_id = ?1
         ORDER BY timestamp DESC, id DESC",
    )?;
    let results: DbResult<Vec<HistoryEntry>> = stmt
        .query_map(params![owner.as_str()], row_to_history)?
        .collect();
    results
}

/// Number of items an owner has
pub fn get_item_count(conn: &Connection, owner: &OwnerId) -> DbResult<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM items WHERE owner_id = ?1",
        params![owner.as_str()],
        |row| row.get(0),
    )
}

/// Number of history entries an owner has
pub fn get_history_count(conn: &Connection, owner: &OwnerId) -> DbResult<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM item_history WHERE owner_id = ?1",
        params![owner.as_str()],
        |row| row.get(0),
    )
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Fixed-width UTC timestamps, so text order equals time order
fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(
    idx: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

fn date_column(row: &Row<'_>, idx: usize) -> DbResult<NaiveDate> {
    let text: String = row.get(idx)?;
    NaiveDate::parse_from_str(&text, DATE_FORMAT).map_err(|e| conversion_error(idx, e))
}

fn category_column(row: &Row<'_>, idx: usize) -> DbResult<Category> {
    let text: String = row.get(idx)?;
    Category::from_name(&text)
        .ok_or_else(|| conversion_error(idx, format!("unknown category '{text}'")))
}

fn owner_column(row: &Row<'_>, idx: usize) -> DbResult<OwnerId> {
    let text: String = row.get(idx)?;
    OwnerId::new(text).ok_or_else(|| conversion_error(idx, "blank owner id"))
}

fn row_to_item(row: &Row<'_>) -> DbResult<Item> {
    Ok(Item {
        id: ItemId(row.get(0)?),
        owner_id: owner_column(row, 1)?,
        name: row.get(2)?,
        quantity: row.get(3)?,
        expiry_date: date_column(row, 4)?,
        category: category_column(row, 5)?,
    })
}

fn row_to_history(row: &Row<'_>) -> DbResult<HistoryEntry> {
    let action: String = row.get(5)?;
    let timestamp: String = row.get(6)?;
    Ok(HistoryEntry {
        owner_id: owner_column(row, 0)?,
        item_name: row.get(1)?,
        item_quantity: row.get(2)?,
        expiry_date: date_column(row, 3)?,
        category: category_column(row, 4)?,
        action: HistoryAction::from_name(&action)
            .ok_or_else(|| conversion_error(5, format!("unknown action '{action}'")))?,
        timestamp: DateTime::parse_from_rfc3339(&timestamp)
            .map_err(|e| conversion_error(6, e))?
            .with_timezone(&Utc),
    })
}
