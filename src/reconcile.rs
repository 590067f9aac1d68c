//! Inventory reconciliation
//!
//! Decides whether a submitted item merges into an existing record or becomes
//! a new one, and writes the matching history entry. The lookup, the item
//! write and the history write share one `BEGIN IMMEDIATE` transaction: the
//! write lock is held from before the lookup until commit, so concurrent
//! submitters of the same identity key serialise instead of racing.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;

use crate::database::{
    append_history, delete_item as delete_row, find_by_key, get_item, insert_item, update_item,
    update_quantity,
};
use crate::error::{PantryError, Result, ValidationError};
use crate::models::{Candidate, HistoryAction, HistoryEntry, Item, ItemId, OwnerId, RawCandidate};
use crate::validation::validate_candidate;

/// Outcome of an accepted submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submission {
    /// The item after the merge or insert
    pub item: Item,
    pub action: HistoryAction,
}

/// Validate and reconcile a raw submission
///
/// Nothing is written if validation fails.
pub fn submit(
    conn: &mut Connection,
    owner: &OwnerId,
    raw: &RawCandidate,
    now: DateTime<Utc>,
) -> Result<Submission> {
    let candidate = validate_candidate(raw)?;
    submit_candidate(conn, owner, &candidate, now)
}

/// Reconcile an already-validated candidate
///
/// Resubmitting an existing identity key always adds to its quantity.
pub fn submit_candidate(
    conn: &mut Connection,
    owner: &OwnerId,
    candidate: &Candidate,
    now: DateTime<Utc>,
) -> Result<Submission> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let submission = submit_tx(&tx, owner, candidate, now)?;
    tx.commit()?;

    log::info!(
        "{} item {} '{}' for {}: quantity {}",
        submission.action,
        submission.item.id,
        submission.item.name,
        owner,
        submission.item.quantity
    );
    Ok(submission)
}

fn submit_tx(
    tx: &Transaction<'_>,
    owner: &OwnerId,
    candidate: &Candidate,
    now: DateTime<Utc>,
) -> Result<Submission> {
    let existing = find_by_key(
        tx,
        owner,
        &candidate.name,
        candidate.expiry_date,
        candidate.category,
    )?;

    let (item, action) = match existing {
        Some(mut item) => {
            log::debug!("Merging into item {} ({} on hand)", item.id, item.quantity);
            let total = item
                .quantity
                .checked_add(candidate.quantity)
                .ok_or_else(quantity_overflow)?;
            update_quantity(tx, owner, item.id, total)?;
            item.quantity = total;
            (item, HistoryAction::Updated)
        }
        None => {
            let id = insert_item(tx, owner, candidate).map_err(|e| key_error(e, candidate))?;
            let item = Item {
                id,
                owner_id: owner.clone(),
                name: candidate.name.clone(),
                quantity: candidate.quantity,
                expiry_date: candidate.expiry_date,
                category: candidate.category,
            };
            (item, HistoryAction::Added)
        }
    };

    append_history(tx, &history_entry(owner, candidate, action, now))?;
    Ok(Submission { item, action })
}

/// Replace the fields of an owned item with an absolute set of values
///
/// Fails with `Conflict` if another of the owner's items already holds the
/// new identity key, and with `NotFound` if the id is missing or foreign.
pub fn edit_item(
    conn: &mut Connection,
    owner: &OwnerId,
    id: ItemId,
    raw: &RawCandidate,
    now: DateTime<Utc>,
) -> Result<Item> {
    let candidate = validate_candidate(raw)?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    if get_item(&tx, owner, id)?.is_none() {
        return Err(PantryError::NotFound(id));
    }

    let holder = find_by_key(
        &tx,
        owner,
        &candidate.name,
        candidate.expiry_date,
        candidate.category,
    )?;
    if matches!(holder, Some(ref other) if other.id != id) {
        return Err(conflict(&candidate));
    }

    update_item(&tx, owner, id, &candidate).map_err(|e| key_error(e, &candidate))?;
    append_history(
        &tx,
        &history_entry(owner, &candidate, HistoryAction::Updated, now),
    )?;
    tx.commit()?;

    log::info!("Edited item {} '{}' for {}", id, candidate.name, owner);
    Ok(Item {
        id,
        owner_id: owner.clone(),
        name: candidate.name,
        quantity: candidate.quantity,
        expiry_date: candidate.expiry_date,
        category: candidate.category,
    })
}

/// Permanently delete one of the owner's items
///
/// Deletion is not recorded in the history.
pub fn delete_item(conn: &Connection, owner: &OwnerId, id: ItemId) -> Result<()> {
    if delete_row(conn, owner, id)? {
        log::info!("Deleted item {} for {}", id, owner);
        Ok(())
    } else {
        log::warn!("Delete of item {} by {} matched nothing", id, owner);
        Err(PantryError::NotFound(id))
    }
}

fn history_entry(
    owner: &OwnerId,
    candidate: &Candidate,
    action: HistoryAction,
    now: DateTime<Utc>,
) -> HistoryEntry {
    HistoryEntry {
        owner_id: owner.clone(),
        item_name: candidate.name.clone(),
        item_quantity: candidate.quantity,
        expiry_date: candidate.expiry_date,
        category: candidate.category,
        action,
        timestamp: now,
    }
}

fn quantity_overflow() -> ValidationError {
    let mut err = ValidationError::default();
    err.push("quantity", "total quantity is too large");
    err
}

fn conflict(candidate: &Candidate) -> PantryError {
    PantryError::Conflict {
        name: candidate.name.clone(),
        expiry_date: candidate.expiry_date,
        category: candidate.category,
    }
}

/// A unique-constraint failure means another writer took the identity key
fn key_error(err: rusqlite::Error, candidate: &Candidate) -> PantryError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            conflict(candidate)
        }
        _ => PantryError::from(err),
    }
}
