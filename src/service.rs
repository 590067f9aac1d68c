//! Shared pantry handle used by the CLI and the web server
//!
//! Wraps the connection in `Arc<Mutex<_>>` and republishes history after
//! every accepted write. Busy reads are retried with exponential backoff;
//! writes never are, since a retried submission could double-count a quantity.
//!
//! Every method blocks on the database (and may sleep between retries), so
//! async callers run them through `tokio::task::spawn_blocking`.

use chrono::{NaiveDateTime, Utc};
use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::config::Config;
use crate::database::{self, DbResult};
use crate::error::{PantryError, Result};
use crate::history_feed::{HistoryFeed, HistorySubscription};
use crate::listing::{annotate, apply, ListQuery, ListedItem};
use crate::models::{HistoryEntry, Item, ItemId, OwnerId, RawCandidate};
use crate::reconcile::{self, Submission};

const INITIAL_BACKOFF: Duration = Duration::from_millis(50);

pub struct Pantry {
    db: Arc<Mutex<Connection>>,
    feed: HistoryFeed,
    read_retries: u32,
}

impl Pantry {
    pub fn new(conn: Connection, read_retries: u32) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            feed: HistoryFeed::new(),
            read_retries,
        }
    }

    /// Open the configured database
    pub fn open(config: &Config) -> Result<Self> {
        let conn = database::open(&config.database, config.busy_timeout)?;
        Ok(Self::new(conn, config.read_retries))
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add or merge an item
    pub fn submit(&self, owner: &OwnerId, raw: &RawCandidate) -> Result<Submission> {
        let mut conn = self.conn();
        let submission = reconcile::submit(&mut conn, owner, raw, Utc::now())?;
        self.refresh_history(&conn, owner);
        Ok(submission)
    }

    /// Overwrite an item's fields
    pub fn edit(&self, owner: &OwnerId, id: ItemId, raw: &RawCandidate) -> Result<Item> {
        let mut conn = self.conn();
        let item = reconcile::edit_item(&mut conn, owner, id, raw, Utc::now())?;
        self.refresh_history(&conn, owner);
        Ok(item)
    }

    pub fn delete(&self, owner: &OwnerId, id: ItemId) -> Result<()> {
        let conn = self.conn();
        reconcile::delete_item(&conn, owner, id)
    }

    /// The owner's items in store order (expiry date, then id)
    pub fn items(&self, owner: &OwnerId) -> Result<Vec<Item>> {
        self.read(|conn| database::list_by_owner(conn, owner))
    }

    /// Filtered, sorted and annotated items for display
    pub fn list(
        &self,
        owner: &OwnerId,
        query: &ListQuery,
        now: NaiveDateTime,
    ) -> Result<Vec<ListedItem>> {
        let items = self.items(owner)?;
        let listed = annotate(apply(&items, query), now);
        log::debug!(
            "Listing {} of {} items for {}",
            listed.len(),
            items.len(),
            owner
        );
        Ok(listed)
    }

    /// The owner's full history, newest first
    pub fn history(&self, owner: &OwnerId) -> Result<Vec<HistoryEntry>> {
        self.read(|conn| database::list_history(conn, owner))
    }

    /// Subscribe to live history snapshots
    ///
    /// The starting snapshot is read under the same lock writers publish
    /// under, so no write can slip between the read and the subscription.
    pub fn subscribe_history(&self, owner: &OwnerId) -> Result<HistorySubscription> {
        let conn = self.conn();
        let current = database::list_history(&conn, owner)?;
        Ok(self.feed.subscribe(owner, current))
    }

    /// Publish the owner's history; called with the connection still held so
    /// snapshots leave in commit order
    fn refresh_history(&self, conn: &Connection, owner: &OwnerId) {
        if !self.feed.has_subscribers(owner) {
            return;
        }
        match database::list_history(conn, owner) {
            Ok(snapshot) => self.feed.publish(owner, snapshot),
            // The write itself committed; subscribers catch up on the next change
            Err(e) => log::warn!("Failed to refresh history for {}: {}", owner, e),
        }
    }

    /// Run a read, retrying with exponential backoff while the store is busy
    fn read<T>(&self, op: impl Fn(&Connection) -> DbResult<T>) -> Result<T> {
        let mut backoff = INITIAL_BACKOFF;
        let mut attempt = 0;
        loop {
            let result = {
                let conn = self.conn();
                op(&*conn).map_err(PantryError::from)
            };
            match result {
                Err(e) if e.is_retryable() && attempt < self.read_retries => {
                    attempt += 1;
                    log::warn!(
                        "Read failed ({}), retry {}/{} in {:?}",
                        e,
                        attempt,
                        self.read_retries,
                        backoff
                    );
                    std::thread::sleep(backoff);
                    backoff *= 2;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::init_schema;
    use crate::expiry::ExpiryStatus;
    use crate::models::{Category, HistoryAction};
    use chrono::NaiveDate;
    use std::cell::Cell;

    fn pantry() -> Pantry {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        Pantry::new(conn, 2)
    }

    fn owner(id: &str) -> OwnerId {
        OwnerId::new(id).unwrap()
    }

    fn raw(name: &str, quantity: &str, expiry: &str, category: &str) -> RawCandidate {
        RawCandidate {
            name: name.to_string(),
            quantity: quantity.to_string(),
            expiry_date: expiry.to_string(),
            category: category.to_string(),
        }
    }

    fn busy() -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        )
    }

    #[test]
    fn list_filters_and_annotates() {
        let pantry = pantry();
        let u1 = owner("u1");
        pantry.submit(&u1, &raw("Milk", "1", "2025-01-12", "Beverages")).unwrap();
        pantry.submit(&u1, &raw("Oat Milk", "2", "2025-01-09", "Dairy")).unwrap();
        pantry.submit(&u1, &raw("Rice", "3", "2025-06-01", "Grains")).unwrap();

        let query = ListQuery {
            search: "milk".to_string(),
            category: Some(Category::Dairy),
            ..Default::default()
        };
        let now = NaiveDate::from_ymd_opt(2025, 1, 10)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let listed = pantry.list(&u1, &query, now).unwrap();

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].item.name, "Oat Milk");
        assert_eq!(listed[0].status, ExpiryStatus::Expired);
    }

    #[test]
    fn history_follows_submissions() {
        let pantry = pantry();
        let u1 = owner("u1");
        pantry.submit(&u1, &raw("Rice", "2", "2025-01-10", "Grains")).unwrap();
        pantry.submit(&u1, &raw("Rice", "3", "2025-01-10", "Grains")).unwrap();

        let history = pantry.history(&u1).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().any(|h| h.action == HistoryAction::Updated && h.item_quantity == 3));
        assert!(history.iter().any(|h| h.action == HistoryAction::Added && h.item_quantity == 2));
    }

    #[tokio::test]
    async fn subscribers_see_new_snapshots() {
        let pantry = pantry();
        let u1 = owner("u1");
        let mut sub = pantry.subscribe_history(&u1).unwrap();
        assert!(sub.snapshot().is_empty());

        pantry.submit(&u1, &raw("Rice", "2", "2025-01-10", "Grains")).unwrap();

        let snapshot = sub.changed().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].item_name, "Rice");
    }

    #[test]
    fn concurrent_writers_leave_subscribers_on_latest_history() {
        let pantry = Arc::new(pantry());
        let u1 = owner("u1");
        let sub = pantry.subscribe_history(&u1).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|n| {
                let pantry = Arc::clone(&pantry);
                let u1 = u1.clone();
                std::thread::spawn(move || {
                    for _ in 0..5 {
                        let name = format!("Item {n}");
                        pantry.submit(&u1, &raw(&name, "1", "2025-01-10", "Other")).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(sub.snapshot().len(), 20);
        assert_eq!(*sub.snapshot(), pantry.history(&u1).unwrap());
    }

    #[test]
    fn delete_does_not_touch_history() {
        let pantry = pantry();
        let u1 = owner("u1");
        let added = pantry.submit(&u1, &raw("Rice", "2", "2025-01-10", "Grains")).unwrap();
        pantry.delete(&u1, added.item.id).unwrap();

        assert!(pantry.items(&u1).unwrap().is_empty());
        assert_eq!(pantry.history(&u1).unwrap().len(), 1);
    }

    #[test]
    fn busy_reads_are_retried() {
        let pantry = pantry();
        let calls = Cell::new(0);
        let value = pantry
            .read(|_| {
                calls.set(calls.get() + 1);
                if calls.get() < 3 {
                    Err(busy())
                } else {
                    Ok(7)
                }
            })
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn retries_are_bounded() {
        let pantry = pantry();
        let calls = Cell::new(0);
        let err = pantry
            .read(|_| -> DbResult<()> {
                calls.set(calls.get() + 1);
                Err(busy())
            })
            .unwrap_err();
        assert!(matches!(err, PantryError::StoreUnavailable(_)));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn other_read_errors_are_not_retried() {
        let pantry = pantry();
        let calls = Cell::new(0);
        let err = pantry
            .read(|_| -> DbResult<()> {
                calls.set(calls.get() + 1);
                Err(rusqlite::Error::QueryReturnedNoRows)
            })
            .unwrap_err();
        assert!(matches!(err, PantryError::Store(_)));
        assert_eq!(calls.get(), 1);
    }
}
