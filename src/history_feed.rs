//! Live history subscriptions
//!
//! Each owner with at least one subscriber gets a `watch` channel holding the
//! full, newest-first history snapshot. Subscribers always receive whole
//! snapshots, never diffs, and only the latest one if several changes land
//! between polls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

use crate::models::{HistoryEntry, OwnerId};

/// Full history snapshot shared between subscribers
pub type HistorySnapshot = Arc<Vec<HistoryEntry>>;

/// Registry of per-owner history channels
#[derive(Default)]
pub struct HistoryFeed {
    channels: Mutex<HashMap<OwnerId, watch::Sender<HistorySnapshot>>>,
}

impl HistoryFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to an owner's history, starting from `current`
    ///
    /// A `current` older than the stored snapshot is ignored; the subscriber
    /// starts from the newest one instead.
    pub fn subscribe(&self, owner: &OwnerId, current: Vec<HistoryEntry>) -> HistorySubscription {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        let rx = match channels.get(owner) {
            Some(tx) => {
                // The stored snapshot may be stale if every earlier subscriber left
                tx.send_if_modified(|snapshot| replace_if_newer(snapshot, current));
                tx.subscribe()
            }
            None => {
                let (tx, rx) = watch::channel(Arc::new(current));
                channels.insert(owner.clone(), tx);
                rx
            }
        };
        log::debug!("New history subscriber for {}", owner);
        HistorySubscription {
            owner: owner.clone(),
            rx,
        }
    }

    /// Whether anyone is currently listening to this owner's history
    pub fn has_subscribers(&self, owner: &OwnerId) -> bool {
        let channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        channels
            .get(owner)
            .is_some_and(|tx| tx.receiver_count() > 0)
    }

    /// Deliver a new snapshot to the owner's subscribers
    ///
    /// Channels nobody listens to any more are dropped here.
    pub fn publish(&self, owner: &OwnerId, snapshot: Vec<HistoryEntry>) {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = channels.get(owner) else {
            return;
        };
        if tx.receiver_count() == 0 {
            channels.remove(owner);
            return;
        }
        let entries = snapshot.len();
        if tx.send_if_modified(|current| replace_if_newer(current, snapshot)) {
            log::debug!(
                "Published {} history entries to {} subscriber(s) of {}",
                entries,
                tx.receiver_count(),
                owner
            );
        } else {
            log::debug!("Skipped stale history snapshot for {}", owner);
        }
    }
}

/// History is append-only, so a longer snapshot is always the newer one
fn replace_if_newer(stored: &mut HistorySnapshot, candidate: Vec<HistoryEntry>) -> bool {
    if candidate.len() <= stored.len() {
        return false;
    }
    *stored = Arc::new(candidate);
    true
}

/// Handle to one owner's live history
pub struct HistorySubscription {
    owner: OwnerId,
    rx: watch::Receiver<HistorySnapshot>,
}

impl HistorySubscription {
    /// The latest snapshot, without waiting
    pub fn snapshot(&self) -> HistorySnapshot {
        Arc::clone(&self.rx.borrow())
    }

    /// Wait for the next change and return the full snapshot
    ///
    /// Returns `None` once the feed is gone.
    pub async fn changed(&mut self) -> Option<HistorySnapshot> {
        self.rx.changed().await.ok()?;
        Some(Arc::clone(&self.rx.borrow_and_update()))
    }

    /// Stop receiving updates
    pub fn unsubscribe(self) {
        log::debug!("History subscriber for {} left", self.owner);
    }
}
