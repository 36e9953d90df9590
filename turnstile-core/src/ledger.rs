//! The admission queue ledger.
//!
//! One ephemeral entry per active caller, ordered by expiry deadline.
//! Deadlines are assigned at registration time with a fixed offset, so
//! earlier registrants hold earlier deadlines and deadline order
//! approximates arrival order. This is advisory: near-simultaneous
//! registrations can race, and holding the earliest deadline is not a lock.
//!
//! Expired entries are excluded from consideration but never evicted here;
//! stale entries stay in storage until something else clears the collection.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::store::{
    Direction, DocumentStore, FilterOp, Query, StoreError, from_document, to_document,
};
use crate::types::QueueEntry;

pub const QUEUE_COLLECTION: &str = "queue";

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[derive(Clone)]
pub struct QueueLedger {
    store: Arc<dyn DocumentStore>,
}

impl QueueLedger {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Upserts the caller's entry with `deadline = now + ttl`. Re-registering
    /// an existing label replaces its prior deadline.
    pub fn register(&self, label: &str, ttl: Duration) -> Result<(), StoreError> {
        let deadline = now_ms() + ttl.as_millis() as u64;
        let entry = QueueEntry::new(label, deadline);
        self.store
            .set(QUEUE_COLLECTION, label, to_document(&entry)?)?;
        tracing::debug!(label, deadline, "queue entry registered");
        Ok(())
    }

    /// Removes the caller's entry. A no-op when the label was never
    /// registered, so it is safe on every cleanup path.
    pub fn deregister(&self, label: &str) -> Result<(), StoreError> {
        self.store.delete(QUEUE_COLLECTION, label)
    }

    /// True iff `label` holds the earliest deadline among unexpired entries.
    /// False when no unexpired entries exist at all, including when the
    /// caller's own entry has already expired.
    pub fn is_my_turn(&self, label: &str) -> Result<bool, StoreError> {
        let now = now_ms();
        let query = Query::filter("deadline", FilterOp::Gt, now)
            .order_by("deadline", Direction::Ascending)
            .limit(1);
        let hits = self.store.query(QUEUE_COLLECTION, &query)?;
        match hits.first() {
            Some((_, doc)) => {
                let head: QueueEntry = from_document(doc)?;
                Ok(head.label == label)
            }
            None => Ok(false),
        }
    }
}
