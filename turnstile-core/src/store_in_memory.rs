//! In-memory [`DocumentStore`] backend.
//!
//! Documents carry a version stamp drawn from a store-wide counter, so a
//! delete-then-recreate never reuses a version. Transactions read from a
//! cloned snapshot, record the version of everything they observed, and
//! validate those versions under the write lock at commit. A failed
//! validation re-invokes the body against a fresh snapshot.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::store::{
    Document, DocumentStore, Query, StoreError, Transaction, TransactionBody, apply_order_and_limit,
};

const DEFAULT_TXN_BUDGET: u32 = 16;

#[derive(Clone)]
struct VersionedDoc {
    version: u64,
    doc: Document,
}

type Collections = HashMap<String, HashMap<String, VersionedDoc>>;

pub struct InMemoryStore {
    data: RwLock<Collections>,
    version_counter: AtomicU64,
    txn_budget: u32,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_transaction_budget(DEFAULT_TXN_BUDGET)
    }

    /// A store whose transactions give up after `attempts` conflicting
    /// invocations of the body.
    pub fn with_transaction_budget(attempts: u32) -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            version_counter: AtomicU64::new(1),
            txn_budget: attempts.max(1),
        }
    }

    fn next_version(&self) -> u64 {
        self.version_counter.fetch_add(1, Ordering::Relaxed)
    }

    fn read_guard(&self) -> Result<std::sync::RwLockReadGuard<'_, Collections>, StoreError> {
        self.data
            .read()
            .map_err(|_| StoreError::Backend("store lock poisoned".into()))
    }

    fn write_guard(&self) -> Result<std::sync::RwLockWriteGuard<'_, Collections>, StoreError> {
        self.data
            .write()
            .map_err(|_| StoreError::Backend("store lock poisoned".into()))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

struct ReadRecord {
    collection: String,
    key: String,
    /// None records an observed absence, which must still hold at commit.
    version: Option<u64>,
}

enum WriteOp {
    Set {
        collection: String,
        key: String,
        doc: Document,
    },
    Delete {
        collection: String,
        key: String,
    },
}

struct MemTransaction<'a> {
    snapshot: &'a Collections,
    reads: Vec<ReadRecord>,
    writes: Vec<WriteOp>,
}

impl MemTransaction<'_> {
    fn record_read(&mut self, collection: &str, key: &str, version: Option<u64>) {
        self.reads.push(ReadRecord {
            collection: collection.to_string(),
            key: key.to_string(),
            version,
        });
    }
}

impl Transaction for MemTransaction<'_> {
    fn get(&mut self, collection: &str, key: &str) -> Result<Option<Document>, StoreError> {
        let hit = self
            .snapshot
            .get(collection)
            .and_then(|docs| docs.get(key));
        self.record_read(collection, key, hit.map(|v| v.version));
        Ok(hit.map(|v| v.doc.clone()))
    }

    fn query(&mut self, collection: &str, query: &Query) -> Result<Vec<(String, Document)>, StoreError> {
        let rows = query_snapshot(self.snapshot, collection, query);
        for (key, _) in &rows {
            let version = self
                .snapshot
                .get(collection)
                .and_then(|docs| docs.get(key))
                .map(|v| v.version);
            self.record_read(collection, key, version);
        }
        Ok(rows)
    }

    fn set(&mut self, collection: &str, key: &str, doc: Document) {
        self.writes.push(WriteOp::Set {
            collection: collection.to_string(),
            key: key.to_string(),
            doc,
        });
    }

    fn delete(&mut self, collection: &str, key: &str) {
        self.writes.push(WriteOp::Delete {
            collection: collection.to_string(),
            key: key.to_string(),
        });
    }
}

fn query_snapshot(data: &Collections, collection: &str, query: &Query) -> Vec<(String, Document)> {
    let rows: Vec<(String, Document)> = data
        .get(collection)
        .map(|docs| {
            docs.iter()
                .filter(|(_, v)| match &query.filter {
                    Some(filter) => filter.matches(&v.doc),
                    None => true,
                })
                .map(|(key, v)| (key.clone(), v.doc.clone()))
                .collect()
        })
        .unwrap_or_default();
    apply_order_and_limit(rows, query)
}

impl DocumentStore for InMemoryStore {
    fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError> {
        let data = self.read_guard()?;
        Ok(data
            .get(collection)
            .and_then(|docs| docs.get(key))
            .map(|v| v.doc.clone()))
    }

    fn set(&self, collection: &str, key: &str, doc: Document) -> Result<(), StoreError> {
        let version = self.next_version();
        let mut data = self.write_guard()?;
        data.entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), VersionedDoc { version, doc });
        Ok(())
    }

    fn delete(&self, collection: &str, key: &str) -> Result<(), StoreError> {
        let mut data = self.write_guard()?;
        if let Some(docs) = data.get_mut(collection) {
            docs.remove(key);
        }
        Ok(())
    }

    fn query(&self, collection: &str, query: &Query) -> Result<Vec<(String, Document)>, StoreError> {
        let data = self.read_guard()?;
        Ok(query_snapshot(&data, collection, query))
    }

    fn run_transaction(&self, body: &mut TransactionBody<'_>) -> Result<(), StoreError> {
        for attempt in 1..=self.txn_budget {
            let snapshot = self.read_guard()?.clone();
            let mut txn = MemTransaction {
                snapshot: &snapshot,
                reads: Vec::new(),
                writes: Vec::new(),
            };
            // A body error is a non-conflict fault and aborts without retry.
            body(&mut txn)?;
            let MemTransaction { reads, writes, .. } = txn;

            let mut data = self.write_guard()?;
            let invalidated = reads.iter().any(|read| {
                let current = data
                    .get(&read.collection)
                    .and_then(|docs| docs.get(&read.key))
                    .map(|v| v.version);
                current != read.version
            });
            if invalidated {
                drop(data);
                tracing::trace!(attempt, "transaction snapshot invalidated, retrying");
                continue;
            }

            for op in writes {
                match op {
                    WriteOp::Set { collection, key, doc } => {
                        let version = self.next_version();
                        data.entry(collection)
                            .or_default()
                            .insert(key, VersionedDoc { version, doc });
                    }
                    WriteOp::Delete { collection, key } => {
                        if let Some(docs) = data.get_mut(&collection) {
                            docs.remove(&key);
                        }
                    }
                }
            }
            return Ok(());
        }
        Err(StoreError::TransactionContention {
            attempts: self.txn_budget,
        })
    }
}
