//! Storage contract for the coordination kernel.
//!
//! Any backend offering per-key get/set/delete, single-field queries, and a
//! snapshot-isolated transaction with conflict-driven re-invocation can sit
//! behind these traits. The kernel never locks; the transaction contract is
//! the only serialization mechanism it relies on.

use std::cmp::Ordering;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// A stored document: a flat JSON object keyed by field name.
pub type Document = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The transaction body kept conflicting with concurrent writers until
    /// the store's internal retry budget ran out.
    #[error("transaction gave up after {attempts} conflicting attempts")]
    TransactionContention { attempts: u32 },
    #[error("document codec error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("store backend error: {0}")]
    Backend(String),
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Serialize a value into a document, rejecting non-object shapes.
pub fn to_document<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(StoreError::Backend(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

pub fn from_document<T: DeserializeOwned>(doc: &Document) -> Result<T, StoreError> {
    Ok(serde_json::from_value(serde_json::Value::Object(
        doc.clone(),
    ))?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gt,
    Lt,
}

/// Single-field predicate. Documents missing the field, or holding a value
/// of a different type, never match.
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: serde_json::Value,
}

impl Filter {
    pub fn matches(&self, doc: &Document) -> bool {
        let Some(actual) = doc.get(&self.field) else {
            return false;
        };
        match compare_values(actual, &self.value) {
            Some(ord) => match self.op {
                FilterOp::Eq => ord == Ordering::Equal,
                FilterOp::Gt => ord == Ordering::Greater,
                FilterOp::Lt => ord == Ordering::Less,
            },
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// A filter + order + limit read. A filterless query lists the collection.
#[derive(Debug, Clone)]
pub struct Query {
    pub filter: Option<Filter>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn all() -> Self {
        Self {
            filter: None,
            order_by: None,
            limit: None,
        }
    }

    pub fn filter(field: impl Into<String>, op: FilterOp, value: impl Into<serde_json::Value>) -> Self {
        Self {
            filter: Some(Filter {
                field: field.into(),
                op,
                value: value.into(),
            }),
            order_by: None,
            limit: None,
        }
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Compares two JSON values of the same scalar type. Numbers compare
/// numerically, strings lexicographically, booleans false < true.
/// Cross-type comparisons are undefined and return None.
pub fn compare_values(a: &serde_json::Value, b: &serde_json::Value) -> Option<Ordering> {
    use serde_json::Value;
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Sorts and truncates query hits per the query's order/limit clauses.
/// Documents missing the sort field sort after those that have it.
pub fn apply_order_and_limit(mut rows: Vec<(String, Document)>, query: &Query) -> Vec<(String, Document)> {
    if let Some((field, direction)) = &query.order_by {
        rows.sort_by(|(_, a), (_, b)| {
            let ord = match (a.get(field), b.get(field)) {
                (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            match direction {
                Direction::Ascending => ord,
                Direction::Descending => ord.reverse(),
            }
        });
    }
    if let Some(limit) = query.limit {
        rows.truncate(limit);
    }
    rows
}

/// Reads and staged writes available inside a transaction body.
///
/// Reads observe the consistent snapshot taken when the body was invoked;
/// they do not see the body's own staged writes. Writes are buffered and
/// applied atomically at commit.
pub trait Transaction {
    fn get(&mut self, collection: &str, key: &str) -> Result<Option<Document>, StoreError>;
    fn query(&mut self, collection: &str, query: &Query) -> Result<Vec<(String, Document)>, StoreError>;
    fn set(&mut self, collection: &str, key: &str, doc: Document);
    fn delete(&mut self, collection: &str, key: &str);
}

/// A re-runnable unit of work. The store may invoke it several times, so it
/// must only capture-and-overwrite; any external side effect before commit
/// would be repeated.
pub type TransactionBody<'a> = dyn FnMut(&mut dyn Transaction) -> Result<(), StoreError> + 'a;

/// The shared-store contract the kernel is written against.
pub trait DocumentStore: Send + Sync {
    fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError>;

    /// Upsert
    fn set(&self, collection: &str, key: &str, doc: Document) -> Result<(), StoreError>;

    /// Idempotent; deleting an absent key is a no-op.
    fn delete(&self, collection: &str, key: &str) -> Result<(), StoreError>;

    fn query(&self, collection: &str, query: &Query) -> Result<Vec<(String, Document)>, StoreError>;

    /// Runs `body` inside a snapshot-isolated transaction. When a concurrent
    /// writer invalidates anything the body read, the store re-invokes the
    /// body from scratch against a fresh snapshot, up to an internal budget,
    /// then fails with [`StoreError::TransactionContention`].
    fn run_transaction(&self, body: &mut TransactionBody<'_>) -> Result<(), StoreError>;
}
