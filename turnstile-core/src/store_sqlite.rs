//! SQLite-backed [`DocumentStore`] implementation.
//! Documents persist across process restarts.
//!
//! Enable with the `sqlite` feature flag:
//! ```toml
//! turnstile-core = { path = "../turnstile-core", features = ["sqlite"] }
//! ```
//!
//! The connection sits behind a mutex and transactions run with IMMEDIATE
//! behavior, so a transaction body executes exactly once: concurrent writers
//! are serialized by the connection rather than by conflict retries. The
//! optimistic contract of [`DocumentStore::run_transaction`] is satisfied
//! trivially.

use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};

use crate::store::{
    Document, DocumentStore, Query, StoreError, Transaction, TransactionBody, apply_order_and_limit,
};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at the given path.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;

        // WAL mode for better concurrent read performance
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                key        TEXT NOT NULL,
                version    INTEGER NOT NULL,
                body       TEXT NOT NULL,
                PRIMARY KEY (collection, key)
            );
            CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Backend("sqlite connection lock poisoned".into()))
    }
}

fn parse_body(body: &str) -> Result<Document, StoreError> {
    Ok(serde_json::from_str(body)?)
}

fn get_via(conn: &Connection, collection: &str, key: &str) -> Result<Option<Document>, StoreError> {
    let body: Option<String> = conn
        .query_row(
            "SELECT body FROM documents WHERE collection = ?1 AND key = ?2",
            params![collection, key],
            |row| row.get(0),
        )
        .optional()?;
    body.as_deref().map(parse_body).transpose()
}

fn set_via(conn: &Connection, collection: &str, key: &str, doc: &Document) -> Result<(), StoreError> {
    let body = serde_json::to_string(doc)?;
    conn.execute(
        "INSERT INTO documents (collection, key, version, body) VALUES (?1, ?2, 1, ?3)
         ON CONFLICT (collection, key) DO UPDATE SET version = version + 1, body = excluded.body",
        params![collection, key, body],
    )?;
    Ok(())
}

fn delete_via(conn: &Connection, collection: &str, key: &str) -> Result<(), StoreError> {
    conn.execute(
        "DELETE FROM documents WHERE collection = ?1 AND key = ?2",
        params![collection, key],
    )?;
    Ok(())
}

fn query_via(conn: &Connection, collection: &str, query: &Query) -> Result<Vec<(String, Document)>, StoreError> {
    let mut stmt = conn.prepare("SELECT key, body FROM documents WHERE collection = ?1")?;
    let rows = stmt.query_map(params![collection], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut hits = Vec::new();
    for row in rows {
        let (key, body) = row?;
        let doc = parse_body(&body)?;
        let keep = match &query.filter {
            Some(filter) => filter.matches(&doc),
            None => true,
        };
        if keep {
            hits.push((key, doc));
        }
    }
    Ok(apply_order_and_limit(hits, query))
}

enum StagedWrite {
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

struct SqliteTransaction<'a> {
    conn: &'a Connection,
    writes: Vec<StagedWrite>,
}

impl Transaction for SqliteTransaction<'_> {
    fn get(&mut self, collection: &str, key: &str) -> Result<Option<Document>, StoreError> {
        get_via(self.conn, collection, key)
    }

    fn query(&mut self, collection: &str, query: &Query) -> Result<Vec<(String, Document)>, StoreError> {
        query_via(self.conn, collection, query)
    }

    fn set(&mut self, collection: &str, key: &str, doc: Document) {
        self.writes.push(StagedWrite::Set {
            collection: collection.to_string(),
            key: key.to_string(),
            doc,
        });
    }

    fn delete(&mut self, collection: &str, key: &str) {
        self.writes.push(StagedWrite::Delete {
            collection: collection.to_string(),
            key: key.to_string(),
        });
    }
}

impl DocumentStore for SqliteStore {
    fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError> {
        let conn = self.lock()?;
        get_via(&conn, collection, key)
    }

    fn set(&self, collection: &str, key: &str, doc: Document) -> Result<(), StoreError> {
        let conn = self.lock()?;
        set_via(&conn, collection, key, &doc)
    }

    fn delete(&self, collection: &str, key: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        delete_via(&conn, collection, key)
    }

    fn query(&self, collection: &str, query: &Query) -> Result<Vec<(String, Document)>, StoreError> {
        let conn = self.lock()?;
        query_via(&conn, collection, query)
    }

    fn run_transaction(&self, body: &mut TransactionBody<'_>) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut staged = {
            let mut txn = SqliteTransaction {
                conn: &tx,
                writes: Vec::new(),
            };
            body(&mut txn)?;
            txn.writes
        };

        for write in staged.drain(..) {
            match write {
                StagedWrite::Set { collection, key, doc } => set_via(&tx, &collection, &key, &doc)?,
                StagedWrite::Delete { collection, key } => delete_via(&tx, &collection, &key)?,
            }
        }
        tx.commit()?;
        Ok(())
    }
}
