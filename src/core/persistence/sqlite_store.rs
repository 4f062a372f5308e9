use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

use super::document_store::DocumentStore;
use crate::core::date_key::now_ms;
use crate::error::{AnalyticsError, Result};
use crate::models::{Document, RemoteSettings};

/// Document store on a local SQLite file; the offline stand-in for a remote
/// document database.
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
}

fn open_write_conn(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_secs(2))?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    Ok(conn)
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS documents (
  collection TEXT NOT NULL,
  id TEXT NOT NULL,
  body TEXT NOT NULL,
  updated_at_ms INTEGER NOT NULL,
  PRIMARY KEY(collection, id)
);
"#,
    )?;
    Ok(())
}

fn parse_body(body: &str) -> Result<Document> {
    match serde_json::from_str::<Value>(body)? {
        Value::Object(map) => Ok(map),
        _ => Err(AnalyticsError::MalformedData(
            "stored document is not an object".to_string(),
        )),
    }
}

impl SqliteDocumentStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = open_write_conn(path)?;
        migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn from_settings(remote: &RemoteSettings) -> Result<Self> {
        match &remote.sqlite_path {
            Some(path) => Self::open(path),
            None => Err(AnalyticsError::Configuration(
                "sqlite backend needs storage.remote.sqlite_path".to_string(),
            )),
        }
    }

    pub fn count(&self, collection: &str) -> Result<u64> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection=?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(n.max(0) as u64)
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let conn = self.conn.lock();
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM documents WHERE collection=?1 AND id=?2",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()?;
        body.as_deref().map(parse_body).transpose()
    }

    fn merge(&self, collection: &str, id: &str, fields: &Document) -> Result<()> {
        let mut conn = self.conn.lock();
        // Take the write lock up front so a concurrent writer waits out the
        // busy timeout instead of failing on upgrade.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT body FROM documents WHERE collection=?1 AND id=?2",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()?;
        let mut doc = match existing.as_deref() {
            Some(body) => parse_body(body).unwrap_or_default(),
            None => Document::new(),
        };
        for (field, value) in fields {
            doc.insert(field.clone(), value.clone());
        }

        let body = serde_json::to_string(&Value::Object(doc))?;
        tx.execute(
            "INSERT INTO documents(collection, id, body, updated_at_ms) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(collection, id) DO UPDATE
             SET body=excluded.body, updated_at_ms=excluded.updated_at_ms",
            params![collection, id, body, now_ms() as i64],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM documents WHERE collection=?1 AND id=?2",
            params![collection, id],
        )?;
        Ok(())
    }
}
