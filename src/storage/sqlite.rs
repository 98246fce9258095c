use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::info;

use crate::error::StoreError;
use crate::storage::{KeyedStore, UpsertOutcome};

pub const SCRAPED_AT_FIELD: &str = "_scraped_at";

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(db_path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        // Fails here, not mid-run, when the file is not a usable database.
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: Arc::new(Mutex::new(Connection::open_in_memory()?)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, StoreError> {
        let conn = self.lock();
        let raw: Option<String> = conn
            .query_row(
                "SELECT document FROM documents WHERE collection = ?1 AND doc_key = ?2",
                params![collection, key],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl KeyedStore for SqliteStore {
    async fn migrate(&self) -> Result<(), StoreError> {
        let conn = self.lock();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                doc_key TEXT NOT NULL,
                document TEXT NOT NULL,
                scraped_at TEXT NOT NULL,
                PRIMARY KEY (collection, doc_key)
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_collection ON documents(collection)",
            [],
        )?;

        info!("Database migration completed");
        Ok(())
    }

    async fn upsert(&self, collection: &str, key: &str, document: &Value) -> Result<UpsertOutcome, StoreError> {
        let Value::Object(fields) = document else {
            return Err(StoreError::NotAnObject(key.to_string()));
        };

        let scraped_at = Utc::now().to_rfc3339();
        let mut stamped = fields.clone();
        stamped.insert(SCRAPED_AT_FIELD.to_string(), Value::String(scraped_at.clone()));
        let body = serde_json::to_string(&Value::Object(stamped))?;

        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM documents WHERE collection = ?1 AND doc_key = ?2",
                params![collection, key],
                |row| row.get(0),
            )
            .optional()?;

        tx.execute(
            "INSERT INTO documents (collection, doc_key, document, scraped_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(collection, doc_key)
             DO UPDATE SET document = excluded.document, scraped_at = excluded.scraped_at",
            params![collection, key, body, scraped_at],
        )?;
        tx.commit()?;

        Ok(if existing.is_some() {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        })
    }

    async fn count(&self, collection: &str) -> Result<u64, StoreError> {
        let conn = self.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }
}
