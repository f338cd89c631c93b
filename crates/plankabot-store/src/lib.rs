//! SQLite implementation of `ShortIdStore`.
//!
//! One table maps long Planka card ids to sequential short ids. Rows are
//! never deleted, so a short id always points at the same card.
//! Blocking rusqlite calls run on `tokio::task::spawn_blocking`.

use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use plankabot_core::{domain::ShortId, errors::Error, short_id::ShortIdStore, Result};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS card_mappings (
    short_id INTEGER PRIMARY KEY AUTOINCREMENT,
    planka_card_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
";

/// The no-op update makes `RETURNING` yield the existing row on conflict, so
/// insert-or-fetch is one atomic statement.
const UPSERT: &str = "
INSERT INTO card_mappings (planka_card_id) VALUES (?1)
ON CONFLICT(planka_card_id) DO UPDATE SET planka_card_id = excluded.planka_card_id
RETURNING short_id
";

fn storage(context: &str, e: impl std::fmt::Display) -> Error {
    Error::Storage(format!("{context}: {e}"))
}

#[derive(Clone)]
pub struct SqliteShortIdStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteShortIdStore {
    /// Open (or create) the database file and ensure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| storage(&format!("create {}", parent.display()), e))?;
        }
        let conn = Connection::open(path).map_err(|e| storage("open database", e))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(|e| storage("set busy_timeout", e))?;
        let store = Self::init(conn)?;
        info!(path = %path.display(), "short id store ready");
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| storage("open database", e))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| storage("create schema", e))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| Error::Storage("connection mutex poisoned".to_string()))?;
            f(&guard).map_err(|e| storage("query", e))
        })
        .await
        .map_err(|e| storage("blocking task", e))?
    }
}

#[async_trait]
impl ShortIdStore for SqliteShortIdStore {
    async fn get_or_create(&self, long_id: &str) -> Result<ShortId> {
        let long_id = long_id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(UPSERT, params![long_id], |row| row.get::<_, i64>(0))
                .map(ShortId)
        })
        .await
    }

    async fn get_long_id(&self, short_id: ShortId) -> Result<Option<String>> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT planka_card_id FROM card_mappings WHERE short_id = ?1",
                params![short_id.0],
                |row| row.get::<_, String>(0),
            )
            .optional()
        })
        .await
    }
}
