//! SQLite-backed durable cache.
//!
//! One table, one row per key. Values are stored as JSON text so that a
//! corrupted or hand-edited row reads as a miss instead of an error.

use crate::cache::LocalCache;
use crate::error::StorageResult;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tether_types::StoreKey;
use tracing::{debug, warn};

/// Durable cache stored in a single SQLite file.
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

impl SqliteCache {
    /// Opens (or creates) a cache at the given path.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        debug!("Opened local cache at {}", path.display());
        Self::from_connection(conn)
    }

    /// Opens an in-memory cache (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            ",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Writes `value`, returning the error instead of logging it.
    pub fn try_set(&self, key: &StoreKey, value: &Value) -> StorageResult<()> {
        let text = serde_json::to_string(value)?;
        self.conn().execute(
            "INSERT OR REPLACE INTO cache_entries (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key.as_str(), text, chrono::Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    /// Reads the raw stored text for `key`.
    pub fn try_get_raw(&self, key: &StoreKey) -> StorageResult<Option<String>> {
        let raw = self
            .conn()
            .query_row(
                "SELECT value FROM cache_entries WHERE key = ?1",
                params![key.as_str()],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(raw)
    }

    /// Returns all stored keys in lexical order.
    pub fn keys(&self) -> StorageResult<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT key FROM cache_entries ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LocalCache for SqliteCache {
    fn get(&self, key: &StoreKey) -> Option<Value> {
        let raw = match self.try_get_raw(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %key, error = %e, "Local cache read failed");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "Ignoring malformed cache entry");
                None
            }
        }
    }

    fn set(&self, key: &StoreKey, value: &Value) {
        if let Err(e) = self.try_set(key, value) {
            warn!(key = %key, error = %e, "Local cache write failed");
        }
    }

    fn remove(&self, key: &StoreKey) {
        if let Err(e) = self.conn().execute(
            "DELETE FROM cache_entries WHERE key = ?1",
            params![key.as_str()],
        ) {
            warn!(key = %key, error = %e, "Local cache delete failed");
        }
    }

    fn contains(&self, key: &StoreKey) -> bool {
        matches!(self.try_get_raw(key), Ok(Some(_)))
    }
}
