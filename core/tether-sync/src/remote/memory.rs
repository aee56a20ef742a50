//! In-memory remote store.
//!
//! Behaves like a real backend keyed by the mapping's conflict target, and
//! can be switched unavailable, slowed down or made to fail. Rows are
//! scoped to their owner the way row-level security scopes them: other
//! owners cannot read or delete them, and an upsert onto another owner's
//! row is rejected.

use super::store::{RemoteRow, RemoteStore, RowMapping};
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tether_types::{OwnerId, StoreKey};
use tracing::debug;

/// A remote store that keeps rows in process memory.
pub struct MemoryRemoteStore {
    mapping: RowMapping,
    rows: Mutex<HashMap<String, RemoteRow>>,
    available: AtomicBool,
    failing: AtomicBool,
    latency: Mutex<Option<Duration>>,
    loads: AtomicUsize,
    upserts: AtomicUsize,
    deletes: AtomicUsize,
    upserted: Mutex<Vec<Value>>,
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::with_mapping(RowMapping::module_state())
    }
}

impl MemoryRemoteStore {
    /// Creates an available, healthy store using the module-state mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store using a custom row mapping.
    pub fn with_mapping(mapping: RowMapping) -> Self {
        Self {
            mapping,
            rows: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
            failing: AtomicBool::new(false),
            latency: Mutex::new(None),
            loads: AtomicUsize::new(0),
            upserts: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            upserted: Mutex::new(Vec::new()),
        }
    }

    /// Toggles availability (configured + signed in).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// When set, every operation fails with a network error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delays every operation by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *lock(&self.latency) = latency;
    }

    /// Stores a row directly, bypassing counters and failure injection.
    pub fn seed(&self, owner: &OwnerId, key: &StoreKey, value: Value) {
        let row = self.mapping.build_row(owner, key, &value, Utc::now());
        lock(&self.rows).insert(row.id.clone(), row);
    }

    /// Returns the row for `(owner, key)`. A row with the same id held by
    /// another owner is not visible.
    pub fn row(&self, owner: &OwnerId, key: &StoreKey) -> Option<RemoteRow> {
        lock(&self.rows)
            .get(&self.mapping.row_id(owner, key))
            .filter(|row| row.owner_id == *owner)
            .cloned()
    }

    /// Number of stored rows.
    pub fn row_count(&self) -> usize {
        lock(&self.rows).len()
    }

    /// Number of `load` calls that reached the store.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Number of `upsert` calls that reached the store, failed ones included.
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    /// Number of `delete` calls that reached the store.
    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Payloads of successful upserts, oldest first.
    pub fn upserted_payloads(&self) -> Vec<Value> {
        lock(&self.upserted).clone()
    }

    async fn simulate(&self) -> SyncResult<()> {
        let latency = *lock(&self.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(SyncError::Network("simulated failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    fn provider_name(&self) -> &'static str {
        "memory"
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn load(&self, owner: &OwnerId, key: &StoreKey) -> SyncResult<Option<Value>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.simulate().await?;
        Ok(self.row(owner, key).map(|row| row.data))
    }

    async fn upsert(&self, owner: &OwnerId, key: &StoreKey, value: &Value) -> SyncResult<()> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.simulate().await?;

        let now = Utc::now();
        let fresh = self.mapping.build_row(owner, key, value, now);
        let mut rows = lock(&self.rows);
        match rows.get_mut(&fresh.id) {
            Some(existing) if existing.owner_id != *owner => {
                return Err(SyncError::Auth(format!(
                    "row {} belongs to another owner",
                    fresh.id
                )));
            }
            Some(existing) => {
                existing.key_or_title = fresh.key_or_title;
                existing.data = fresh.data;
                existing.updated_at = now;
            }
            None => {
                rows.insert(fresh.id.clone(), fresh);
            }
        }
        drop(rows);

        lock(&self.upserted).push(value.clone());
        debug!(key = %key, "Memory remote upsert");
        Ok(())
    }

    async fn delete(&self, owner: &OwnerId, key: &StoreKey) -> SyncResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.simulate().await?;
        let id = self.mapping.row_id(owner, key);
        let mut rows = lock(&self.rows);
        if rows.get(&id).is_some_and(|row| row.owner_id == *owner) {
            rows.remove(&id);
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
