//! In-memory cache.

use crate::cache::LocalCache;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tether_types::StoreKey;
use tracing::warn;

/// A process-local cache.
///
/// Entries are kept as serialized text so that reads behave like the
/// durable cache, including the malformed-entry rule.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<StoreKey, String>>,
}

impl MemoryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores raw text under `key` without validating it.
    pub fn set_raw(&self, key: &StoreKey, raw: impl Into<String>) {
        self.entries().insert(key.clone(), raw.into());
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<StoreKey, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LocalCache for MemoryCache {
    fn get(&self, key: &StoreKey) -> Option<Value> {
        let raw = self.entries().get(key).cloned()?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "Ignoring malformed cache entry");
                None
            }
        }
    }

    fn set(&self, key: &StoreKey, value: &Value) {
        self.entries().insert(key.clone(), value.to_string());
    }

    fn remove(&self, key: &StoreKey) {
        self.entries().remove(key);
    }

    fn contains(&self, key: &StoreKey) -> bool {
        self.entries().contains_key(key)
    }
}
