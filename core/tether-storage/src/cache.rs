//! The local cache contract.

use serde_json::Value;
use tether_types::StoreKey;

/// Synchronous, durable key → JSON storage.
///
/// All methods are total: implementations log their own failures and
/// report a malformed stored value as a miss.
pub trait LocalCache: Send + Sync {
    /// Returns the stored value, or `None` when absent or unreadable.
    fn get(&self, key: &StoreKey) -> Option<Value>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &StoreKey, value: &Value);

    /// Removes the entry for `key`. Removing a missing key is a no-op.
    fn remove(&self, key: &StoreKey);

    /// Returns whether an entry exists for `key`, readable or not.
    fn contains(&self, key: &StoreKey) -> bool;
}
