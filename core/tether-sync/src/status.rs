//! Observable sync status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a store stands relative to the remote backend.
///
/// Purely informational: consumers may render it, but nothing in the
/// engine depends on anyone reading it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Not loaded yet.
    Idle,
    /// The local cache holds the only copy: the remote is unavailable or
    /// has no usable row yet.
    LocalOnly,
    /// A debounced remote save is armed.
    Pending,
    /// A remote save is in flight.
    Syncing,
    /// The last remote load or save succeeded.
    Synced,
    /// The last remote load or save failed; the local cache holds the value.
    Failed,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncStatus::Idle => "idle",
            SyncStatus::LocalOnly => "offline",
            SyncStatus::Pending => "pending",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Synced => "synced",
            SyncStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}
