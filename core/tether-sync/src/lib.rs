//! Local-first optimistic sync engine for tether.
//!
//! Keeps per-module state durable across restarts, usable offline and
//! eventually consistent with a remote authoritative store, without ever
//! blocking or failing the caller.
//!
//! # Architecture
//!
//! - **Local cache** ([`tether_storage::LocalCache`]): synchronous, durable,
//!   always written first.
//! - **Remote store** ([`remote::RemoteStore`]): keyed upsert/select/delete,
//!   used only when configured and an owner is signed in.
//! - **Coordinator** ([`SyncCoordinator`]): one-time load, echo suppression,
//!   debounced remote save for one key.
//! - **History** ([`HistoryStack`]): optional bounded undo/redo and named
//!   revisions.
//!
//! Failures of either store are logged and absorbed; the local cache stays
//! authoritative.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tether_storage::MemoryCache;
//! use tether_sync::{SyncConfig, SyncEngine};
//! use tether_types::StoreKey;
//!
//! # tokio_test::block_on(async {
//! let engine = SyncEngine::local_only(Arc::new(MemoryCache::new()), SyncConfig::default());
//! let key = StoreKey::new("proj_1").unwrap();
//! let mut store = engine.open(key, serde_json::json!({"title": "Draft"})).await;
//! store.set(serde_json::json!({"title": "Final"}));
//! assert_eq!(store.get()["title"], "Final");
//! # });
//! ```

mod config;
mod coordinator;
mod engine;
mod error;
pub mod history;
pub mod remote;
pub mod schema;
mod status;
mod store;

pub use config::{
    RemoteConfig, SyncConfig, DEFAULT_DEBOUNCE_MS, DEFAULT_UNDO_LIMIT, REMOTE_KEY_ENV,
    REMOTE_URL_ENV,
};
pub use coordinator::{LoadState, StoreRecord, SyncCoordinator, SyncStats};
pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use history::{HistorySnapshot, HistoryStack};
pub use remote::{
    ConflictTarget, DisabledRemote, MemoryRemoteStore, RemoteRow, RemoteStore, RestRemoteStore,
    RowMapping,
};
pub use schema::Entity;
pub use status::SyncStatus;
pub use store::SyncedStore;
