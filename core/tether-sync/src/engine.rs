//! Process-wide entry point.

use crate::config::SyncConfig;
use crate::coordinator::SyncCoordinator;
use crate::remote::{DisabledRemote, RemoteStore};
use crate::schema::Entity;
use crate::store::SyncedStore;
use std::sync::Arc;
use tether_storage::LocalCache;
use tether_types::{OwnerId, StoreKey};
use tracing::info;

/// Hands out stores sharing one local cache, one remote adapter and one owner.
#[derive(Clone)]
pub struct SyncEngine {
    local: Arc<dyn LocalCache>,
    remote: Arc<dyn RemoteStore>,
    owner: Option<OwnerId>,
    config: SyncConfig,
}

impl SyncEngine {
    /// Creates an engine over the given cache and remote adapter.
    pub fn new(
        local: Arc<dyn LocalCache>,
        remote: Arc<dyn RemoteStore>,
        config: SyncConfig,
    ) -> Self {
        info!(provider = remote.provider_name(), "Sync engine created");
        Self {
            local,
            remote,
            owner: None,
            config,
        }
    }

    /// Creates an engine that never contacts a remote store.
    pub fn local_only(local: Arc<dyn LocalCache>, config: SyncConfig) -> Self {
        Self::new(local, Arc::new(DisabledRemote), config)
    }

    /// Sets the signed-in owner.
    pub fn with_owner(mut self, owner: OwnerId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Signs in (`Some`) or out (`None`). Affects stores opened afterwards.
    pub fn set_owner(&mut self, owner: Option<OwnerId>) {
        self.owner = owner;
    }

    pub fn owner(&self) -> Option<OwnerId> {
        self.owner
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns whether stores opened now would reach the remote store.
    pub fn is_remote_enabled(&self) -> bool {
        self.owner.is_some() && self.remote.is_available()
    }

    /// Builds an uninitialized coordinator for `key`.
    pub fn coordinator<T: Entity>(&self, key: StoreKey, default: T) -> SyncCoordinator<T> {
        SyncCoordinator::new(
            self.owner,
            key,
            default,
            Arc::clone(&self.local),
            Arc::clone(&self.remote),
            self.config.clone(),
        )
    }

    /// Opens and loads a store for `key`.
    pub async fn open<T: Entity>(&self, key: StoreKey, default: T) -> SyncedStore<T> {
        let mut store = SyncedStore::new(self.coordinator(key, default));
        store.load().await;
        store
    }

    /// Opens and loads a store with undo/redo enabled.
    pub async fn open_with_history<T: Entity>(&self, key: StoreKey, default: T) -> SyncedStore<T> {
        let mut store =
            SyncedStore::new(self.coordinator(key, default)).with_history(self.config.undo_limit);
        store.load().await;
        store
    }
}
