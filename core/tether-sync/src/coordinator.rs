//! Sync coordinator — one per logical entity.
//!
//! Owns the one-time load, the echo-suppression flag and the debounced
//! remote save for a single key.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized ──init()──▶ Loading ──▶ Ready ──on_change()──▶ Ready
//! ```
//!
//! `init` adopts the first value found in: the remote store (when available
//! and an owner is signed in), the local cache, the caller's default. A
//! value adopted from either store arms the echo flag, which swallows the
//! very next `on_change` so that a load is never written back as an edit.
//! A default is not "loaded", so the first change after it is persisted.
//!
//! # Saving
//!
//! Every accepted change is written to the local cache synchronously. If
//! the remote store is available, a save is then armed for the debounce
//! window; arming again cancels a save that has not fired yet, so a burst of
//! edits produces one upsert carrying the last value. A save that has
//! started is never cancelled.
//!
//! # Known limitation
//!
//! Conflicts resolve as last-writer-wins. Two devices editing the same key
//! overwrite each other in whatever order their upserts land, and nothing
//! orders upserts from one device beyond "last timer to fire".

use crate::config::SyncConfig;
use crate::remote::RemoteStore;
use crate::schema::{self, Entity};
use crate::status::SyncStatus;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tether_storage::LocalCache;
use tether_types::{OwnerId, StoreKey};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Load state of a coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Uninitialized,
    Loading,
    Ready,
}

/// Point-in-time view of a coordinator's record.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreRecord<T> {
    pub key: StoreKey,
    pub value: T,
    /// The value came from a store rather than the default.
    pub loaded: bool,
    /// A debounced remote save is armed or in flight.
    pub pending_remote_write: bool,
}

/// Counters for one coordinator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Writes to the local cache.
    pub local_writes: usize,
    /// Remote saves armed (including ones later replaced).
    pub saves_scheduled: usize,
    /// Remote upserts that succeeded.
    pub remote_writes: usize,
    /// Remote loads or upserts that failed.
    pub remote_failures: usize,
    /// Changes swallowed by the echo flag.
    pub echoes_suppressed: usize,
}

#[derive(Debug, Default)]
struct Counters {
    local_writes: AtomicUsize,
    saves_scheduled: AtomicUsize,
    remote_writes: AtomicUsize,
    remote_failures: AtomicUsize,
    echoes_suppressed: AtomicUsize,
}

impl Counters {
    fn snapshot(&self) -> SyncStats {
        SyncStats {
            local_writes: self.local_writes.load(Ordering::SeqCst),
            saves_scheduled: self.saves_scheduled.load(Ordering::SeqCst),
            remote_writes: self.remote_writes.load(Ordering::SeqCst),
            remote_failures: self.remote_failures.load(Ordering::SeqCst),
            echoes_suppressed: self.echoes_suppressed.load(Ordering::SeqCst),
        }
    }
}

/// State shared with spawned save tasks.
struct SaveContext {
    remote: Arc<dyn RemoteStore>,
    key: StoreKey,
    status: watch::Sender<SyncStatus>,
    counters: Counters,
    /// Bumped whenever a save is armed; only the newest save reports status.
    generation: AtomicU64,
}

impl SaveContext {
    fn set_status(&self, status: SyncStatus) {
        self.status.send_replace(status);
    }

    /// Starts a new generation, retiring every save or delete already issued.
    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    async fn save(&self, owner: OwnerId, payload: Value, generation: u64) {
        let current = || self.is_current(generation);

        // Availability can change while the timer runs (sign-out, backend
        // disabled); it gates the upsert itself, not just the arming.
        if !self.remote.is_available() {
            debug!(key = %self.key, "Remote unavailable when save fired, keeping value local");
            if current() {
                self.set_status(SyncStatus::LocalOnly);
            }
            return;
        }

        if current() {
            self.set_status(SyncStatus::Syncing);
        }

        match self.remote.upsert(&owner, &self.key, &payload).await {
            Ok(()) => {
                self.counters.remote_writes.fetch_add(1, Ordering::SeqCst);
                debug!(key = %self.key, "Remote save complete");
                if current() {
                    self.set_status(SyncStatus::Synced);
                }
            }
            Err(e) => {
                self.counters.remote_failures.fetch_add(1, Ordering::SeqCst);
                warn!(key = %self.key, error = %e, "Remote save failed, local cache remains authoritative");
                if current() {
                    self.set_status(SyncStatus::Failed);
                }
            }
        }
    }
}

/// An armed save. Dropping it cancels the timer if it has not fired.
struct PendingSave {
    cancel: oneshot::Sender<()>,
    handle: JoinHandle<()>,
    owner: OwnerId,
    payload: Value,
    generation: u64,
}

/// Coordinates load and save of one key between memory, the local cache
/// and the remote store.
pub struct SyncCoordinator<T: Entity> {
    owner: Option<OwnerId>,
    key: StoreKey,
    default: T,
    value: T,
    state: LoadState,
    loaded: bool,
    echo_pending: bool,
    pending: Option<PendingSave>,
    local: Arc<dyn LocalCache>,
    config: SyncConfig,
    ctx: Arc<SaveContext>,
}

impl<T: Entity> SyncCoordinator<T> {
    /// Creates an uninitialized coordinator for `key`.
    ///
    /// `owner` is the signed-in user; `None` keeps the coordinator local-only
    /// regardless of the remote store.
    pub fn new(
        owner: Option<OwnerId>,
        key: StoreKey,
        default: T,
        local: Arc<dyn LocalCache>,
        remote: Arc<dyn RemoteStore>,
        config: SyncConfig,
    ) -> Self {
        let (status, _) = watch::channel(SyncStatus::Idle);
        let ctx = Arc::new(SaveContext {
            remote,
            key: key.clone(),
            status,
            counters: Counters::default(),
            generation: AtomicU64::new(0),
        });

        Self {
            owner,
            key,
            value: default.clone(),
            default,
            state: LoadState::Uninitialized,
            loaded: false,
            echo_pending: false,
            pending: None,
            local,
            config,
            ctx,
        }
    }

    /// Returns the key.
    pub fn key(&self) -> &StoreKey {
        &self.key
    }

    /// Returns the in-memory value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Returns the load state.
    pub fn state(&self) -> LoadState {
        self.state
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Subscribes to status changes.
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.ctx.status.subscribe()
    }

    /// Returns the current status.
    pub fn status(&self) -> SyncStatus {
        *self.ctx.status.borrow()
    }

    /// Returns the counters.
    pub fn stats(&self) -> SyncStats {
        self.ctx.counters.snapshot()
    }

    /// Returns true while a remote save is armed or running.
    pub fn has_pending_write(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|pending| !pending.handle.is_finished())
    }

    /// Returns a snapshot of the record.
    pub fn record(&self) -> StoreRecord<T> {
        StoreRecord {
            key: self.key.clone(),
            value: self.value.clone(),
            loaded: self.loaded,
            pending_remote_write: self.has_pending_write(),
        }
    }

    /// Returns the owner if remote operations are currently possible.
    fn remote_owner(&self) -> Option<OwnerId> {
        let owner = self.owner?;
        if self.ctx.remote.is_available() {
            Some(owner)
        } else {
            None
        }
    }

    /// Performs the one-time load. Later calls return the current value.
    ///
    /// The adopted value must be reported back through [`Self::on_change`]
    /// once, as any observer of the value would; the echo flag swallows that
    /// observation when the value came from a store.
    pub async fn init(&mut self) -> &T {
        if self.state != LoadState::Uninitialized {
            return &self.value;
        }
        self.state = LoadState::Loading;

        let (loaded, status) = self.load().await;
        match loaded {
            Some(value) => {
                self.value = value;
                self.loaded = true;
                self.echo_pending = true;
            }
            None => {
                debug!(key = %self.key, "No stored value, using default");
                self.value = self.default.clone();
                self.loaded = false;
            }
        }

        self.ctx.set_status(status);
        self.state = LoadState::Ready;
        &self.value
    }

    /// `Synced` only when the remote value is adopted. A reachable remote
    /// without a usable row leaves the local cache as the only copy.
    async fn load(&self) -> (Option<T>, SyncStatus) {
        let mut status = SyncStatus::LocalOnly;

        if let Some(owner) = self.remote_owner() {
            match self.ctx.remote.load(&owner, &self.key).await {
                Ok(Some(raw)) => match schema::decode::<T>(raw) {
                    Ok(value) => {
                        debug!(key = %self.key, "Loaded from remote store");
                        return (Some(value), SyncStatus::Synced);
                    }
                    Err(e) => {
                        warn!(key = %self.key, error = %e, "Ignoring undecodable remote payload");
                    }
                },
                Ok(None) => {
                    debug!(key = %self.key, "No remote row");
                }
                Err(e) => {
                    self.ctx.counters.remote_failures.fetch_add(1, Ordering::SeqCst);
                    warn!(key = %self.key, error = %e, "Remote load failed, falling back to local cache");
                    status = SyncStatus::Failed;
                }
            }
        } else {
            debug!(key = %self.key, "Remote unavailable, loading from local cache");
        }

        let value = self.local.get(&self.key).and_then(|raw| {
            schema::decode::<T>(raw)
                .map_err(|e| {
                    warn!(key = %self.key, error = %e, "Ignoring undecodable cached payload");
                })
                .ok()
        });
        (value, status)
    }

    /// Observes a new value.
    ///
    /// Consumes the echo flag if set. Otherwise writes the value to the
    /// local cache and, when the remote is available, re-arms the debounced
    /// save. Changes observed before `init` completes are held in memory
    /// only; the load will replace them.
    pub fn on_change(&mut self, value: T) {
        self.value = value;

        if self.state != LoadState::Ready {
            debug!(key = %self.key, "Change observed before load, not persisting");
            return;
        }

        if std::mem::take(&mut self.echo_pending) {
            self.ctx
                .counters
                .echoes_suppressed
                .fetch_add(1, Ordering::SeqCst);
            debug!(key = %self.key, "Suppressed echo of loaded value");
            return;
        }

        self.persist();
    }

    fn persist(&mut self) {
        let payload = match schema::encode(&self.value) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to encode value, not persisting");
                return;
            }
        };

        self.local.set(&self.key, &payload);
        self.ctx.counters.local_writes.fetch_add(1, Ordering::SeqCst);

        match self.remote_owner() {
            Some(owner) => self.schedule_save(owner, payload),
            None => {
                self.pending = None;
                self.ctx.set_status(SyncStatus::LocalOnly);
            }
        }
    }

    fn schedule_save(&mut self, owner: OwnerId, payload: Value) {
        // Replacing the previous save drops its sender, which cancels it if
        // its timer has not fired.
        self.pending = None;

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(key = %self.key, "No async runtime, skipping remote save");
            return;
        };

        let generation = self.ctx.next_generation();
        let (cancel, cancelled) = oneshot::channel::<()>();
        let ctx = Arc::clone(&self.ctx);
        let debounce = self.config.debounce;
        let task_payload = payload.clone();

        let handle = runtime.spawn(async move {
            tokio::select! {
                biased;
                _ = cancelled => return,
                _ = tokio::time::sleep(debounce) => {}
            }
            ctx.save(owner, task_payload, generation).await;
        });

        self.ctx
            .counters
            .saves_scheduled
            .fetch_add(1, Ordering::SeqCst);
        self.ctx.set_status(SyncStatus::Pending);
        self.pending = Some(PendingSave {
            cancel,
            handle,
            owner,
            payload,
            generation,
        });
    }

    /// Runs an armed save now instead of waiting out the debounce window,
    /// and waits for a save already in flight.
    pub async fn flush(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        if pending.cancel.send(()).is_ok() {
            // Timer had not fired: the task exits on the cancel signal.
            let _ = pending.handle.await;
            self.ctx
                .save(pending.owner, pending.payload, pending.generation)
                .await;
        } else {
            let _ = pending.handle.await;
        }
    }

    /// Resets to the default value and removes it from both stores.
    ///
    /// Cancels any armed save and retires one already in flight, which then
    /// no longer reports status. The remote delete runs in the background
    /// and its failure is logged only.
    ///
    /// An upsert already on the wire is not recalled: if it completes after
    /// the delete, the remote row comes back with the pre-clear value.
    pub fn clear(&mut self) {
        self.pending = None;
        self.echo_pending = false;
        self.loaded = false;
        self.value = self.default.clone();
        self.local.remove(&self.key);
        let generation = self.ctx.next_generation();

        let Some(owner) = self.remote_owner() else {
            self.ctx.set_status(SyncStatus::LocalOnly);
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(key = %self.key, "No async runtime, skipping remote delete");
            return;
        };

        self.ctx.set_status(SyncStatus::Syncing);
        let ctx = Arc::clone(&self.ctx);
        runtime.spawn(async move {
            let status = match ctx.remote.delete(&owner, &ctx.key).await {
                Ok(()) => SyncStatus::Synced,
                Err(e) => {
                    ctx.counters.remote_failures.fetch_add(1, Ordering::SeqCst);
                    warn!(key = %ctx.key, error = %e, "Remote delete failed");
                    SyncStatus::Failed
                }
            };
            if ctx.is_current(generation) {
                ctx.set_status(status);
            }
        });
    }

    /// Cancels an armed save. The local cache already holds the value.
    pub fn dispose(&mut self) {
        if self.pending.take().is_some() {
            debug!(key = %self.key, "Disposed with a pending remote save");
        }
    }
}
