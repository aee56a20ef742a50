//! Consumer-facing store.
//!
//! [`SyncedStore`] is what feature modules hold: a value, a setter and,
//! optionally, undo/redo. Sync mechanics and failures stay inside the
//! coordinator.

use crate::coordinator::{LoadState, StoreRecord, SyncCoordinator, SyncStats};
use crate::history::{HistorySnapshot, HistoryStack};
use crate::schema::Entity;
use crate::status::SyncStatus;
use tether_types::SnapshotId;
use tokio::sync::watch;
use tracing::debug;

/// A persisted, synchronized value of type `T`.
pub struct SyncedStore<T: Entity> {
    coordinator: SyncCoordinator<T>,
    history: Option<HistoryStack<T>>,
}

impl<T: Entity> SyncedStore<T> {
    /// Wraps a coordinator. Call [`Self::load`] before use.
    pub fn new(coordinator: SyncCoordinator<T>) -> Self {
        Self {
            coordinator,
            history: None,
        }
    }

    /// Enables undo/redo and revisions, keeping `limit` undo entries.
    pub fn with_history(mut self, limit: usize) -> Self {
        self.history = Some(HistoryStack::new(limit));
        self
    }

    /// Loads the value once and reports it to the coordinator as observed.
    pub async fn load(&mut self) -> &T {
        if self.coordinator.state() == LoadState::Uninitialized {
            let value = self.coordinator.init().await.clone();
            self.coordinator.on_change(value);
        }
        self.coordinator.value()
    }

    /// Returns the current value.
    pub fn get(&self) -> &T {
        self.coordinator.value()
    }

    /// Replaces the value. Recorded for undo when history is enabled.
    pub fn set(&mut self, value: T) {
        if let Some(history) = self.history.as_mut() {
            history.record(self.coordinator.value());
        }
        self.coordinator.on_change(value);
    }

    /// Applies `updater` to a copy of the current value and stores the result.
    pub fn mutate(&mut self, updater: impl FnOnce(T) -> T) {
        let next = updater(self.coordinator.value().clone());
        self.set(next);
    }

    /// Restores the previous value. Returns false when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(history) = self.history.as_mut() else {
            return false;
        };
        let Some(previous) = history.undo(self.coordinator.value()) else {
            return false;
        };
        self.navigate(previous);
        true
    }

    /// Re-applies an undone value. Returns false when there is nothing to redo.
    pub fn redo(&mut self) -> bool {
        let Some(history) = self.history.as_mut() else {
            return false;
        };
        let Some(next) = history.redo(self.coordinator.value()) else {
            return false;
        };
        self.navigate(next);
        true
    }

    /// History navigation persists like an edit but never records undo.
    fn navigate(&mut self, value: T) {
        self.coordinator.on_change(value);
    }

    /// Saves a named revision of the current value. Returns `None` when
    /// history is not enabled.
    pub fn snapshot(
        &mut self,
        label: impl Into<String>,
        summary: impl Into<String>,
    ) -> Option<&HistorySnapshot<T>> {
        let history = self.history.as_mut()?;
        Some(history.snapshot(label, summary, self.coordinator.value()))
    }

    /// Adopts a revision as a new edit. Returns false for an unknown id.
    pub fn restore(&mut self, id: &SnapshotId) -> bool {
        let Some(payload) = self
            .history
            .as_ref()
            .and_then(|history| history.find(id))
            .map(|snapshot| snapshot.payload.clone())
        else {
            debug!(snapshot = %id, "Unknown revision");
            return false;
        };
        self.set(payload);
        true
    }

    /// Returns the history, if enabled.
    pub fn history(&self) -> Option<&HistoryStack<T>> {
        self.history.as_ref()
    }

    /// Resets to the default value and deletes the stored copies.
    pub fn clear(&mut self) {
        if let Some(history) = self.history.as_mut() {
            history.clear_steps();
        }
        self.coordinator.clear();
    }

    /// Sends an armed remote save immediately.
    pub async fn flush(&mut self) {
        self.coordinator.flush().await;
    }

    /// Cancels an armed remote save.
    pub fn dispose(&mut self) {
        self.coordinator.dispose();
    }

    pub fn status(&self) -> SyncStatus {
        self.coordinator.status()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.coordinator.subscribe()
    }

    pub fn stats(&self) -> SyncStats {
        self.coordinator.stats()
    }

    pub fn record(&self) -> StoreRecord<T> {
        self.coordinator.record()
    }

    pub fn has_pending_write(&self) -> bool {
        self.coordinator.has_pending_write()
    }
}
