//! Undo/redo stack and named revisions.
//!
//! Pure bookkeeping: the stack never persists anything itself.
//! [`crate::SyncedStore`] routes every value it hands back through the
//! normal save path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tether_types::SnapshotId;

/// A named, immutable copy of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySnapshot<T> {
    pub id: SnapshotId,
    pub label: String,
    pub timestamp: DateTime<Utc>,
    pub payload: T,
    pub summary: String,
}

/// Bounded undo/redo history plus an unbounded list of revisions.
#[derive(Debug, Clone)]
pub struct HistoryStack<T> {
    undo: VecDeque<T>,
    redo: Vec<T>,
    snapshots: Vec<HistorySnapshot<T>>,
    limit: usize,
}

impl<T: Clone> HistoryStack<T> {
    /// Creates an empty stack keeping at most `limit` undo entries.
    pub fn new(limit: usize) -> Self {
        Self {
            undo: VecDeque::with_capacity(limit),
            redo: Vec::new(),
            snapshots: Vec::new(),
            limit,
        }
    }

    /// Records `current` before a new edit. Evicts the oldest entry beyond
    /// the limit and discards the redo history.
    pub fn record(&mut self, current: &T) {
        self.push_undo(current.clone());
        self.redo.clear();
    }

    /// Steps back. Returns the value to adopt, having saved `current` for redo.
    pub fn undo(&mut self, current: &T) -> Option<T> {
        let previous = self.undo.pop_back()?;
        self.redo.push(current.clone());
        Some(previous)
    }

    /// Steps forward. Returns the value to adopt, having saved `current` for undo.
    pub fn redo(&mut self, current: &T) -> Option<T> {
        let next = self.redo.pop()?;
        self.push_undo(current.clone());
        Some(next)
    }

    fn push_undo(&mut self, value: T) {
        self.undo.push_back(value);
        while self.undo.len() > self.limit {
            self.undo.pop_front();
        }
    }

    /// Appends a named revision of `payload`. Revisions are never evicted.
    pub fn snapshot(
        &mut self,
        label: impl Into<String>,
        summary: impl Into<String>,
        payload: &T,
    ) -> &HistorySnapshot<T> {
        self.snapshots.push(HistorySnapshot {
            id: SnapshotId::new(),
            label: label.into(),
            timestamp: Utc::now(),
            payload: payload.clone(),
            summary: summary.into(),
        });
        &self.snapshots[self.snapshots.len() - 1]
    }

    /// Revisions in creation order.
    pub fn snapshots(&self) -> &[HistorySnapshot<T>] {
        &self.snapshots
    }

    /// Looks up a revision.
    pub fn find(&self, id: &SnapshotId) -> Option<&HistorySnapshot<T>> {
        self.snapshots.iter().find(|snapshot| snapshot.id == *id)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Drops undo and redo entries. Revisions are kept.
    pub fn clear_steps(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}
