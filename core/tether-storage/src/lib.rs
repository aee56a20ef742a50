//! Durable local cache for tether.
//!
//! The local cache is the ground truth whenever the remote store is
//! unconfigured, signed out or unreachable. It is a synchronous
//! key → JSON map with two properties every implementation keeps:
//!
//! - Reads and writes are total. A missing key and a malformed stored
//!   value both read as `None`; a failed write is logged, never returned.
//! - Keys are not namespaced by the cache. Callers pick collision-free keys
//!   (see [`tether_types::StoreKey::scoped`]).
//!
//! # Implementations
//!
//! - [`SqliteCache`]: a single SQLite file, survives process restarts.
//! - [`MemoryCache`]: a process-local map, for tests and ephemeral sessions.

mod cache;
mod error;
mod memory;
mod sqlite;

pub use cache::LocalCache;
pub use error::{StorageError, StorageResult};
pub use memory::MemoryCache;
pub use sqlite::SqliteCache;
