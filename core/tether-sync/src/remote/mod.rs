//! Remote store adapters.
//!
//! The coordinator talks to an authoritative backend only through
//! [`RemoteStore`]. Adapters are injected, so tests substitute the
//! in-memory store (unavailable, slow or always failing) without
//! touching the network.

pub mod memory;
pub mod rest;
pub mod store;

pub use memory::MemoryRemoteStore;
pub use rest::RestRemoteStore;
pub use store::{ConflictTarget, DisabledRemote, RemoteRow, RemoteStore, RowMapping};
