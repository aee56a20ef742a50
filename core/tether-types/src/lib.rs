//! Core type definitions for tether.
//!
//! This crate defines the identifiers shared by the cache, the remote
//! adapters and the sync coordinator:
//! - Owner and snapshot identifiers (UUID v7)
//! - Store keys naming one logical entity inside an owner's namespace
//!
//! Entity payloads themselves are opaque JSON owned by the consumer modules.

mod ids;
mod key;

pub use ids::{OwnerId, SnapshotId};
pub use key::StoreKey;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid store key: {0}")]
    InvalidKey(String),
}
