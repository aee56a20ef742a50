//! Error types for the sync layer.
//!
//! These errors travel between the remote adapters and the coordinator.
//! The coordinator logs and absorbs them; none reach consumer code through
//! [`crate::SyncedStore`].

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network error.
    #[error("network error: {0}")]
    Network(String),

    /// Authentication error (missing session, rejected credentials).
    #[error("authentication error: {0}")]
    Auth(String),

    /// The remote store answered with a non-success status.
    #[error("remote error {status}: {body}")]
    Remote { status: u16, body: String },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The remote store is unconfigured or the owner is signed out.
    #[error("remote store unavailable")]
    Unavailable,

    /// A stored payload could not be upgraded to the current schema.
    #[error("schema error: {0}")]
    Schema(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SyncError {
    /// Returns true if the error came from credentials rather than transport.
    pub fn is_auth(&self) -> bool {
        match self {
            SyncError::Auth(_) => true,
            SyncError::Remote { status, .. } => *status == 401 || *status == 403,
            _ => false,
        }
    }
}
