//! Error types for the sync engine.

use feedsync_protocol::ProtocolError;
use feedsync_storage::StorageError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
///
/// Any error aborts the round it happened in. Writes already made to either
/// repository are kept.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A required collaborator or value was missing.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The engine or an item is in a state the round cannot handle.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A repository operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Merging an item failed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Invalid state transition.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },
}

impl SyncError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Creates an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// Returns true if a repository lacked a capability the round needed.
    pub fn is_not_supported(&self) -> bool {
        matches!(self, SyncError::Storage(e) if e.is_not_supported())
    }
}
