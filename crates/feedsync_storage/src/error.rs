//! Error types for repository operations.

use feedsync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for repository operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The repository does not offer the requested capability.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// A required value was missing or conflicts with stored state.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A protocol operation on a stored item failed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl StorageError {
    /// Creates a not supported error.
    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::NotSupported(message.into())
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Returns true if the error reports a missing capability.
    pub fn is_not_supported(&self) -> bool {
        matches!(self, Self::NotSupported(_))
    }
}
