//! Error type of the command-line tools.

use feedsync_engine::SyncError;
use feedsync_protocol::ProtocolError;
use feedsync_storage::StorageError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// A snapshot file could not be read or written.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// A snapshot file is not valid JSON.
    #[error("invalid snapshot: {0}")]
    Json(#[from] serde_json::Error),

    /// A sync round failed.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// A repository operation failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// An item operation failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The requested item does not exist.
    #[error("item {0} not found")]
    NotFound(String),

    /// A command line value was missing or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl CliError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
