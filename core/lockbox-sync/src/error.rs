//! Error types for the sync layer.

use lockbox_storage::StorageError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network error.
    #[error("network error: {0}")]
    Network(String),

    /// Protocol error (unexpected status or malformed body).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Authentication error.
    #[error("authentication error: {0}")]
    Auth(String),

    /// The entity class selector does not name a known class.
    #[error("invalid entity class: {0}")]
    InvalidEntityClass(String),

    /// A referenced entry does not exist on the remote side.
    #[error("not found: {0}")]
    NotFound(String),

    /// The remote side rejected a write because of a uniqueness conflict.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An adapter answered a batch with the wrong number of items. The
    /// pairing between request and response cannot be trusted.
    #[error("{operation} returned {actual} items for a batch of {expected}")]
    BatchMismatch {
        operation: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Entries were pushed but their remote links could not be recorded.
    #[error("remote link write-back failed: {0}")]
    WriteBack(String),

    /// A sync worker task panicked or was aborted.
    #[error("sync worker failed: {0}")]
    Worker(String),

    /// Timeout.
    #[error("operation timed out")]
    Timeout,

    /// The pass was cancelled.
    #[error("sync cancelled")]
    Cancelled,
}

impl From<StorageError> for SyncError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<lockbox_types::Error> for SyncError {
    fn from(err: lockbox_types::Error) -> Self {
        match err {
            lockbox_types::Error::InvalidEntityClass(class) => Self::InvalidEntityClass(class),
            other => Self::Protocol(other.to_string()),
        }
    }
}
