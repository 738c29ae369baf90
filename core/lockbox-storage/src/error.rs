//! Error types for the storage layer.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Entry or account not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint would be violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Invalid data read from or written to the database.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// IO error (file system).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A previous holder of the connection panicked.
    #[error("connection lock poisoned")]
    LockPoisoned,
}

impl StorageError {
    /// Maps constraint violations to [`StorageError::Conflict`], leaving other
    /// database errors untouched.
    pub(crate) fn from_write(err: rusqlite::Error, what: impl Into<String>) -> Self {
        match err.sqlite_error_code() {
            Some(rusqlite::ErrorCode::ConstraintViolation) => Self::Conflict(what.into()),
            _ => Self::Database(err),
        }
    }
}
