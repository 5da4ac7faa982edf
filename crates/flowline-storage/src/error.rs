// Storage error type
//
// Surfaced to callers of append/query; never silently retried. The
// caller decides whether to fail the request or end a stream.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    /// The underlying store could not be reached
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A query or write failed
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row could not be decoded into its domain type
    #[error("corrupt row: {0}")]
    Decode(String),
}

impl StorageError {
    pub fn decode(msg: impl Into<String>) -> Self {
        StorageError::Decode(msg.into())
    }
}

impl From<StorageError> for flowline_core::EventError {
    fn from(e: StorageError) -> Self {
        flowline_core::EventError::persistence(e.to_string())
    }
}
