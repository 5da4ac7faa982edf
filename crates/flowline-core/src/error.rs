// Error types for the event streaming subsystem

use thiserror::Error;

/// Result type alias for event subsystem operations
pub type Result<T> = std::result::Result<T, EventError>;

/// Errors that can occur while recording or streaming events
#[derive(Debug, Error)]
pub enum EventError {
    /// The underlying store is unavailable or a write failed
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A wire frame or JSON payload could not be parsed
    #[error("parse error: {0}")]
    Parse(String),

    /// A pub/sub callback failed; isolated per callback
    #[error("subscriber error: {0}")]
    Subscriber(String),

    /// The client disconnected; normal termination, not a failure
    #[error("client disconnected")]
    TransportAbort,

    /// The connection was held open past the maximum session lifetime
    #[error("connection lifetime exceeded")]
    LifetimeExceeded,

    /// Internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl EventError {
    /// Create a persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        EventError::Persistence(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        EventError::Parse(msg.into())
    }

    /// Create a subscriber error
    pub fn subscriber(msg: impl Into<String>) -> Self {
        EventError::Subscriber(msg.into())
    }
}
