//! Error types shared by all broadcast backends.

use thiserror::Error;

use crate::config::ValidationError;

/// Errors that can occur while operating a broadcast backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend configuration or URL was rejected.
    #[error("invalid backend configuration: {0}")]
    Config(#[from] ValidationError),

    /// The message store is unreachable or the connection is dead.
    ///
    /// Raised by `connect`, `publish`, `subscribe` and `unsubscribe`.
    /// Never retried internally.
    #[error("message store connection failed: {0}")]
    Connection(#[from] redis::RedisError),

    /// An operation was issued before `connect` or after `disconnect`.
    #[error("backend is not connected")]
    NotConnected,

    /// The background subscription feed terminated unexpectedly.
    ///
    /// Fatal to the backend instance; there is no automatic reconnect.
    /// Surfaced by `next_event` so callers are never left waiting on a
    /// queue that can no longer be filled.
    #[error("subscription feed terminated unexpectedly")]
    FeedClosed,
}
