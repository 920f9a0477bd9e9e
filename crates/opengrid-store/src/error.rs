//! Error types for the opengrid-store crate.
//!
//! All store operations return [`StoreError`] via [`StoreResult`]. The
//! dispatch loops treat every variant as transient: abort the current
//! iteration, log, back off, retry.

use thiserror::Error;

/// Alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur against the state store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The Redis backend reported a failure.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A payload in the store failed to serialize or deserialize.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored value had an unexpected shape (e.g. a non-numeric stat).
    #[error("malformed value at {key}: {reason}")]
    Malformed { key: String, reason: String },
}
