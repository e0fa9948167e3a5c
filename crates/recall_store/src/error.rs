//! Error types for local persistence.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while persisting or loading local state.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted state could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Another process holds the store lock.
    #[error("store at {path} is locked by another process")]
    Locked {
        /// The contended store path.
        path: String,
    },
}
