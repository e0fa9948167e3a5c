//! Error types for the sync engine.

use recall_protocol::ProtocolError;
use recall_store::StoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors returned by the mutation API.
///
/// These are local failures, rejected synchronously; they never reach
/// the network.
#[derive(Error, Debug)]
pub enum MutationError {
    /// Input failed validation.
    #[error("invalid {field}: {message}")]
    Validation {
        /// Which field was rejected.
        field: &'static str,
        /// Why it was rejected.
        message: String,
    },

    /// The target record does not exist.
    #[error("no {kind} found for key {key}")]
    NotFound {
        /// The record kind ("deck" or "card").
        kind: &'static str,
        /// The key that failed to resolve.
        key: String,
    },

    /// Local persistence failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl MutationError {
    /// Creates a validation error.
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}

/// Errors that abort a sync cycle.
///
/// A sync error never touches already-applied local mutations: pending
/// work is preserved unchanged for the next attempt.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport failure.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The peer sent a response the client cannot interpret.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server rejected the request outright.
    #[error("server error: {0}")]
    ServerError(String),

    /// A network call exceeded the configured timeout.
    #[error("operation timed out")]
    Timeout,

    /// Local persistence failed mid-cycle.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if retrying the cycle may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Timeout => true,
            SyncError::ServerError(_) => true,
            SyncError::Protocol(_) | SyncError::Store(_) => false,
        }
    }
}

impl From<ProtocolError> for SyncError {
    fn from(err: ProtocolError) -> Self {
        SyncError::Protocol(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(SyncError::transport_retryable("connection reset").is_retryable());
        assert!(!SyncError::transport_fatal("bad certificate").is_retryable());
        assert!(SyncError::Timeout.is_retryable());
        assert!(SyncError::ServerError("500".into()).is_retryable());
        assert!(!SyncError::Protocol("garbled body".into()).is_retryable());
    }

    #[test]
    fn mutation_error_display() {
        let err = MutationError::validation("name", "must not be empty");
        assert_eq!(err.to_string(), "invalid name: must not be empty");

        let err = MutationError::NotFound {
            kind: "deck",
            key: "42".into(),
        };
        assert!(err.to_string().contains("deck"));
        assert!(err.to_string().contains("42"));
    }
}
