//! Protocol-level errors.

use thiserror::Error;

/// Result type for protocol conversions.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while converting wire records to local records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A record claimed by the server carries the "unassigned" id.
    #[error("server returned a {kind} record without a server id")]
    MissingServerId {
        /// Which record kind was malformed.
        kind: &'static str,
    },

    /// A card record references neither a deck id nor a deck token.
    #[error("server returned a card record without a deck reference")]
    MissingDeckRef,

    /// A created record came back without its idempotency token.
    ///
    /// Without the echoed token the client cannot map the created
    /// record to a local temporary id; guessing by content is not an
    /// option.
    #[error("server created a {kind} without echoing its client token")]
    MissingClientToken {
        /// Which record kind was malformed.
        kind: &'static str,
    },
}
