//! # Recall Protocol
//!
//! Wire types for the Recall sync protocol.
//!
//! This crate provides:
//! - Wire records (`DeckRecord`, `CardRecord`) and their conversions to
//!   and from the local `Tracked<_>` envelope
//! - Creation payloads carrying a client-chosen idempotency token
//! - The pull/push request and response messages
//! - Conflict reports
//!
//! All messages serialize as JSON with ISO-8601 timestamps.
//!
//! ## Idempotency tokens
//!
//! Every creation payload carries a mandatory `client_token` (the
//! record's temporary id). The server echoes the token unchanged on the
//! corresponding created record, and the client maps temporary ids to
//! server ids by exact token equality. Matching created records by
//! content is not part of the protocol: identical payloads pushed twice
//! (a retry after a timed-out-but-applied push, or two decks that
//! happen to share a name) must still map one-to-one.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod messages;
mod payload;
mod record;

pub use error::{ProtocolError, ProtocolResult};
pub use messages::{ConflictInfo, ConflictKind, PullResponse, PushRequest, PushResponse};
pub use payload::{CardCreate, DeckCreate};
pub use record::{CardRecord, DeckRecord};
