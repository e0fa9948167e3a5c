//! # Recall Sync Server
//!
//! An in-memory implementation of the authoritative side of the Recall
//! sync protocol.
//!
//! The production backend lives elsewhere; this crate exists to pin
//! down the contract the client depends on, and to give the engine's
//! integration tests a real counterparty without network overhead:
//!
//! - Pulls return a full snapshot (no watermark) or an incremental
//!   delta by `updated_at`, tombstones included
//! - Creations are idempotent on `client_token`: a replayed token
//!   returns the previously created record instead of a duplicate
//! - `deck_token` references resolve against decks created in the same
//!   push or any earlier one
//! - Updates apply last-write-wins, except that an update older than
//!   the server copy, or aimed at a server-deleted record, is rejected
//!   as a conflict and leaves the server copy untouched

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod server;
mod time;

pub use server::SyncServer;
pub use time::TimeSource;
