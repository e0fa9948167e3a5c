//! # Recall Model
//!
//! Record types and the synchronization envelope for the Recall
//! study-card application.
//!
//! This crate provides:
//! - The `Tracked<T>` envelope wrapping every locally held record
//! - Record identity (`RecordId`: server-assigned or temporary)
//! - Sync status tracking (`SyncStatus`: new, clean, dirty)
//! - The `Deck` and `Card` entities
//! - Dual-key record lookup (`RecordKey`)
//!
//! ## Key Invariants
//!
//! - A record is identified by exactly one of a server id or a
//!   temporary id (`RecordId` makes the other unrepresentable)
//! - A record is either pending creation (`New`) or pending
//!   update/delete (`Dirty`), never both (`SyncStatus`)
//! - `updated_at` never decreases under local mutation or applied
//!   server state

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod card;
mod deck;
mod envelope;
mod resolve;

pub use card::{Card, ContentBlock, DeckRef, ReviewPhase, ReviewState};
pub use deck::Deck;
pub use envelope::{RecordId, ServerId, SyncStatus, TempId, Tracked};
pub use resolve::{find_record, find_record_mut, RecordKey};
