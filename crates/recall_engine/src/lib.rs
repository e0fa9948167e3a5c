//! # Recall Sync Engine
//!
//! Offline-first synchronization for the Recall study-card application.
//!
//! This crate provides:
//! - The mutation API the UI calls (create/update/soft-delete decks and
//!   cards), synchronous and network-free
//! - The sync cycle state machine (pull → reconcile → push → apply)
//! - The reconciler merging pulled server state with pending local work
//! - Transport abstraction with an HTTP implementation and a mock
//! - Retry with exponential backoff
//!
//! ## Architecture
//!
//! The engine implements a **pull-then-push** model over a durable
//! local record store:
//! 1. Mutations always land in the local store first and succeed
//!    offline
//! 2. A sync cycle pulls the authoritative delta, merges it with
//!    pending local work, and pushes the result
//! 3. Creations carry client-chosen idempotency tokens, so retried or
//!    duplicated pushes converge instead of double-creating
//!
//! ## Key Invariants
//!
//! - Local pending work is never silently discarded: a dirty record
//!   survives any pulled state until it is pushed or the user resolves
//!   a reported conflict
//! - Reconciliation is idempotent; any partial cycle is safe to retry
//! - At most one sync cycle runs at a time; a request while one is in
//!   flight is a no-op

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod config;
mod engine;
mod error;
mod mutate;
mod push;
mod reconcile;
mod transport;

pub mod http;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{RetryConfig, SyncConfig};
pub use engine::{CycleReport, SyncEngine, SyncOutcome, SyncPhase, SyncStats};
pub use error::{MutationError, SyncError, SyncResult};
pub use mutate::{CardPatch, DeckPatch, NewCard, NewDeck};
pub use push::{apply_push_response, PushApplication};
pub use reconcile::{reconcile, PullKind, ReconcileOutcome};
pub use transport::{MockTransport, SyncTransport};
