//! # Recall Store
//!
//! Durable local persistence for the Recall sync engine.
//!
//! This crate provides:
//! - The [`KeyValueBackend`] trait over string-keyed durable storage
//! - [`MemoryBackend`] for tests and ephemeral stores
//! - [`FileBackend`] with atomic rewrites and advisory locking
//! - [`RecordStore`], the local view of every deck and card, persisted
//!   under stable keys and reloaded on startup
//!
//! Every mutating call on [`RecordStore`] persists before it returns,
//! so a crash never loses acknowledged local work. Nothing in this
//! crate touches the network.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;
mod records;

pub use backend::KeyValueBackend;
pub use error::{StoreError, StoreResult};
pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use records::RecordStore;
