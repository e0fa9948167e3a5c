//! In-memory backend for tests and ephemeral stores.

use crate::backend::KeyValueBackend;
use crate::error::StoreResult;
use parking_lot::RwLock;
use std::collections::HashMap;

/// An in-memory key-value backend.
///
/// Suitable for unit tests, integration tests, and ephemeral stores
/// that do not need to survive a restart.
///
/// # Example
///
/// ```rust
/// use recall_store::{KeyValueBackend, MemoryBackend};
///
/// let mut backend = MemoryBackend::new();
/// backend.put("sync/watermark", "null".into()).unwrap();
/// assert_eq!(backend.get("sync/watermark").unwrap().as_deref(), Some("null"));
/// ```
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryBackend {
    /// Creates a new empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend pre-seeded with entries.
    ///
    /// Useful for testing startup/recovery paths.
    #[must_use]
    pub fn with_entries(entries: HashMap<String, String>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Returns a copy of all entries.
    #[must_use]
    pub fn entries(&self) -> HashMap<String, String> {
        self.entries.read().clone()
    }
}

impl KeyValueBackend for MemoryBackend {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&mut self, key: &str, value: String) -> StoreResult<()> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StoreResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn flush(&mut self) -> StoreResult<()> {
        Ok(())
    }
}
