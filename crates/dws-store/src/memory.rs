//! In-memory storage implementation.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::Result;
use crate::types::PersistedState;
use crate::Store;

/// A volatile store backed by a `HashMap`.
///
/// Clones of the records are returned, so a `MemoryStore` shared through an
/// `Arc` behaves like a durable store for the lifetime of the process. Tests
/// use this to simulate a restart by building a new node over the same store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, PersistedState>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl Store for MemoryStore {
    fn write(&self, key: &str, value: &PersistedState) -> Result<()> {
        self.records.write().insert(key.to_string(), value.clone());
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<PersistedState>> {
        Ok(self.records.read().get(key).cloned())
    }
}
