//! In-memory state store.

use std::sync::Arc;

use dashmap::DashMap;

use crate::store::{StateStore, StoreError, StoreResult, StoreValue};

/// A process-local store backed by a concurrent map.
///
/// Cloning shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<DashMap<String, StoreValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys held.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl StateStore for MemoryStore {
    fn contains(&self, key: &str) -> StoreResult<bool> {
        Ok(self.inner.contains_key(key))
    }

    fn retrieve(&self, key: &str) -> StoreResult<StoreValue> {
        self.inner
            .get(key)
            .map(|r| *r.value())
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })
    }

    fn store(&self, key: &str, value: StoreValue) -> StoreResult<()> {
        self.inner.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.inner.remove(key);
        Ok(())
    }
}
