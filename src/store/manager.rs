//! Object store resolution.
//!
//! Breakers name their store by reference; the manager maps references to
//! live stores. The process-wide manager always carries the default
//! in-memory store.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use crate::store::{MemoryStore, StateStore, StoreError, StoreResult};

/// Reference of the store used when a breaker names none.
pub const DEFAULT_STORE_REFERENCE: &str = "_defaultInMemoryObjectStore";

/// Maps object store references to stores.
#[derive(Clone)]
pub struct StoreManager {
    stores: Arc<DashMap<String, Arc<dyn StateStore>>>,
}

impl StoreManager {
    /// A manager holding only the default in-memory store.
    pub fn new() -> Self {
        let manager = Self {
            stores: Arc::new(DashMap::new()),
        };
        manager.register(DEFAULT_STORE_REFERENCE, Arc::new(MemoryStore::new()));
        manager
    }

    /// The process-wide manager.
    pub fn global() -> &'static StoreManager {
        static GLOBAL: OnceLock<StoreManager> = OnceLock::new();
        GLOBAL.get_or_init(StoreManager::new)
    }

    /// Register `store` under `reference`, replacing any previous store.
    pub fn register(&self, reference: impl Into<String>, store: Arc<dyn StateStore>) {
        let reference = reference.into();
        tracing::debug!(reference = %reference, "Registered object store");
        self.stores.insert(reference, store);
    }

    pub fn is_registered(&self, reference: &str) -> bool {
        self.stores.contains_key(reference)
    }

    pub fn get(&self, reference: &str) -> StoreResult<Arc<dyn StateStore>> {
        self.stores
            .get(reference)
            .map(|r| r.value().clone())
            .ok_or_else(|| StoreError::UnknownReference {
                reference: reference.to_string(),
            })
    }

    pub fn references(&self) -> Vec<String> {
        let mut refs: Vec<String> = self.stores.iter().map(|r| r.key().clone()).collect();
        refs.sort();
        refs
    }
}

impl Default for StoreManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StoreManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreManager")
            .field("references", &self.references())
            .finish()
    }
}
