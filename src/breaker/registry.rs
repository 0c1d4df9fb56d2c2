//! Named breaker lookup with atomic reload.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::breaker::engine::CircuitBreakerEngine;
use crate::breaker::operations::CircuitBreaker;
use crate::config::BreakerConfig;

type BreakerMap = HashMap<String, CircuitBreaker>;

/// Holds every configured breaker, keyed by name.
///
/// Readers never block on a reload: `reload` builds a new map and swaps it
/// in. Breaker state lives in the object store, so a breaker that survives a
/// reload keeps its counters.
pub struct BreakerRegistry {
    engine: Arc<CircuitBreakerEngine>,
    breakers: ArcSwap<BreakerMap>,
}

impl BreakerRegistry {
    pub fn new(engine: Arc<CircuitBreakerEngine>, configs: &[BreakerConfig]) -> Self {
        let breakers = Self::build(&engine, configs);
        tracing::info!(count = breakers.len(), "Breaker registry initialized");
        Self {
            engine,
            breakers: ArcSwap::from_pointee(breakers),
        }
    }

    fn build(engine: &Arc<CircuitBreakerEngine>, configs: &[BreakerConfig]) -> BreakerMap {
        configs
            .iter()
            .map(|config| {
                (
                    config.breaker_name.clone(),
                    CircuitBreaker::new(config.clone(), engine.clone()),
                )
            })
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<CircuitBreaker> {
        self.breakers.load().get(name).cloned()
    }

    /// Breaker names in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.load().keys().cloned().collect();
        names.sort();
        names
    }

    /// All breakers, sorted by name.
    pub fn all(&self) -> Vec<CircuitBreaker> {
        let mut all: Vec<CircuitBreaker> = self.breakers.load().values().cloned().collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all
    }

    pub fn len(&self) -> usize {
        self.breakers.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.load().is_empty()
    }

    /// Replace the breaker set with `configs`.
    pub fn reload(&self, configs: &[BreakerConfig]) {
        let next = Self::build(&self.engine, configs);
        let previous = self.breakers.swap(Arc::new(next));

        let current = self.breakers.load();
        let added = current.keys().filter(|k| !previous.contains_key(*k)).count();
        let removed = previous.keys().filter(|k| !current.contains_key(*k)).count();
        tracing::info!(
            count = current.len(),
            added,
            removed,
            "Breaker registry reloaded"
        );
    }
}
