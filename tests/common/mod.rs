//! Shared utilities for breaker integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use circuit_breaker::breaker::{CircuitBreaker, CircuitBreakerEngine};
use circuit_breaker::clock::ManualClock;
use circuit_breaker::config::BreakerConfig;
use circuit_breaker::lock::{LocalLockProvider, LockProvider};
use circuit_breaker::store::{MemoryStore, StateStore, StoreManager};

/// Fixed starting instant for manual clocks.
pub const T0: u64 = 1_700_000_000_000;

/// Reference every test store is registered under.
pub const STORE: &str = "shared";

/// Engine on a private store and lock table, driven by a manual clock.
pub fn manual_engine() -> (Arc<CircuitBreakerEngine>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(T0));
    let engine = CircuitBreakerEngine::new(
        store_manager(Arc::new(MemoryStore::new())),
        Arc::new(LocalLockProvider::new()),
    )
    .with_clock(clock.clone());
    (Arc::new(engine), clock)
}

/// Engine on the real clock over the given store and lock provider.
pub fn engine_over(
    store: Arc<dyn StateStore>,
    locks: Arc<dyn LockProvider>,
) -> Arc<CircuitBreakerEngine> {
    Arc::new(CircuitBreakerEngine::new(store_manager(store), locks))
}

pub fn store_manager(store: Arc<dyn StateStore>) -> StoreManager {
    let stores = StoreManager::new();
    stores.register(STORE, store);
    stores
}

pub fn config(name: &str, threshold: u32, reset_ms: u64) -> BreakerConfig {
    BreakerConfig::new(name)
        .with_store(STORE)
        .with_threshold(threshold)
        .with_reset_time(Duration::from_millis(reset_ms))
}

pub fn breaker(
    engine: &Arc<CircuitBreakerEngine>,
    name: &str,
    threshold: u32,
    reset_ms: u64,
) -> CircuitBreaker {
    CircuitBreaker::new(config(name, threshold, reset_ms), engine.clone())
}
