//! Circuit breaker engine.
//!
//! # State Transitions
//! ```text
//! Closed → Closed:       failure counted below threshold
//! Closed → Open:         failure_count >= threshold (failure point stamped)
//! Open → Open:           admission inside the reset window (denied)
//! Open → Half-Open:      admission after the reset window (count and point cleared)
//! Half-Open → Open:      any counted failure (failure point stamped)
//! Half-Open → Half-Open: admission
//! ```
//!
//! # Design Decisions
//! - Every operation runs under the breaker's lock for its whole
//!   read-modify-write sequence; the guard is dropped on every exit path
//! - No state is kept in the engine; the object store is the only source of
//!   truth, so any number of engines (threads, processes) can share a breaker
//! - Half-Open never closes by itself; only a failure or an explicit reset
//!   moves it
//! - Window expiry is strict: `now - failure_point > reset_time`

use std::sync::Arc;
use std::time::Duration;

use crate::breaker::error::InternalError;
use crate::breaker::state::{BreakerKeys, BreakerRecord, BreakerState};
use crate::clock::{Clock, SystemClock};
use crate::config::{AppConfig, BreakerConfig, LockBackend, StoreConfig};
use crate::lock::{FileLockProvider, LocalLockProvider, LockError, LockProvider};
use crate::observability::metrics;
use crate::store::{FileStore, StateStore, StoreError, StoreManager, StoreResult, StoreValue};

/// Result of recording a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripOutcome {
    /// The observed error type did not match the filter.
    Ignored,
    /// The failure was counted.
    Counted {
        failure_count: u64,
        state: BreakerState,
        /// The breaker moved to Open during this call.
        opened: bool,
    },
}

/// Result of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed {
        state: BreakerState,
        /// This call moved the breaker from Open to Half-Open.
        probe_started: bool,
    },
    Denied {
        /// Time until the reset window lapses, when a failure point exists.
        retry_after: Option<Duration>,
    },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed { .. })
    }
}

/// Typed access to one breaker's fields in a store.
struct RecordAccess<'a> {
    store: &'a dyn StateStore,
    keys: BreakerKeys,
}

impl<'a> RecordAccess<'a> {
    fn new(store: &'a dyn StateStore, breaker: &str) -> Self {
        Self {
            store,
            keys: BreakerKeys::for_breaker(breaker),
        }
    }

    fn read(&self, key: &str) -> StoreResult<Option<StoreValue>> {
        match self.store.retrieve(key) {
            Ok(value) => Ok(Some(value)),
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn failure_count(&self) -> StoreResult<u64> {
        let key = &self.keys.failure_count;
        self.read(key)?
            .map(|v| v.into_count(key))
            .transpose()
            .map(Option::unwrap_or_default)
    }

    fn failure_point(&self) -> StoreResult<Option<u64>> {
        let key = &self.keys.failure_point;
        self.read(key)?.map(|v| v.into_timestamp(key)).transpose()
    }

    fn state(&self) -> StoreResult<BreakerState> {
        let key = &self.keys.state;
        self.read(key)?
            .map(|v| v.into_state(key))
            .transpose()
            .map(Option::unwrap_or_default)
    }

    fn load(&self) -> StoreResult<BreakerRecord> {
        Ok(BreakerRecord {
            failure_count: self.failure_count()?,
            failure_window_start: self.failure_point()?,
            state: self.state()?,
        })
    }

    fn increment_failure_count(&self) -> StoreResult<u64> {
        let next = self.failure_count()? + 1;
        self.store
            .store(&self.keys.failure_count, StoreValue::Count(next))?;
        Ok(next)
    }

    fn reset_failure_count(&self) -> StoreResult<()> {
        self.store
            .store(&self.keys.failure_count, StoreValue::Count(0))
    }

    /// Stamp the failure point unless one is already recorded.
    fn init_failure_point(&self, now: u64) -> StoreResult<()> {
        if self.store.contains(&self.keys.failure_point)? {
            tracing::debug!(key = %self.keys.failure_point, "Failure point already set, waiting for expiry");
            return Ok(());
        }
        self.stamp_failure_point(now)
    }

    fn stamp_failure_point(&self, now: u64) -> StoreResult<()> {
        self.store
            .store(&self.keys.failure_point, StoreValue::Timestamp(now))
    }

    fn clear_failure_point(&self) -> StoreResult<()> {
        self.store.remove(&self.keys.failure_point)
    }

    fn set_state(&self, state: BreakerState) -> StoreResult<()> {
        self.store.store(&self.keys.state, StoreValue::State(state))
    }
}

/// Drives breaker transitions against a shared store under a named lock.
pub struct CircuitBreakerEngine {
    stores: StoreManager,
    locks: Arc<dyn LockProvider>,
    clock: Arc<dyn Clock>,
    lock_timeout: Option<Duration>,
}

impl CircuitBreakerEngine {
    pub fn new(stores: StoreManager, locks: Arc<dyn LockProvider>) -> Self {
        Self {
            stores,
            locks,
            clock: Arc::new(SystemClock),
            lock_timeout: None,
        }
    }

    /// Build an engine for `config`, registering its file stores in `stores`.
    pub fn from_config(config: &AppConfig, stores: StoreManager) -> Result<Self, InternalError> {
        register_file_stores(&stores, &config.stores)?;

        let locks: Arc<dyn LockProvider> = match config.locks.backend {
            LockBackend::Local => LocalLockProvider::shared(),
            LockBackend::File => {
                let dir = config.locks.dir.as_deref().unwrap_or(".breaker/locks");
                let provider = FileLockProvider::new(dir)
                    .map_err(|source| LockError::Io {
                        scope: dir.to_string(),
                        source,
                    })?
                    .with_poll_interval(
                        Duration::from_millis(config.locks.poll_base_ms),
                        Duration::from_millis(config.locks.poll_max_ms),
                    );
                Arc::new(provider)
            }
        };

        tracing::debug!(
            backend = ?config.locks.backend,
            stores = ?stores.references(),
            "Breaker engine configured"
        );
        Ok(Self::new(stores, locks).with_lock_timeout(config.locks.acquire_timeout()))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Bound lock acquisition; `None` waits forever.
    pub fn with_lock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn stores(&self) -> &StoreManager {
        &self.stores
    }

    /// Open and register file stores not yet known to this engine.
    pub fn register_stores(&self, stores: &[StoreConfig]) -> Result<(), InternalError> {
        register_file_stores(&self.stores, stores)
    }

    /// Run `f` against the breaker's record while holding its lock.
    fn locked<T>(
        &self,
        config: &BreakerConfig,
        operation: &'static str,
        f: impl FnOnce(&RecordAccess<'_>) -> StoreResult<T>,
    ) -> Result<T, InternalError> {
        let result = (|| -> Result<T, InternalError> {
            let store = self.stores.get(&config.object_store_reference)?;
            let _guard = self.locks.acquire(config.lock_key(), self.lock_timeout)?;
            let record = RecordAccess::new(store.as_ref(), &config.breaker_name);
            Ok(f(&record)?)
        })();

        if let Err(e) = &result {
            tracing::warn!(
                breaker = %config.breaker_name,
                operation,
                error = %e,
                "Breaker coordination failed"
            );
            metrics::record_internal_error(&config.breaker_name, operation);
        }
        result
    }

    /// Record one failure of the protected operation.
    ///
    /// With `error_filter`, the failure counts only when `observed` equals
    /// the filter ignoring case; a filter with no observed type never counts.
    pub fn record_failure(
        &self,
        config: &BreakerConfig,
        error_filter: Option<&str>,
        observed: Option<&str>,
    ) -> Result<TripOutcome, InternalError> {
        let breaker = config.breaker_name.as_str();

        if let Some(filter) = error_filter {
            let matched = observed.is_some_and(|o| error_type_matches(filter, o));
            tracing::info!(
                breaker,
                filter,
                observed = observed.unwrap_or("<none>"),
                matched,
                "Trip triggered"
            );
            if !matched {
                metrics::record_failure(breaker, false);
                return Ok(TripOutcome::Ignored);
            }
        } else {
            tracing::info!(breaker, "Trip triggered");
        }

        let threshold = u64::from(config.trip_threshold);
        let (outcome, previous) = self.locked(config, "trip", |record| {
            let failure_count = record.increment_failure_count()?;
            let previous = record.state()?;
            let now = self.clock.now_millis();

            let state = if previous == BreakerState::HalfOpen {
                // A failed probe re-opens regardless of the threshold
                record.stamp_failure_point(now)?;
                record.set_state(BreakerState::Open)?;
                BreakerState::Open
            } else if failure_count >= threshold {
                record.init_failure_point(now)?;
                if previous != BreakerState::Open {
                    record.set_state(BreakerState::Open)?;
                }
                BreakerState::Open
            } else {
                previous
            };

            tracing::debug!(breaker, failure_count, threshold, state = %state, "Failure recorded");
            let outcome = TripOutcome::Counted {
                failure_count,
                state,
                opened: previous != BreakerState::Open && state == BreakerState::Open,
            };
            Ok((outcome, previous))
        })?;
        metrics::record_failure(breaker, true);

        if let TripOutcome::Counted {
            failure_count,
            opened: true,
            ..
        } = outcome
        {
            tracing::info!(
                breaker,
                failure_count,
                threshold,
                "Circuit state change [{} -> OPEN]",
                previous
            );
            metrics::record_transition(breaker, previous, BreakerState::Open);
        }
        Ok(outcome)
    }

    /// Decide whether an attempt may proceed.
    pub fn admit(&self, config: &BreakerConfig) -> Result<Admission, InternalError> {
        let breaker = config.breaker_name.as_str();
        let reset_time = config.trip_reset_time;

        self.locked(config, "filter", |record| {
            let state = record.state()?;
            tracing::debug!(breaker, state = %state, "Filter applied");

            match state {
                BreakerState::Open => {
                    let now = self.clock.now_millis();
                    match record.failure_point()? {
                        Some(point) if now.saturating_sub(point) > reset_time => {
                            record.reset_failure_count()?;
                            record.clear_failure_point()?;
                            record.set_state(BreakerState::HalfOpen)?;
                            tracing::info!(
                                breaker,
                                reset_time_ms = reset_time,
                                "Trip timeout exceeded, count reset [OPEN -> HALF_OPEN]"
                            );
                            metrics::record_transition(breaker, BreakerState::Open, BreakerState::HalfOpen);
                            Ok(Admission::Allowed {
                                state: BreakerState::HalfOpen,
                                probe_started: true,
                            })
                        }
                        Some(point) => {
                            // Not lapsed, so elapsed <= reset_time
                            let remaining = reset_time - now.saturating_sub(point);
                            Ok(Admission::Denied {
                                retry_after: Some(Duration::from_millis(remaining.saturating_add(1))),
                            })
                        }
                        None => {
                            tracing::warn!(breaker, "Breaker is OPEN without a failure point");
                            Ok(Admission::Denied { retry_after: None })
                        }
                    }
                }
                BreakerState::HalfOpen => Ok(Admission::Allowed {
                    state,
                    probe_started: false,
                }),
                BreakerState::Closed => {
                    let failure_count = record.failure_count()?;
                    if failure_count < u64::from(config.trip_threshold) {
                        tracing::debug!(breaker, failure_count, "Failure count below threshold");
                    } else {
                        tracing::debug!(breaker, failure_count, "Closed breaker at threshold, admitting");
                    }
                    Ok(Admission::Allowed {
                        state,
                        probe_started: false,
                    })
                }
            }
        })
    }

    /// Read the breaker's record under its lock.
    pub fn snapshot(&self, config: &BreakerConfig) -> Result<BreakerRecord, InternalError> {
        self.locked(config, "status", |record| record.load())
    }

    /// Restore the breaker to its defaults: Closed, no failures, no failure point.
    pub fn reset(&self, config: &BreakerConfig) -> Result<BreakerState, InternalError> {
        let breaker = config.breaker_name.as_str();
        let previous = self.locked(config, "reset", |record| {
            let previous = record.state()?;
            record.reset_failure_count()?;
            record.clear_failure_point()?;
            record.set_state(BreakerState::Closed)?;
            Ok(previous)
        })?;

        tracing::info!(breaker, "Circuit reset [{} -> CLOSED]", previous);
        if previous != BreakerState::Closed {
            metrics::record_transition(breaker, previous, BreakerState::Closed);
        }
        Ok(previous)
    }
}

impl Default for CircuitBreakerEngine {
    /// Process-wide default store manager and in-process locks.
    fn default() -> Self {
        Self::new(StoreManager::global().clone(), LocalLockProvider::shared())
    }
}

impl std::fmt::Debug for CircuitBreakerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerEngine")
            .field("stores", &self.stores)
            .field("lock_timeout", &self.lock_timeout)
            .finish()
    }
}

fn register_file_stores(manager: &StoreManager, stores: &[StoreConfig]) -> Result<(), InternalError> {
    for store in stores {
        if manager.is_registered(&store.name) {
            continue;
        }
        let file_store = FileStore::open(&store.path)?;
        manager.register(store.name.clone(), Arc::new(file_store));
    }
    Ok(())
}

fn error_type_matches(filter: &str, observed: &str) -> bool {
    filter.to_lowercase() == observed.to_lowercase()
}
