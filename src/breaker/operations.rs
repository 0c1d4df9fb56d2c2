//! Breaker operations exposed to callers.
//!
//! # Responsibilities
//! - Bind one `BreakerConfig` to the shared engine
//! - Translate engine outcomes into the caller-facing signals: `Open` for a
//!   denied attempt, `Internal` for store/lock failures
//! - Project configuration for diagnostics (`dump_config`)
//!
//! # Design Decisions
//! - `Open` is never wrapped as `Internal`; callers branch on it to reach
//!   their fallback path
//! - Whether to fail open or closed on `Internal` is the caller's decision

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::breaker::engine::{Admission, CircuitBreakerEngine, TripOutcome};
use crate::breaker::error::{BreakerError, BreakerResult, InternalError};
use crate::breaker::state::{BreakerRecord, BreakerState};
use crate::config::BreakerConfig;
use crate::observability::metrics;

/// Structured projection of a breaker's configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSnapshot {
    pub breaker_name: String,
    pub object_store_reference: String,
    pub trip_threshold: u32,
    /// Milliseconds.
    pub trip_reset_time: u64,
}

#[derive(Serialize)]
struct ConfigDump<'a> {
    #[serde(rename = "circuitBreaker")]
    circuit_breaker: &'a ConfigSnapshot,
}

/// Current persisted state of a breaker alongside its limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerStatus {
    pub breaker_name: String,
    #[serde(flatten)]
    pub record: BreakerRecord,
    pub trip_threshold: u32,
    pub trip_reset_time: u64,
}

/// One configured breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    engine: Arc<CircuitBreakerEngine>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig, engine: Arc<CircuitBreakerEngine>) -> Self {
        Self { config, engine }
    }

    pub fn name(&self) -> &str {
        &self.config.breaker_name
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// The configuration as given, without touching the store.
    pub fn dump_config(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            breaker_name: self.config.breaker_name.clone(),
            object_store_reference: self.config.object_store_reference.clone(),
            trip_threshold: self.config.trip_threshold,
            trip_reset_time: self.config.trip_reset_time,
        }
    }

    /// `{"circuitBreaker": {...}}`
    pub fn dump_config_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&ConfigDump {
            circuit_breaker: &self.dump_config(),
        })
    }

    /// Record a failure of the protected operation.
    ///
    /// `error_type` restricts counting to failures whose `observed` type
    /// matches it, ignoring case.
    pub fn trip(&self, error_type: Option<&str>, observed: Option<&str>) -> BreakerResult<TripOutcome> {
        self.engine
            .record_failure(&self.config, error_type, observed)
            .map_err(|e| self.internal(e))
    }

    /// Check admission before attempting the protected operation.
    ///
    /// Returns the state the attempt was admitted under, or
    /// `BreakerError::Open` when the breaker denies it.
    pub fn filter(&self) -> BreakerResult<BreakerState> {
        let admission = self
            .engine
            .admit(&self.config)
            .map_err(|e| self.internal(e))?;

        match admission {
            Admission::Allowed {
                state,
                probe_started,
            } => {
                metrics::record_admission(
                    self.name(),
                    if probe_started { "probe" } else { "allowed" },
                );
                Ok(state)
            }
            Admission::Denied { retry_after } => {
                tracing::info!(
                    breaker = %self.config.breaker_name,
                    retry_after_ms = retry_after.map(|d| d.as_millis() as u64),
                    "Circuit open, attempt denied"
                );
                metrics::record_admission(self.name(), "denied");
                Err(BreakerError::Open {
                    breaker: self.config.breaker_name.clone(),
                    retry_after,
                })
            }
        }
    }

    pub fn status(&self) -> BreakerResult<BreakerStatus> {
        let record = self
            .engine
            .snapshot(&self.config)
            .map_err(|e| self.internal(e))?;
        metrics::record_state(self.name(), record.state);
        Ok(BreakerStatus {
            breaker_name: self.config.breaker_name.clone(),
            record,
            trip_threshold: self.config.trip_threshold,
            trip_reset_time: self.config.trip_reset_time,
        })
    }

    /// Force the breaker back to Closed with no recorded failures.
    pub fn reset(&self) -> BreakerResult<BreakerState> {
        self.engine
            .reset(&self.config)
            .map_err(|e| self.internal(e))
    }

    fn internal(&self, source: InternalError) -> BreakerError {
        BreakerError::Internal {
            breaker: self.config.breaker_name.clone(),
            source,
        }
    }
}
