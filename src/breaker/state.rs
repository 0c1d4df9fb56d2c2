//! Breaker state and its persisted record.
//!
//! # States
//! - Closed: failures are counted, attempts are admitted
//! - Open: attempts are denied until the reset window lapses
//! - Half-Open: attempts are admitted; the next failure re-opens
//!
//! # Persisted Fields
//! ```text
//! <name>.failureCount  Count      default 0
//! <name>.failurePoint  Timestamp  present only while tripped
//! <name>.state         State      default CLOSED
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    #[default]
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "CLOSED",
            BreakerState::Open => "OPEN",
            BreakerState::HalfOpen => "HALF_OPEN",
        }
    }

    /// Gauge encoding: 0 closed, 1 half-open, 2 open.
    pub fn as_gauge(&self) -> f64 {
        match self {
            BreakerState::Closed => 0.0,
            BreakerState::HalfOpen => 1.0,
            BreakerState::Open => 2.0,
        }
    }
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store keys of one breaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerKeys {
    pub failure_count: String,
    pub failure_point: String,
    pub state: String,
}

impl BreakerKeys {
    pub fn for_breaker(name: &str) -> Self {
        Self {
            failure_count: format!("{}.failureCount", name),
            failure_point: format!("{}.failurePoint", name),
            state: format!("{}.state", name),
        }
    }
}

/// The persisted fields of one breaker, as read together under its lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BreakerRecord {
    pub failure_count: u64,
    /// Milliseconds since the Unix epoch.
    pub failure_window_start: Option<u64>,
    pub state: BreakerState,
}
