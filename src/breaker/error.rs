//! Breaker error taxonomy.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::lock::LockError;
use crate::store::StoreError;

/// The closed set of error types a breaker operation can signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// The breaker is denying admission.
    CircuitOpen,
    /// The store or lock backend failed.
    CircuitError,
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorType::CircuitOpen => f.write_str("CIRCUIT_OPEN"),
            ErrorType::CircuitError => f.write_str("CIRCUIT_ERROR"),
        }
    }
}

/// Infrastructure failure while coordinating a breaker.
#[derive(Debug, Error)]
pub enum InternalError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Lock(#[from] LockError),
}

/// Error signalled by breaker operations.
#[derive(Debug, Error)]
pub enum BreakerError {
    /// Expected control flow: route the caller to its fallback.
    #[error("circuit '{breaker}' is open")]
    Open {
        breaker: String,
        /// Time left until a probe is admitted, when known.
        retry_after: Option<Duration>,
    },

    /// The breaker could not read or update its shared state.
    #[error("circuit '{breaker}' internal error: {source}")]
    Internal {
        breaker: String,
        #[source]
        source: InternalError,
    },
}

impl BreakerError {
    pub fn error_type(&self) -> ErrorType {
        match self {
            BreakerError::Open { .. } => ErrorType::CircuitOpen,
            BreakerError::Internal { .. } => ErrorType::CircuitError,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open { .. })
    }

    pub fn breaker(&self) -> &str {
        match self {
            BreakerError::Open { breaker, .. } | BreakerError::Internal { breaker, .. } => breaker,
        }
    }
}

/// Result type for breaker operations.
pub type BreakerResult<T> = Result<T, BreakerError>;
