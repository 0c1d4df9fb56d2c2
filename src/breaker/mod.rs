//! Circuit breaker subsystem.
//!
//! # Data Flow
//! ```text
//! Before the protected call:
//!     → CircuitBreaker::filter (operations.rs)
//!     → CircuitBreakerEngine::admit (engine.rs)
//!     → lock scope, read state / failure point, maybe Open → Half-Open
//!     → Ok(state) or BreakerError::Open
//!
//! After a failed call:
//!     → CircuitBreaker::trip (operations.rs)
//!     → CircuitBreakerEngine::record_failure (engine.rs)
//!     → lock scope, increment count, maybe → Open
//! ```
//!
//! # Design Decisions
//! - The engine is stateless; all breaker state is in the object store
//! - One lock acquisition per operation covers every store access it makes
//! - Open (expected) and Internal (infrastructure) errors are distinct
//!   variants so callers can match on them

pub mod engine;
pub mod error;
pub mod operations;
pub mod registry;
pub mod state;

pub use engine::{Admission, CircuitBreakerEngine, TripOutcome};
pub use error::{BreakerError, BreakerResult, ErrorType, InternalError};
pub use operations::{BreakerStatus, CircuitBreaker, ConfigSnapshot};
pub use registry::BreakerRegistry;
pub use state::{BreakerKeys, BreakerRecord, BreakerState};
