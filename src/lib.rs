//! Shared-state circuit breaker library

pub mod breaker;
pub mod clock;
pub mod config;
pub mod lifecycle;
pub mod lock;
pub mod observability;
pub mod store;

pub use breaker::{BreakerError, BreakerRegistry, BreakerState, CircuitBreaker, CircuitBreakerEngine};
pub use config::schema::{AppConfig, BreakerConfig};
pub use lifecycle::Shutdown;
pub use store::{StateStore, StoreManager};
