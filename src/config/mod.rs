//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! breaker.toml
//!     → loader.rs (toml → AppConfig)
//!     → validation.rs (names, thresholds, store references, lock settings)
//!     → CircuitBreakerEngine::from_config (stores, lock backend)
//!     → BreakerRegistry (one CircuitBreaker per BreakerConfig)
//!
//! monitor only:
//!     watcher.rs sees the file change → reload + validate
//!     → new stores registered, breaker map swapped
//! ```
//!
//! # Design Decisions
//! - A rejected reload leaves the running config untouched
//! - Lock backend changes are not applied on reload
//! - All fields have defaults to allow minimal configs; only breakerName is
//!   required per breaker
//! - Breaker state lives in the object store, so a reload never resets it

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AppConfig, BreakerConfig, LockBackend, LockConfig, LockScope, LogFormat, LoggingConfig,
    MetricsConfig, StoreConfig,
};
pub use validation::ValidationError;
