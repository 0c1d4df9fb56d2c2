//! Shared state store subsystem.
//!
//! # Data Flow
//! ```text
//! BreakerConfig.object_store_reference
//!     → manager.rs (resolve reference to a store)
//!     → memory.rs (process-local, concurrent map)
//!       or file.rs (JSON file shared between processes)
//! ```
//!
//! # Design Decisions
//! - Per-key operations only; no multi-key transactions
//! - Consistency across the keys of one breaker comes from the breaker lock,
//!   never from the store
//! - Values are typed (`StoreValue`) and serialize to JSON for file backends

pub mod file;
pub mod manager;
pub mod memory;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::breaker::state::BreakerState;

pub use file::FileStore;
pub use manager::{StoreManager, DEFAULT_STORE_REFERENCE};
pub use memory::MemoryStore;

/// A value held in a state store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StoreValue {
    /// A failure counter.
    Count(u64),
    /// Milliseconds since the Unix epoch.
    Timestamp(u64),
    /// A persisted breaker state.
    State(BreakerState),
}

impl StoreValue {
    pub fn into_count(self, key: &str) -> StoreResult<u64> {
        match self {
            StoreValue::Count(n) => Ok(n),
            _ => Err(StoreError::type_mismatch(key, "count")),
        }
    }

    pub fn into_timestamp(self, key: &str) -> StoreResult<u64> {
        match self {
            StoreValue::Timestamp(ms) => Ok(ms),
            _ => Err(StoreError::type_mismatch(key, "timestamp")),
        }
    }

    pub fn into_state(self, key: &str) -> StoreResult<BreakerState> {
        match self {
            StoreValue::State(s) => Ok(s),
            _ => Err(StoreError::type_mismatch(key, "state")),
        }
    }
}

/// Errors raised by state store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Key was retrieved without being present.
    #[error("key not found: {key}")]
    NotFound { key: String },

    /// No store is registered under the configured reference.
    #[error("no object store registered as '{reference}'")]
    UnknownReference { reference: String },

    /// The stored value has an unexpected type.
    #[error("value under '{key}' is not a {expected}")]
    TypeMismatch { key: String, expected: &'static str },

    /// Backend I/O failed.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend contents could not be (de)serialized.
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    fn type_mismatch(key: &str, expected: &'static str) -> Self {
        StoreError::TypeMismatch {
            key: key.to_string(),
            expected,
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// A key-value store shared by every participant of a breaker.
///
/// Implementations must make writes visible to all callers that share the
/// store. Each operation is atomic on its own key.
pub trait StateStore: Send + Sync {
    fn contains(&self, key: &str) -> StoreResult<bool>;

    /// Returns `StoreError::NotFound` when the key is absent.
    fn retrieve(&self, key: &str) -> StoreResult<StoreValue>;

    fn store(&self, key: &str, value: StoreValue) -> StoreResult<()>;

    /// Removing an absent key is not an error.
    fn remove(&self, key: &str) -> StoreResult<()>;
}
