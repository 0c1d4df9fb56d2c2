//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (breakers reference declared stores)
//! - Validate value ranges (thresholds > 0, polling bounds ordered)
//! - Detect duplicate breaker and store names
//! - Require cross-process locks for breakers on file stores
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::{AppConfig, LockBackend};
use crate::store::DEFAULT_STORE_REFERENCE;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("breaker #{index} has an empty breakerName")]
    EmptyBreakerName { index: usize },

    #[error("breaker '{name}' is defined more than once")]
    DuplicateBreaker { name: String },

    #[error("breaker '{name}' has tripThreshold 0")]
    ZeroThreshold { name: String },

    #[error("breaker '{name}' references undeclared object store '{reference}'")]
    UnknownStore { name: String, reference: String },

    #[error("store #{index} has an empty name")]
    EmptyStoreName { index: usize },

    #[error("store '{name}' is declared more than once")]
    DuplicateStore { name: String },

    #[error("breaker '{name}' uses file store '{reference}', which needs locks.backend = \"file\"")]
    LocalLockOnFileStore { name: String, reference: String },

    #[error("file lock backend requires locks.dir")]
    MissingLockDir,

    #[error("locks.poll_base_ms ({base}) exceeds locks.poll_max_ms ({max})")]
    PollBounds { base: u64, max: u64 },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut stores: HashSet<&str> = HashSet::new();
    stores.insert(DEFAULT_STORE_REFERENCE);
    for (index, store) in config.stores.iter().enumerate() {
        if store.name.trim().is_empty() {
            errors.push(ValidationError::EmptyStoreName { index });
        } else if !stores.insert(store.name.as_str()) {
            errors.push(ValidationError::DuplicateStore {
                name: store.name.clone(),
            });
        }
    }

    let file_backed = config.locks.backend == LockBackend::File;
    let mut breakers: HashSet<&str> = HashSet::new();
    for (index, breaker) in config.breakers.iter().enumerate() {
        let name = breaker.breaker_name.as_str();
        if name.trim().is_empty() {
            errors.push(ValidationError::EmptyBreakerName { index });
            continue;
        }
        if !breakers.insert(name) {
            errors.push(ValidationError::DuplicateBreaker { name: name.to_string() });
        }
        if breaker.trip_threshold == 0 {
            errors.push(ValidationError::ZeroThreshold { name: name.to_string() });
        }
        let reference = breaker.object_store_reference.as_str();
        if !stores.contains(reference) {
            errors.push(ValidationError::UnknownStore {
                name: name.to_string(),
                reference: reference.to_string(),
            });
        } else if reference != DEFAULT_STORE_REFERENCE && !file_backed {
            // In-process locks cannot order other processes sharing the file
            errors.push(ValidationError::LocalLockOnFileStore {
                name: name.to_string(),
                reference: reference.to_string(),
            });
        }
    }

    if config.locks.backend == LockBackend::File && config.locks.dir.is_none() {
        errors.push(ValidationError::MissingLockDir);
    }
    if config.locks.poll_base_ms > config.locks.poll_max_ms {
        errors.push(ValidationError::PollBounds {
            base: config.locks.poll_base_ms,
            max: config.locks.poll_max_ms,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{BreakerConfig, StoreConfig};

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());

        let mut config = AppConfig::default();
        config.breakers.push(BreakerConfig::new("a"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = AppConfig::default();
        config.stores.push(StoreConfig {
            name: "shared".into(),
            path: "a.json".into(),
        });
        config.stores.push(StoreConfig {
            name: "shared".into(),
            path: "b.json".into(),
        });
        config.breakers.push(BreakerConfig::new("a").with_threshold(0));
        config.breakers.push(BreakerConfig::new("a").with_store("nowhere"));
        config.breakers.push(BreakerConfig::new("  "));
        config.locks.backend = LockBackend::File;
        config.locks.poll_base_ms = 500;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::DuplicateStore { name: "shared".into() },
                ValidationError::ZeroThreshold { name: "a".into() },
                ValidationError::DuplicateBreaker { name: "a".into() },
                ValidationError::UnknownStore {
                    name: "a".into(),
                    reference: "nowhere".into()
                },
                ValidationError::EmptyBreakerName { index: 2 },
                ValidationError::MissingLockDir,
                ValidationError::PollBounds { base: 500, max: 200 },
            ]
        );
    }

    #[test]
    fn test_declared_store_is_accepted() {
        let mut config = AppConfig::default();
        config.stores.push(StoreConfig {
            name: "shared".into(),
            path: "s.json".into(),
        });
        config.breakers.push(BreakerConfig::new("a").with_store("shared"));
        config.locks.backend = LockBackend::File;
        config.locks.dir = Some("locks".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_file_store_requires_file_locks() {
        let mut config = AppConfig::default();
        config.stores.push(StoreConfig {
            name: "shared".into(),
            path: "s.json".into(),
        });
        config.breakers.push(BreakerConfig::new("a").with_store("shared"));
        config.breakers.push(BreakerConfig::new("b"));

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::LocalLockOnFileStore {
                name: "a".into(),
                reference: "shared".into()
            }]
        );
        assert_eq!(
            errors[0].to_string(),
            "breaker 'a' uses file store 'shared', which needs locks.backend = \"file\""
        );
    }
}
