//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the breaker
//! runtime. All types derive Serde traits for deserialization from config
//! files. Breaker options are camelCase (`breakerName`, `tripThreshold`)
//! so they match the JSON produced by `dump_config_json`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::store::DEFAULT_STORE_REFERENCE;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Logging settings.
    pub logging: LoggingConfig,

    /// Metrics exporter settings.
    pub metrics: MetricsConfig,

    /// Lock backend settings.
    pub locks: LockConfig,

    /// File-backed object stores, in addition to the default in-memory store.
    pub stores: Vec<StoreConfig>,

    /// Breaker definitions.
    pub breakers: Vec<BreakerConfig>,
}

impl AppConfig {
    pub fn breaker(&self, name: &str) -> Option<&BreakerConfig> {
        self.breakers.iter().find(|b| b.breaker_name == name)
    }
}

/// Which lock a breaker serializes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LockScope {
    /// One lock per object store: every breaker sharing the store serializes.
    #[default]
    Store,
    /// One lock per breaker name.
    Breaker,
}

/// Immutable parameters of one breaker.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerConfig {
    /// Identifies the breaker and prefixes its store keys.
    pub breaker_name: String,

    /// Object store holding this breaker's record.
    #[serde(default = "default_store_reference")]
    pub object_store_reference: String,

    /// Counted failures that open a closed breaker.
    #[serde(default = "default_trip_threshold")]
    pub trip_threshold: u32,

    /// Cooldown in milliseconds before an open breaker admits a probe.
    #[serde(default = "default_trip_reset_time")]
    pub trip_reset_time: u64,

    /// Lock granularity.
    #[serde(default)]
    pub lock_scope: LockScope,
}

fn default_store_reference() -> String {
    DEFAULT_STORE_REFERENCE.to_string()
}

fn default_trip_threshold() -> u32 {
    3
}

fn default_trip_reset_time() -> u64 {
    60_000
}

impl BreakerConfig {
    /// A breaker with default settings.
    pub fn new(breaker_name: impl Into<String>) -> Self {
        Self {
            breaker_name: breaker_name.into(),
            object_store_reference: default_store_reference(),
            trip_threshold: default_trip_threshold(),
            trip_reset_time: default_trip_reset_time(),
            lock_scope: LockScope::default(),
        }
    }

    pub fn with_store(mut self, reference: impl Into<String>) -> Self {
        self.object_store_reference = reference.into();
        self
    }

    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.trip_threshold = threshold;
        self
    }

    pub fn with_reset_time(mut self, reset: Duration) -> Self {
        self.trip_reset_time = reset.as_millis() as u64;
        self
    }

    pub fn with_lock_scope(mut self, scope: LockScope) -> Self {
        self.lock_scope = scope;
        self
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.trip_reset_time)
    }

    /// Name of the lock guarding this breaker's record.
    pub fn lock_key(&self) -> &str {
        match self.lock_scope {
            LockScope::Store => &self.object_store_reference,
            LockScope::Breaker => &self.breaker_name,
        }
    }
}

/// A file-backed object store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Reference used by `objectStoreReference`.
    pub name: String,

    /// JSON file holding the store contents.
    pub path: String,
}

/// Lock backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LockBackend {
    /// Threads of this process only.
    #[default]
    Local,
    /// Lock files shared by every process using `dir`.
    File,
}

/// Lock configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LockConfig {
    pub backend: LockBackend,

    /// Directory for lock files (file backend).
    pub dir: Option<String>,

    /// Bounded wait for acquisition; absent waits forever.
    pub acquire_timeout_ms: Option<u64>,

    /// Initial polling delay for contended lock files.
    pub poll_base_ms: u64,

    /// Maximum polling delay for contended lock files.
    pub poll_max_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            backend: LockBackend::Local,
            dir: None,
            acquire_timeout_ms: None,
            poll_base_ms: 5,
            poll_max_ms: 200,
        }
    }
}

impl LockConfig {
    pub fn acquire_timeout(&self) -> Option<Duration> {
        self.acquire_timeout_ms.map(Duration::from_millis)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub level: String,

    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Serve the Prometheus endpoint (monitor command only).
    pub enabled: bool,

    /// Metrics endpoint bind address.
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breaker_defaults() {
        let config: BreakerConfig = toml::from_str(r#"breakerName = "payments""#).unwrap();
        assert_eq!(config, BreakerConfig::new("payments"));
        assert_eq!(config.object_store_reference, "_defaultInMemoryObjectStore");
        assert_eq!(config.trip_threshold, 3);
        assert_eq!(config.trip_reset_time, 60_000);
        assert_eq!(config.lock_scope, LockScope::Store);
    }

    #[test]
    fn test_lock_key_follows_scope() {
        let config = BreakerConfig::new("payments").with_store("shared");
        assert_eq!(config.lock_key(), "shared");

        let config = config.with_lock_scope(LockScope::Breaker);
        assert_eq!(config.lock_key(), "payments");
    }

    #[test]
    fn test_full_document() {
        let doc = r#"
            [logging]
            level = "debug"
            format = "json"

            [locks]
            backend = "file"
            dir = "/tmp/breaker-locks"
            acquire_timeout_ms = 250

            [[stores]]
            name = "shared"
            path = "/tmp/shared.json"

            [[breakers]]
            breakerName = "inventory"
            objectStoreReference = "shared"
            tripThreshold = 5
            tripResetTime = 30000
            lockScope = "breaker"
        "#;
        let config: AppConfig = toml::from_str(doc).unwrap();

        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.locks.backend, LockBackend::File);
        assert_eq!(config.locks.acquire_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.locks.poll_max_ms, 200);
        assert!(!config.metrics.enabled);

        let breaker = config.breaker("inventory").unwrap();
        assert_eq!(breaker.trip_threshold, 5);
        assert_eq!(breaker.reset_timeout(), Duration::from_secs(30));
        assert_eq!(breaker.lock_scope, LockScope::Breaker);
        assert!(config.breaker("missing").is_none());
    }
}
