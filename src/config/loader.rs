//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("breaker.toml");
        fs::write(
            &path,
            r#"
                [[breakers]]
                breakerName = "search"
                tripThreshold = 2
            "#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.breakers.len(), 1);
        assert_eq!(config.breakers[0].trip_threshold, 2);
    }

    #[test]
    fn test_validation_errors_are_joined() {
        let err = parse_config(
            r#"
                [[breakers]]
                breakerName = "x"
                tripThreshold = 0

                [[breakers]]
                breakerName = "x"
            "#,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation failed: breaker 'x' has tripThreshold 0, breaker 'x' is defined more than once"
        );
    }

    #[test]
    fn test_missing_breaker_name_is_parse_error() {
        let err = parse_config("[[breakers]]\ntripThreshold = 2\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_sample_config_is_valid() {
        let config = parse_config(include_str!("../../breaker.toml")).unwrap();
        assert_eq!(config.breakers.len(), 2);
        assert_eq!(config.stores[0].name, "shared");
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/breaker.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
