//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::env::apply_env;
use crate::config::schema::GateConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a TOML document into a configuration without validating it.
pub fn parse_config(content: &str) -> Result<GateConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Load the configuration: defaults, then the optional TOML file, then the
/// process environment, then validation.
pub fn load_config(path: Option<&Path>) -> Result<GateConfig, ConfigError> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// Same as [`load_config`] with an injected environment lookup.
pub fn load_config_with<F>(path: Option<&Path>, lookup: F) -> Result<GateConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => parse_config(&fs::read_to_string(path)?)?,
        None => GateConfig::default(),
    };

    apply_env(&mut config, lookup).map_err(ConfigError::Validation)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{CheckKind, StoreFailurePolicy};

    #[test]
    fn test_parse_partial_file() {
        let config = parse_config(
            r#"
            [cors]
            allowed_origins = ["https://www.example.org"]

            [rate_limit]
            max_attempts = 3
            store_failure = "closed"

            [[health.checks]]
            name = "database"
            kind = "tcp"
            target = "db:5432"

            [[health.checks]]
            name = "cache"
            kind = "redis"
            target = "redis://cache:6379"
            critical = false
            "#,
        )
        .unwrap();

        assert_eq!(config.cors.allowed_origins, vec!["https://www.example.org"]);
        assert_eq!(config.cors.allowed_methods, vec!["GET", "POST", "OPTIONS"]);
        assert_eq!(config.rate_limit.max_attempts, 3);
        assert_eq!(config.rate_limit.lockout_secs, 600);
        assert_eq!(config.rate_limit.store_failure, StoreFailurePolicy::Closed);
        assert_eq!(config.health.checks.len(), 2);
        assert!(config.health.checks[0].critical);
        assert_eq!(config.health.checks[1].kind, CheckKind::Redis);
        assert!(!config.health.checks[1].critical);
    }

    #[test]
    fn test_environment_wins_over_defaults() {
        let config = load_config_with(None, |key| match key {
            "LOGIN_MAX_ATTEMPTS" => Some("7".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.rate_limit.max_attempts, 7);
    }

    #[test]
    fn test_invalid_environment_is_rejected() {
        let err = load_config_with(None, |key| match key {
            "BIND_ADDRESS" => Some("not-an-address".to_string()),
            _ => None,
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config_with(Some(Path::new("/nonexistent/site-gate.toml")), |_| None)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
