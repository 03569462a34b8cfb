//! Configuration module for the gateway coordinator.
//!
//! YAML configuration with environment variable interpolation and
//! validation.
//!
//! # Usage
//!
//! ```rust,ignore
//! use gateway_coordinator::config::{Config, load_config};
//!
//! // Load from default path (config.yaml)
//! let config = load_config(None)?;
//!
//! // Access configuration values
//! println!("IB gateway: {}", config.brokers.ibkr.base_url);
//! ```

mod brokers;
mod collection;
mod connection;
mod logging;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use brokers::BrokersConfig;
pub use collection::CollectionConfig;
pub use connection::ConnectionConfig;
pub use logging::LoggingConfig;

use crate::application::services::GatewaySettings;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Broker gateway configuration.
    #[serde(default)]
    pub brokers: BrokersConfig,
    /// Connection lifecycle configuration.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Market-data collection configuration.
    #[serde(default)]
    pub collection: CollectionConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

// ============================================
// Configuration Loading
// ============================================

/// Load configuration from a YAML file with environment variable interpolation.
///
/// # Arguments
///
/// * `path` - Optional path to the config file. Defaults to "config.yaml".
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or("config.yaml");

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_string(),
        source: e,
    })?;

    load_config_from_string(&contents)
}

/// Load configuration from a YAML string (useful for testing).
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: Config = if interpolated.trim().is_empty() {
        Config::default()
    } else {
        serde_yaml_bw::from_str(&interpolated)?
    };
    validate_config(&config)?;
    Ok(config)
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}` syntax. A missing or empty
/// variable without a default becomes the empty string.
#[allow(clippy::expect_used)] // Regex is compile-time constant; expect() is safe here
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    re.replace_all(input, |cap: &regex::Captures<'_>| {
        let default_value = cap.get(2).map(|m| m.as_str());
        match cap.get(1).map(|m| std::env::var(m.as_str())) {
            Some(Ok(v)) if !v.is_empty() => v,
            _ => default_value.map_or_else(String::new, str::to_string),
        }
    })
    .into_owned()
}

/// Validate configuration values.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
    config
        .brokers
        .default_broker_type()
        .map_err(|e| ConfigError::ValidationError(format!("brokers.default_broker: {e}")))?;

    for (broker, settings) in config.brokers.configured() {
        validate_gateway_settings(broker.as_str(), settings)?;
    }

    if config.connection.keep_alive_floor_secs == 0 {
        return Err(ConfigError::ValidationError(
            "connection.keep_alive_floor_secs must be positive".to_string(),
        ));
    }

    if config.connection.keep_alive_idle_poll_secs == 0 {
        return Err(ConfigError::ValidationError(
            "connection.keep_alive_idle_poll_secs must be positive".to_string(),
        ));
    }

    if config.connection.test_client_id_offset <= 0 {
        return Err(ConfigError::ValidationError(
            "connection.test_client_id_offset must be positive".to_string(),
        ));
    }

    if !LoggingConfig::FORMATS
        .iter()
        .any(|f| f.eq_ignore_ascii_case(&config.logging.format))
    {
        return Err(ConfigError::ValidationError(format!(
            "logging.format must be one of: {:?}",
            LoggingConfig::FORMATS
        )));
    }

    Ok(())
}

fn validate_gateway_settings(name: &str, settings: &GatewaySettings) -> Result<(), ConfigError> {
    if settings.base_url.trim().is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "brokers.{name}.base_url must not be empty"
        )));
    }

    if settings.request_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(format!(
            "brokers.{name}.request_timeout_secs must be positive"
        )));
    }

    if settings.status_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(format!(
            "brokers.{name}.status_timeout_secs must be positive"
        )));
    }

    if settings.retry.max_attempts == 0 {
        return Err(ConfigError::ValidationError(format!(
            "brokers.{name}.retry.max_attempts must be at least 1"
        )));
    }

    if settings.retry.multiplier < 1.0 {
        return Err(ConfigError::ValidationError(format!(
            "brokers.{name}.retry.multiplier must be at least 1.0"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::BrokerType;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.brokers.default_broker, "ibkr");
        assert_eq!(config.brokers.ibkr.base_url, "http://localhost:8000");
        assert!(config.brokers.alpaca.is_none());
        assert_eq!(config.connection.test_client_id_offset, 1000);
        assert_eq!(config.connection.keep_alive_floor_secs, 30);
        assert_eq!(config.collection.between_timeframes_ms, 1000);
        assert_eq!(config.collection.between_setups_ms, 3000);
        assert_eq!(config.logging.format, "json");
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = match load_config_from_string("") {
            Ok(c) => c,
            Err(e) => panic!("empty config should load: {e}"),
        };
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_minimal_config() {
        let yaml = r#"
brokers:
  ibkr:
    base_url: "http://gateway:8000"
"#;

        let config = match load_config_from_string(yaml) {
            Ok(c) => c,
            Err(e) => panic!("should load minimal config: {e}"),
        };
        assert_eq!(config.brokers.ibkr.base_url, "http://gateway:8000");
        assert_eq!(config.brokers.ibkr.status_timeout_secs, 5); // Default value
    }

    #[test]
    fn test_env_var_with_default_when_missing() {
        let input = "base_url: ${GATEWAY_COORDINATOR_TEST_NONEXISTENT_VAR:-http://gw:8000}";
        let result = interpolate_env_vars(input);

        assert_eq!(result, "base_url: http://gw:8000");
    }

    #[test]
    #[expect(clippy::literal_string_with_formatting_args)] // ${...} is env var syntax, not format args
    fn test_env_var_with_default_uses_existing() {
        // PATH should always exist
        let input = "path: ${PATH:-default}";
        let result = interpolate_env_vars(input);

        assert_ne!(result, "path: default");
        assert!(result.starts_with("path: "));
    }

    #[test]
    fn test_env_var_without_default_becomes_empty() {
        let input = "base_url: ${GATEWAY_COORDINATOR_TEST_UNLIKELY_TO_EXIST}";
        let result = interpolate_env_vars(input);

        assert_eq!(result, "base_url: ");
    }

    #[test]
    fn test_validation_empty_base_url() {
        let yaml = r#"
brokers:
  ibkr:
    base_url: ""
"#;

        let Err(err) = load_config_from_string(yaml) else {
            panic!("expected error for empty base_url");
        };
        assert!(err.to_string().contains("brokers.ibkr.base_url"));
    }

    #[test]
    fn test_validation_zero_status_timeout() {
        let yaml = r"
brokers:
  alpaca:
    status_timeout_secs: 0
";

        let Err(err) = load_config_from_string(yaml) else {
            panic!("expected error for zero status timeout");
        };
        assert!(err.to_string().contains("brokers.alpaca.status_timeout_secs"));
    }

    #[test]
    fn test_validation_unknown_default_broker() {
        let yaml = r"
brokers:
  default_broker: etrade
";

        let Err(err) = load_config_from_string(yaml) else {
            panic!("expected error for unknown broker");
        };
        assert!(err.to_string().contains("default_broker"));
        assert!(err.to_string().contains("etrade"));
    }

    #[test]
    fn test_validation_invalid_log_format() {
        let yaml = r"
logging:
  format: xml
";

        let Err(err) = load_config_from_string(yaml) else {
            panic!("expected error for invalid log format");
        };
        assert!(err.to_string().contains("logging.format"));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let result = load_config(Some("/nonexistent/gateway-coordinator.yaml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn test_full_config_from_file() {
        let yaml = r#"
brokers:
  default_broker: IBKR
  ibkr:
    base_url: "http://ib-gateway:8000/"
    request_timeout_secs: 20
    connect_timeout_buffer_secs: 5
    status_timeout_secs: 3
    retry:
      max_attempts: 5
      initial_backoff_ms: 250
      max_backoff_ms: 4000
      multiplier: 2.0
  schwab:
    base_url: "https://api.schwab.example"

connection:
  test_client_id_offset: 500
  keep_alive_floor_secs: 45
  keep_alive_idle_poll_secs: 120

collection:
  between_timeframes_ms: 0
  between_setups_ms: 250

logging:
  level: "debug"
  format: "pretty"
"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let config = match load_config(file.path().to_str()) {
            Ok(c) => c,
            Err(e) => panic!("should load full config: {e}"),
        };

        assert_eq!(config.brokers.default_broker_type().unwrap(), BrokerType::Ibkr);
        assert_eq!(config.brokers.ibkr.request_timeout_secs, 20);
        assert_eq!(config.brokers.ibkr.retry.max_attempts, 5);
        assert_eq!(
            config.brokers.schwab.as_ref().map(|s| s.base_url.as_str()),
            Some("https://api.schwab.example")
        );
        assert_eq!(config.connection.test_client_id_offset, 500);
        assert_eq!(config.connection.schedule().floor, Duration::from_secs(45));
        assert_eq!(config.connection.schedule().idle_poll, Duration::from_secs(120));
        assert_eq!(
            config.collection.pacing(),
            crate::application::services::CollectionPacing::new(
                Duration::ZERO,
                Duration::from_millis(250)
            )
        );
        assert_eq!(config.logging.level, "debug");
        assert!(!config.logging.is_json());
        assert_eq!(config.brokers.configured().count(), 2);
    }
}
