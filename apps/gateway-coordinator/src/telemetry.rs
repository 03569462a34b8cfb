//! Tracing Setup
//!
//! Installs the global `tracing` subscriber.
//!
//! # Configuration
//!
//! - `RUST_LOG`: filter directives; when unset, `gateway_coordinator=<level>`
//!   is used with the level from `logging.level`
//! - `logging.format`: `json` for one JSON object per line, `pretty` for
//!   human-readable output
//!
//! # Usage
//!
//! ```rust,ignore
//! use gateway_coordinator::telemetry::init_tracing;
//!
//! init_tracing(&config.logging)?;
//! ```

use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Filter used when `RUST_LOG` is not set.
#[must_use]
pub fn default_filter(config: &LoggingConfig) -> EnvFilter {
    let directive = format!("gateway_coordinator={}", config.level.trim());
    EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("gateway_coordinator=info"))
}

/// Initialize the global tracing subscriber.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), TryInitError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(config));

    if config.is_json() {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(config.include_spans)
            .with_span_list(config.include_spans);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer().pretty();
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_uses_configured_level() {
        let config = LoggingConfig {
            level: "debug".to_string(),
            ..LoggingConfig::default()
        };
        assert_eq!(
            default_filter(&config).to_string().to_lowercase(),
            "gateway_coordinator=debug"
        );
    }

    #[test]
    fn invalid_level_falls_back_to_info() {
        let config = LoggingConfig {
            level: "verbose".to_string(),
            ..LoggingConfig::default()
        };
        assert_eq!(
            default_filter(&config).to_string().to_lowercase(),
            "gateway_coordinator=info"
        );
    }
}
