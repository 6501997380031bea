//! Tracing Setup
//!
//! Structured logging over `tracing` with an environment-driven filter.
//! Initialization is explicit and happens at most once per process;
//! library code only emits spans and events and never installs a
//! subscriber on its own.

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Telemetry setup errors.
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// A subscriber was already installed for this process.
    #[error("telemetry initialization failed: {reason}")]
    InitFailed {
        /// The reason for the failure.
        reason: String,
    },

    /// The filter directive string did not parse.
    #[error("invalid filter directive: {directive}")]
    InvalidFilter {
        /// The offending directive.
        directive: String,
    },
}

/// Configuration for the tracing subscriber.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Filter directives, `RUST_LOG` syntax. The `RUST_LOG` environment
    /// variable overrides this when set.
    pub filter: String,

    /// Whether to include span targets in output.
    pub with_target: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            with_target: true,
        }
    }
}

impl TelemetryConfig {
    /// Create a configuration with an explicit default filter.
    #[must_use]
    pub fn with_filter(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            ..Self::default()
        }
    }
}

/// Install the global tracing subscriber.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidFilter` when the configured directive
/// string does not parse, and `TelemetryError::InitFailed` when another
/// subscriber is already installed.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|_| TelemetryError::InvalidFilter {
            directive: config.filter.clone(),
        })?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target)
        .try_init()
        .map_err(|e| TelemetryError::InitFailed {
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.filter, "info");
        assert!(config.with_target);
    }

    #[test]
    fn test_with_filter() {
        let config = TelemetryConfig::with_filter("polystore=debug");
        assert_eq!(config.filter, "polystore=debug");
    }
}
