//! # Observability
//!
//! Structured logging setup for the gateway binaries using the `tracing`
//! ecosystem. The `RUST_LOG` environment variable overrides the configured
//! default filter.

use crate::config::ObservabilityConfig;
use crate::errors::{Result, ToolgateError};
use tracing_subscriber::EnvFilter;

fn build_filter(config: &ObservabilityConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
}

/// Initialize tracing for the gateway server.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<()> {
    let filter = build_filter(config);

    let result = if config.json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };

    result.map_err(|e| ToolgateError::config(format!("Failed to initialize tracing: {}", e)))
}

/// Initialize tracing for the stdio bridge.
///
/// The bridge owns stdout as its reply channel, so all log output must go
/// to stderr.
pub fn init_stderr_tracing(config: &ObservabilityConfig) -> Result<()> {
    let filter = build_filter(config);

    let result = if config.json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init()
    };

    result.map_err(|e| ToolgateError::config(format!("Failed to initialize tracing: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_is_idempotent_enough() {
        let config = ObservabilityConfig::default();
        // Only one subscriber can win; the second call must fail cleanly
        // rather than panic.
        let first = init_tracing(&config);
        let second = init_tracing(&config);
        assert!(first.is_ok() || second.is_err());
    }
}
