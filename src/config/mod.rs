//! # Configuration Management
//!
//! Environment-driven configuration for the Toolgate gateway. Every struct
//! has a `from_env()` constructor reading `TOOLGATE_*` variables and is
//! validated before use.

use crate::errors::{Result, ToolgateError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ToolgateError::config(format!("Invalid value for {}: {}", key, e))),
        Err(_) => Ok(default),
    }
}

fn parse_env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| {
            let v = v.trim();
            v.eq_ignore_ascii_case("true") || v == "1"
        })
        .unwrap_or(default)
}

/// HTTP API server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ApiServerConfig {
    /// Bind address for the HTTP listener
    #[validate(length(min = 1, message = "Bind address cannot be empty"))]
    pub bind_address: String,

    /// Listen port for the HTTP listener
    #[validate(range(min = 1, message = "Port must be non-zero"))]
    pub port: u16,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self { bind_address: "0.0.0.0".to_string(), port: 8080 }
    }
}

impl ApiServerConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            bind_address: env_or("TOOLGATE_API_BIND_ADDRESS", "0.0.0.0"),
            port: parse_env("TOOLGATE_API_PORT", 8080)?,
        })
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DatabaseConfig {
    /// Database connection URL
    #[validate(length(min = 1, message = "Database URL cannot be empty"))]
    pub url: String,

    /// Maximum number of connections in the pool
    #[validate(range(min = 1, max = 100, message = "Max connections must be between 1 and 100"))]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    #[validate(range(max = 50, message = "Min connections must be at most 50"))]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[validate(range(min = 1, max = 60, message = "Connect timeout must be between 1 and 60 seconds"))]
    pub connect_timeout_seconds: u64,

    /// Idle timeout in seconds (0 = no timeout)
    pub idle_timeout_seconds: u64,

    /// Enable automatic migrations on startup
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./data/toolgate.db".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_seconds: 5,
            idle_timeout_seconds: 600,
            auto_migrate: true,
        }
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            url: env_or("TOOLGATE_DATABASE_URL", "sqlite://./data/toolgate.db"),
            max_connections: parse_env("TOOLGATE_DATABASE_MAX_CONNECTIONS", 10)?,
            min_connections: parse_env("TOOLGATE_DATABASE_MIN_CONNECTIONS", 1)?,
            connect_timeout_seconds: parse_env("TOOLGATE_DATABASE_CONNECT_TIMEOUT_SECONDS", 5)?,
            idle_timeout_seconds: parse_env("TOOLGATE_DATABASE_IDLE_TIMEOUT_SECONDS", 600)?,
            auto_migrate: parse_env_bool("TOOLGATE_AUTO_MIGRATE", true),
        })
    }

    pub fn is_sqlite(&self) -> bool {
        self.url.starts_with("sqlite:")
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        if self.idle_timeout_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.idle_timeout_seconds))
        }
    }
}

/// Protocol gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GatewayConfig {
    /// Public base URL advertised in generated IDE configuration
    #[validate(length(min = 1, message = "Public base URL cannot be empty"))]
    pub public_base_url: String,

    /// Timeout for downstream tool HTTP calls in seconds
    #[validate(range(min = 1, max = 300, message = "Request timeout must be between 1 and 300 seconds"))]
    pub request_timeout_seconds: u64,

    /// Interval between SSE heartbeat events in seconds
    #[validate(range(min = 1, max = 300, message = "Heartbeat interval must be between 1 and 300 seconds"))]
    pub heartbeat_interval_seconds: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            public_base_url: "http://127.0.0.1:8080".to_string(),
            request_timeout_seconds: 30,
            heartbeat_interval_seconds: 15,
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            public_base_url: env_or("TOOLGATE_PUBLIC_BASE_URL", "http://127.0.0.1:8080"),
            request_timeout_seconds: parse_env("TOOLGATE_REQUEST_TIMEOUT_SECONDS", 30)?,
            heartbeat_interval_seconds: parse_env("TOOLGATE_HEARTBEAT_INTERVAL_SECONDS", 15)?,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_seconds)
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Default log level filter (overridden by `RUST_LOG`)
    pub log_level: String,

    /// Emit logs as JSON instead of human-readable lines
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { log_level: "info".to_string(), json_logs: false }
    }
}

impl ObservabilityConfig {
    pub fn from_env() -> Self {
        Self {
            log_level: env_or("TOOLGATE_LOG_LEVEL", "info"),
            json_logs: env_or("TOOLGATE_LOG_FORMAT", "pretty").eq_ignore_ascii_case("json"),
        }
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api: ApiServerConfig,
    pub database: DatabaseConfig,
    pub gateway: GatewayConfig,
}

impl Config {
    /// Load and validate configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let config = Self {
            api: ApiServerConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            gateway: GatewayConfig::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(&self.api).map_err(ToolgateError::from)?;
        Validate::validate(&self.database).map_err(ToolgateError::from)?;
        Validate::validate(&self.gateway).map_err(ToolgateError::from)?;

        if !self.database.url.starts_with("sqlite:") {
            return Err(ToolgateError::validation("Database URL must start with 'sqlite:'"));
        }

        Ok(())
    }
}
