//! Configuration management for Tollgate.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, TollgateError};

/// Prefix for environment overrides, e.g. `TOLLGATE__STORE__URL`.
const ENV_PREFIX: &str = "TOLLGATE";

/// Main configuration for the Tollgate service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TollgateConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Counter store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Rate limiter behaviour
    #[serde(default)]
    pub limiter: LimiterConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

/// Shared counter store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Redis connection URL (address, credentials, database index, protocol)
    #[serde(default = "default_store_url")]
    pub url: String,

    /// Timeout for establishing the initial connection, in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Timeout for a single store round-trip, in milliseconds
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            connect_timeout_ms: default_connect_timeout(),
            operation_timeout_ms: default_operation_timeout(),
        }
    }
}

impl StoreConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

fn default_store_url() -> String {
    "redis://127.0.0.1:6379/0".to_string()
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_operation_timeout() -> u64 {
    1000
}

/// How the counter is checked and updated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Enforcement {
    /// Read the counter, then set or increment it in a second round-trip.
    /// Concurrent requests may briefly push a counter past its quota.
    #[default]
    Approximate,
    /// Increment and start the window in one atomic store-side operation.
    Strict,
}

/// What the gate does when the counter store cannot be consulted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Reject the request with a server error.
    #[default]
    Closed,
    /// Let the request through and log the failure.
    Open,
}

/// Rate limiter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LimiterConfig {
    #[serde(default)]
    pub enforcement: Enforcement,

    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl TollgateConfig {
    /// Load configuration from an optional YAML file plus `TOLLGATE__*`
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(
                ::config::File::from(path)
                    .format(::config::FileFormat::Yaml)
                    .required(true),
            );
        }

        builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| TollgateError::Config(e.to_string()))
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| TollgateError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TollgateConfig::default();
        assert_eq!(config.server.listen_addr.port(), 8080);
        assert_eq!(config.store.url, "redis://127.0.0.1:6379/0");
        assert_eq!(config.store.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.limiter.enforcement, Enforcement::Approximate);
        assert_eq!(config.limiter.failure_policy, FailurePolicy::Closed);
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
server:
  listen_addr: "0.0.0.0:9000"
store:
  url: "redis://:my_password@localhost:6379/0?protocol=resp3"
  operation_timeout_ms: 250
limiter:
  enforcement: strict
  failure_policy: open
"#;
        let config = TollgateConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.server.listen_addr.port(), 9000);
        assert_eq!(
            config.store.url,
            "redis://:my_password@localhost:6379/0?protocol=resp3"
        );
        assert_eq!(config.store.operation_timeout(), Duration::from_millis(250));
        assert_eq!(config.store.connect_timeout_ms, 5000);
        assert_eq!(config.limiter.enforcement, Enforcement::Strict);
        assert_eq!(config.limiter.failure_policy, FailurePolicy::Open);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = TollgateConfig::from_yaml("limiter:\n  failure_policy: open\n").unwrap();
        assert_eq!(config.limiter.failure_policy, FailurePolicy::Open);
        assert_eq!(config.limiter.enforcement, Enforcement::Approximate);
        assert_eq!(config.server.listen_addr.port(), 8080);
    }

    #[test]
    fn test_unknown_enforcement_rejected() {
        let result = TollgateConfig::from_yaml("limiter:\n  enforcement: sliding\n");
        assert!(matches!(result, Err(TollgateError::Config(_))));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = TollgateConfig::load(Some(Path::new("/nonexistent/tollgate.yaml")));
        assert!(matches!(result, Err(TollgateError::Config(_))));
    }
}
