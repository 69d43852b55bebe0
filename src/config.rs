//! Configuration management for Floodgate.

use std::path::Path;
use std::time::Duration;

use ::config::builder::DefaultState;
use ::config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::error::{FloodgateError, Result};
use crate::ratelimit::{FailMode, LimiterOptions, DEFAULT_KEY_PREFIX};

/// Prefix for environment overrides, e.g. `FLOODGATE__STORE__TIMEOUT_MS=250`.
const ENV_PREFIX: &str = "FLOODGATE";

/// Main configuration for a Floodgate process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FloodgateConfig {
    /// Store access settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Where policies come from
    #[serde(default)]
    pub policies: PoliciesConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Store access configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Namespace for every limiter key
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Store round trip timeout in milliseconds; 0 disables the timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// What a store failure means to callers that opt into a fail mode
    #[serde(default)]
    pub fail_mode: FailMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            timeout_ms: default_timeout_ms(),
            fail_mode: FailMode::default(),
        }
    }
}

impl StoreConfig {
    /// Limiter options derived from these settings.
    pub fn limiter_options(&self) -> LimiterOptions {
        LimiterOptions {
            key_prefix: self.key_prefix.clone(),
            timeout: (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms)),
        }
    }
}

fn default_key_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}

fn default_timeout_ms() -> u64 {
    100
}

/// Policy source configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoliciesConfig {
    /// Path to the policy YAML file
    pub path: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl FloodgateConfig {
    /// Load configuration from an optional YAML file, then apply `FLOODGATE__*` overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        Self::build(builder)
    }

    /// Load configuration from a file path.
    pub fn from_file(path: &str) -> Result<Self> {
        Self::load(Some(Path::new(path)))
    }

    /// Load configuration from a YAML string, without environment overrides.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Self::build(Config::builder().add_source(File::from_str(yaml, FileFormat::Yaml)))
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        builder
            .build()
            .and_then(|c| c.try_deserialize::<FloodgateConfig>())
            .map_err(|e| FloodgateError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FloodgateConfig::default();
        assert_eq!(config.store.key_prefix, "floodgate");
        assert_eq!(config.store.timeout_ms, 100);
        assert_eq!(config.store.fail_mode, FailMode::Closed);
        assert_eq!(config.policies.path, None);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_from_yaml_overrides_some_fields() {
        let yaml = r#"
store:
  key_prefix: edge
  fail_mode: open
policies:
  path: /etc/floodgate/policies.yaml
logging:
  json: true
"#;
        let config = FloodgateConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.store.key_prefix, "edge");
        assert_eq!(config.store.timeout_ms, 100);
        assert_eq!(config.store.fail_mode, FailMode::Open);
        assert_eq!(config.policies.path.as_deref(), Some("/etc/floodgate/policies.yaml"));
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.json);
    }

    #[test]
    fn test_limiter_options() {
        let mut store = StoreConfig::default();
        let options = store.limiter_options();
        assert_eq!(options.key_prefix, "floodgate");
        assert_eq!(options.timeout, Some(Duration::from_millis(100)));

        store.timeout_ms = 0;
        assert_eq!(store.limiter_options().timeout, None);
    }

    #[test]
    fn test_environment_overrides() {
        std::env::set_var("FLOODGATE__STORE__TIMEOUT_MS", "250");
        std::env::set_var("FLOODGATE__STORE__KEY_PREFIX", "edge");
        let config = FloodgateConfig::load(None);
        std::env::remove_var("FLOODGATE__STORE__TIMEOUT_MS");
        std::env::remove_var("FLOODGATE__STORE__KEY_PREFIX");

        let config = config.unwrap();
        assert_eq!(config.store.timeout_ms, 250);
        assert_eq!(config.store.key_prefix, "edge");
        assert_eq!(config.store.fail_mode, FailMode::Closed);
        assert_eq!(
            config.store.limiter_options().timeout,
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn test_malformed_yaml() {
        let result = FloodgateConfig::from_yaml("store: [unterminated");
        assert!(matches!(result, Err(FloodgateError::Config(_))));
    }

    #[test]
    fn test_missing_required_file() {
        let result = FloodgateConfig::from_file("/nonexistent/floodgate.yaml");
        assert!(matches!(result, Err(FloodgateError::Config(_))));
    }
}
