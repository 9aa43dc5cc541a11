//! Configuration file loading and management
//!
//! This module handles loading and parsing the daemon configuration from
//! `$XDG_CONFIG_HOME/shopforge/config.toml`. If the configuration file doesn't
//! exist, a default configuration is created with documented comments.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Daemon-specific configuration
    #[serde(default)]
    pub daemon: DaemonConfig,
    /// Fan-out and health check deadlines
    #[serde(default)]
    pub execution: ExecutionConfig,
    /// Provider-specific configurations, keyed by provider name
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaemonConfig {
    /// Log level (trace, debug, info, warn, error)
    /// Default: "info"
    pub log_level: String,
}

/// Deadlines applied to individual provider calls
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionConfig {
    /// Per-provider deadline for fanned-out operations, in milliseconds.
    /// 0 disables the deadline.
    /// Default: 10000
    pub operation_timeout_ms: u64,
    /// Per-provider deadline for health checks, in milliseconds.
    /// 0 disables the deadline.
    /// Default: 5000
    pub health_check_timeout_ms: u64,
}

/// Per-provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    /// Whether this provider takes part in fan-out. Disabled providers are
    /// still registered and health-checked.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Provider-specific settings as arbitrary TOML value
    #[serde(default = "default_settings")]
    pub settings: toml::Value,
}

fn default_enabled() -> bool {
    true
}

fn default_settings() -> toml::Value {
    toml::Value::Table(toml::map::Map::new())
}

fn millis(ms: u64) -> Option<Duration> {
    (ms > 0).then_some(Duration::from_millis(ms))
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            operation_timeout_ms: 10_000,
            health_check_timeout_ms: 5_000,
        }
    }
}

impl ExecutionConfig {
    pub fn operation_timeout(&self) -> Option<Duration> {
        millis(self.operation_timeout_ms)
    }

    pub fn health_check_timeout(&self) -> Option<Duration> {
        millis(self.health_check_timeout_ms)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            settings: default_settings(),
        }
    }
}

impl Config {
    /// Load configuration from the specified path
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    /// The parsed configuration or an error if loading/parsing fails
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the default XDG config location
    ///
    /// If the configuration file doesn't exist, creates a default configuration
    /// file with documented comments.
    pub fn load_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_file(&config_path)?;
        }

        Self::load(&config_path)
    }

    /// Get the default configuration file path
    ///
    /// Returns `$XDG_CONFIG_HOME/shopforge/config.toml`
    pub fn default_config_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("", "", "shopforge")
            .context("Failed to determine project directories")?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Create a default configuration file with documented comments
    fn create_default_file(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, Self::default_config_content())
            .with_context(|| format!("Failed to write default config file: {}", path.display()))?;

        tracing::info!("Created default configuration file at: {}", path.display());
        Ok(())
    }

    /// Generate the default configuration file content with comments
    fn default_config_content() -> &'static str {
        r#"# Shopforge Daemon Configuration

[daemon]
# Log level: trace, debug, info, warn, error
# RUST_LOG takes precedence when set.
# Default: "info"
log_level = "info"

[execution]
# Deadline for a single provider's part of a fanned-out operation.
# A provider that misses it is reported with the error "timeout".
# 0 disables the deadline. Default: 10000
operation_timeout_ms = 10000

# Deadline for a single provider's health check; a miss counts as unhealthy.
# 0 disables the deadline. Default: 5000
health_check_timeout_ms = 5000

# Provider-specific configurations
# Each provider can be configured with:
# - enabled: Whether the provider takes part in searches and other fan-out
#   operations (default: true). Disabled providers stay registered.
# - settings: Provider-specific settings (varies by provider)

[providers.amazon_search]
enabled = true

[providers.amazon_search.settings]
# base_url = "https://www.amazon.com"

[providers.ai_similarity_comparison]
enabled = true
"#
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.daemon.log_level.as_str()) {
            anyhow::bail!(
                "Invalid log_level: {}. Must be one of: {}",
                self.daemon.log_level,
                valid_log_levels.join(", ")
            );
        }

        for (name, provider_config) in &self.providers {
            if name.trim().is_empty() {
                anyhow::bail!("Provider configuration with an empty name");
            }
            if !provider_config.settings.is_table() {
                anyhow::bail!("Provider '{}': settings must be a table", name);
            }
        }

        Ok(())
    }

    /// Whether the named provider should take part in fan-out. Providers
    /// without a section are enabled.
    pub fn provider_enabled(&self, name: &str) -> bool {
        self.providers.get(name).map_or(true, |p| p.enabled)
    }

    /// Settings table for the named provider, if configured.
    pub fn provider_settings(&self, name: &str) -> Option<&toml::Value> {
        self.providers.get(name).map(|p| &p.settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.daemon.log_level, "info");
        assert_eq!(config.execution.operation_timeout_ms, 10_000);
        assert_eq!(config.execution.health_check_timeout_ms, 5_000);
        assert!(config.providers.is_empty());
    }

    #[test]
    fn test_default_content_parses_and_validates() {
        let config: Config = toml::from_str(Config::default_config_content()).unwrap();
        assert!(config.validate().is_ok());
        assert!(config.provider_enabled("amazon_search"));
        assert!(config.provider_enabled("ai_similarity_comparison"));
        assert_eq!(config.execution, ExecutionConfig::default());
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[daemon]
log_level = "debug"

[execution]
operation_timeout_ms = 250
health_check_timeout_ms = 0

[providers.amazon_search]
enabled = false

[providers.amazon_search.settings]
region = "us"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(config_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.daemon.log_level, "debug");
        assert_eq!(
            config.execution.operation_timeout(),
            Some(Duration::from_millis(250))
        );
        assert_eq!(config.execution.health_check_timeout(), None);
        assert!(!config.provider_enabled("amazon_search"));
        assert_eq!(
            config
                .provider_settings("amazon_search")
                .and_then(|s| s.get("region"))
                .and_then(|v| v.as_str()),
            Some("us")
        );
    }

    #[test]
    fn test_load_minimal_config() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[providers.ai_similarity_comparison]\n").unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.daemon, DaemonConfig::default());
        assert!(config.provider_enabled("ai_similarity_comparison"));
        assert!(config.provider_enabled("never_mentioned"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(dir.path().join("absent.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_create_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        Config::create_default_file(&path).unwrap();
        let config = Config::load(&path).unwrap();
        assert!(config.providers.contains_key("amazon_search"));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.daemon.log_level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_non_table_settings() {
        let mut config = Config::default();
        config.providers.insert(
            "amazon_search".to_string(),
            ProviderConfig {
                enabled: true,
                settings: toml::Value::String("oops".to_string()),
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_full_config_roundtrip() {
        let mut config = Config::default();
        config.daemon.log_level = "debug".to_string();
        config.execution.operation_timeout_ms = 1_500;
        config
            .providers
            .insert("amazon_search".to_string(), ProviderConfig::default());

        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(config, deserialized);
    }
}
