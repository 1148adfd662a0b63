//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/splunk-monitoring/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/splunk-monitoring/` (~/.config/splunk-monitoring/)
//! - State/Logs: `$XDG_STATE_HOME/splunk-monitoring/` (~/.local/state/splunk-monitoring/)
//!
//! ```toml
//! [splunk]
//! endpoint = "https://splunk.example.com:8088"
//! token = "00000000-0000-0000-0000-000000000000"
//! index = "frontend"
//!
//! [context.runtime_info]
//! account = "acme"
//! workspace = "master"
//! production = true
//! render_major = 8
//!
//! [context.app_info]
//! app_id = "acme.store"
//! app_version = "1.2.3"
//! ```
//!
//! `SPLUNK_TOKEN` and `SPLUNK_ENDPOINT` override the file values.

use crate::client::MonitoringConfig;
use crate::context::EnvironmentContext;
use crate::error::{Error, Result};
use crate::transport::TransportOptions;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable overriding `splunk.token`
pub const TOKEN_ENV: &str = "SPLUNK_TOKEN";
/// Environment variable overriding `splunk.endpoint`
pub const ENDPOINT_ENV: &str = "SPLUNK_ENDPOINT";

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Collector connection settings
    #[serde(default)]
    pub splunk: SplunkConfig,

    /// Environment context (optional)
    #[serde(default)]
    pub context: Option<EnvironmentContext>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Splunk HTTP Event Collector settings
#[derive(Debug, Deserialize, Clone)]
pub struct SplunkConfig {
    /// HEC token
    pub token: Option<String>,

    /// Collector base URL (e.g., `https://splunk.example.com:8088`)
    pub endpoint: Option<String>,

    /// Attach host metadata to every event
    #[serde(default = "default_inject_additional_info")]
    pub inject_additional_info: bool,

    /// Passthrough fields for the transport
    #[serde(flatten)]
    pub options: TransportOptions,
}

impl Default for SplunkConfig {
    fn default() -> Self {
        Self {
            token: None,
            endpoint: None,
            inject_additional_info: default_inject_additional_info(),
            options: TransportOptions::default(),
        }
    }
}

fn default_inject_additional_info() -> bool {
    true
}

impl SplunkConfig {
    /// Check if token and endpoint are both present
    pub fn is_ready(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
            && self.endpoint.as_deref().is_some_and(|e| !e.is_empty())
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from the default path, then apply env overrides
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Config::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("failed to parse config: {}", e)))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var(TOKEN_ENV) {
            self.splunk.token = Some(token);
        }
        if let Ok(endpoint) = std::env::var(ENDPOINT_ENV) {
            self.splunk.endpoint = Some(endpoint);
        }
    }

    /// Build the client configuration
    ///
    /// Fails if the token or endpoint is missing.
    pub fn monitoring(&self) -> Result<MonitoringConfig> {
        let token = self
            .splunk
            .token
            .clone()
            .ok_or_else(|| Error::Config("splunk.token is required".to_string()))?;
        let endpoint = self
            .splunk
            .endpoint
            .clone()
            .ok_or_else(|| Error::Config("splunk.endpoint is required".to_string()))?;

        let mut config = MonitoringConfig::new(token, endpoint)
            .inject_additional_info(self.splunk.inject_additional_info)
            .with_options(self.splunk.options.clone());
        if let Some(context) = &self.context {
            config = config.with_context(context.clone());
        }

        config.validate()?;
        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/splunk-monitoring/config.toml`
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("splunk-monitoring").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/splunk-monitoring/`
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("splunk-monitoring")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/splunk-monitoring/splunk-monitoring.log`
    pub fn log_path() -> PathBuf {
        Self::state_dir().join(crate::logging::LOG_FILE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.context.is_none());
        assert!(config.splunk.inject_additional_info);
        assert_eq!(config.splunk.options.path, "/services/collector/event");
        assert_eq!(config.splunk.options.sourcetype, "log");
        assert_eq!(config.logging.level, "info");
        assert!(!config.splunk.is_ready());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[splunk]
endpoint = "https://splunk.example.com:8088"
token = "abc"
inject_additional_info = false
index = "frontend"
timeout_secs = 5

[context.runtime_info]
account = "acme"
workspace = "master"
production = true
render_major = 8

[context.app_info]
app_id = "acme.store"
app_version = "1.2.3"

[logging]
level = "debug"
"#;
        let config = Config::parse(toml).unwrap();
        assert!(config.splunk.is_ready());
        assert!(!config.splunk.inject_additional_info);
        assert_eq!(config.splunk.options.index.as_deref(), Some("frontend"));
        assert_eq!(config.splunk.options.timeout_secs, 5);
        assert_eq!(config.logging.level, "debug");

        let monitoring = config.monitoring().unwrap();
        assert_eq!(monitoring.token, "abc");
        assert!(!monitoring.inject_additional_info);
        assert_eq!(monitoring.context.unwrap().account(), "acme");
    }

    #[test]
    fn test_monitoring_requires_credentials() {
        let config = Config::default();
        assert!(config.monitoring().is_err());

        let config = Config::parse("[splunk]\nendpoint = \"https://splunk.example.com\"\n").unwrap();
        assert!(config.monitoring().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[splunk]\ntoken = \"t\"\nendpoint = \"https://s\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.splunk.token.as_deref(), Some("t"));

        assert!(Config::load_from(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            Config::parse("[splunk\ntoken = 1"),
            Err(Error::Config(_))
        ));
    }
}
