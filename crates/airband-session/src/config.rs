//! Configuration loading and typed config structures.
//!
//! Configuration lives in an optional `airband-config.yaml`. Every field
//! has a default, so running without a file gives the reference behavior:
//! a 15 second heartbeat timeout swept every 5 seconds, served on
//! `0.0.0.0:3000` at `/ws`.
//!
//! Environment variables are applied after the file:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `HOST` | `server.host` |
//! | `PORT` | `server.port` |
//! | `AIRBAND_HEARTBEAT_TIMEOUT_MS` | `session.heartbeat_timeout_ms` |
//! | `AIRBAND_SWEEP_INTERVAL_MS` | `session.sweep_interval_ms` |
//! | `AIRBAND_LOG_LEVEL` | `logging.level` |
//! | `AIRBAND_LOG_FORMAT` | `logging.format` |

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "airband-config.yaml";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is out of range or an override is unparsable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AirbandConfig {
    /// Listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Liveness timing.
    #[serde(default)]
    pub session: SessionConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AirbandConfig {
    /// Load configuration from a YAML file, then apply environment overrides.
    ///
    /// A missing file yields the defaults (still subject to overrides).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file exists but cannot be read,
    /// [`ConfigError::Yaml`] if it is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let mut config = Self::default();
                config.apply_env_overrides()?;
                config.validate()?;
                Ok(config)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Parse configuration from a YAML string, then apply environment
    /// overrides.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config = Self::parse_without_env(yaml)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string without consulting the
    /// environment.
    pub fn parse_without_env(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not to an empty map.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = parse_override("PORT", &port)?;
        }
        if let Some(ms) = lookup("AIRBAND_HEARTBEAT_TIMEOUT_MS") {
            self.session.heartbeat_timeout_ms = parse_override("AIRBAND_HEARTBEAT_TIMEOUT_MS", &ms)?;
        }
        if let Some(ms) = lookup("AIRBAND_SWEEP_INTERVAL_MS") {
            self.session.sweep_interval_ms = parse_override("AIRBAND_SWEEP_INTERVAL_MS", &ms)?;
        }
        if let Some(level) = lookup("AIRBAND_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("AIRBAND_LOG_FORMAT") {
            self.logging.format = match format.to_ascii_lowercase().as_str() {
                "text" => LogFormat::Text,
                "json" => LogFormat::Json,
                other => {
                    return Err(ConfigError::Invalid(format!(
                        "AIRBAND_LOG_FORMAT must be `text` or `json`, got `{other}`"
                    )));
                }
            };
        }
        Ok(())
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.heartbeat_timeout_ms == 0 {
            return Err(ConfigError::Invalid(String::from(
                "session.heartbeat_timeout_ms must be greater than zero",
            )));
        }
        if self.session.sweep_interval_ms == 0 {
            return Err(ConfigError::Invalid(String::from(
                "session.sweep_interval_ms must be greater than zero",
            )));
        }
        if !self.server.ws_path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "server.ws_path must start with `/`, got `{}`",
                self.server.ws_path
            )));
        }
        Ok(())
    }
}

fn parse_override<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| ConfigError::Invalid(format!("invalid {key}: {e}")))
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path of the WebSocket upgrade endpoint.
    #[serde(default = "default_ws_path")]
    pub ws_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            ws_path: default_ws_path(),
        }
    }
}

/// Liveness timing for device connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SessionConfig {
    /// A device idle for longer than this is evicted.
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,

    /// Period of the liveness sweep.
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

impl SessionConfig {
    /// Sweep period as a [`Duration`].
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
        }
    }
}

fn default_host() -> String {
    String::from("0.0.0.0")
}

const fn default_port() -> u16 {
    3000
}

fn default_ws_path() -> String {
    String::from("/ws")
}

const fn default_heartbeat_timeout_ms() -> u64 {
    15_000
}

const fn default_sweep_interval_ms() -> u64 {
    5_000
}

fn default_log_level() -> String {
    String::from("info")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_match_reference_timing() {
        let config = AirbandConfig::default();
        assert_eq!(config.session.heartbeat_timeout_ms, 15_000);
        assert_eq!(config.session.sweep_interval_ms, 5_000);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.ws_path, "/ws");
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let yaml = "session:\n  sweep_interval_ms: 1000\nlogging:\n  format: json\n";
        let config = AirbandConfig::parse_without_env(yaml).unwrap();
        assert_eq!(config.session.sweep_interval_ms, 1_000);
        assert_eq!(config.session.heartbeat_timeout_ms, 15_000);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.server, ServerConfig::default());
    }

    #[test]
    fn empty_yaml_is_default() {
        assert_eq!(
            AirbandConfig::parse_without_env("").unwrap(),
            AirbandConfig::default()
        );
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = AirbandConfig::parse_without_env("session:\n  heartbeat_timeout_ms: 0\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn bad_yaml_is_a_yaml_error() {
        let err = AirbandConfig::parse_without_env("session: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
    }

    #[test]
    fn overrides_apply_on_top_of_file_values() {
        let env: HashMap<&str, &str> = [
            ("PORT", "8080"),
            ("HOST", "127.0.0.1"),
            ("AIRBAND_HEARTBEAT_TIMEOUT_MS", "30000"),
            ("AIRBAND_LOG_FORMAT", "JSON"),
        ]
        .into_iter()
        .collect();
        let mut config = AirbandConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| (*v).to_owned()))
            .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.session.heartbeat_timeout_ms, 30_000);
        assert_eq!(config.session.sweep_interval_ms, 5_000);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn unparsable_override_is_invalid() {
        let mut config = AirbandConfig::default();
        let err = config
            .apply_overrides(|key| (key == "PORT").then(|| String::from("eighty")))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref msg) if msg.contains("PORT")));
    }

    #[test]
    fn sweep_interval_follows_millis() {
        let session = SessionConfig::default();
        assert_eq!(session.sweep_interval(), Duration::from_secs(5));
    }

    #[test]
    fn missing_file_loads_defaults() {
        let path = std::env::temp_dir().join("airband-config-that-does-not-exist.yaml");
        assert!(AirbandConfig::load(&path).is_ok());
    }

    #[test]
    fn unreadable_path_is_an_io_error() {
        let err = AirbandConfig::load(&std::env::temp_dir()).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
