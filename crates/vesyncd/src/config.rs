//! Configuration file parsing and structures.
//!
//! vesyncd is configured with a single TOML file:
//! - `[logging]`: global level plus per-target overrides
//! - `[api]`: the HTTP API listener
//! - `[integrations.vesync.<entry_id>]`: one table per VeSync account

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::filter::Targets;

use crate::integrations::vesync::VeSyncConfig;

/// Top-level configuration structure
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub integrations: IntegrationsConfig,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default)]
    pub level: LogLevel,

    /// Per-target levels, e.g. `"vesyncd::api" = "debug"`
    #[serde(default)]
    pub overrides: HashMap<String, LogLevel>,
}

impl LoggingConfig {
    /// Build the subscriber filter for this configuration.
    pub fn targets(&self) -> Targets {
        self.overrides
            .iter()
            .fold(Targets::new(), |targets, (target, level)| {
                targets.with_target(target.clone(), LevelFilter::from(*level))
            })
            .with_default(LevelFilter::from(self.level))
    }
}

fn default_listen() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8565
}

fn default_api_enabled() -> bool {
    true
}

/// HTTP API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// Address to bind (default: "127.0.0.1")
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Port to bind (default: 8565)
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_api_enabled")]
    pub enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            port: default_port(),
            enabled: default_api_enabled(),
        }
    }
}

/// Integration configuration container
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntegrationsConfig {
    /// VeSync accounts, keyed by entry id
    #[serde(default)]
    pub vesync: BTreeMap<String, VeSyncConfig>,
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().to_path_buf(), e))?;

        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// Every problem found is reported, not just the first.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        let mut usernames = HashSet::new();
        for (entry_id, entry) in &self.integrations.vesync {
            if entry.username.trim().is_empty() {
                errors.push(format!("vesync.{}: username must not be empty", entry_id));
            }
            if entry.password.is_empty() {
                errors.push(format!("vesync.{}: password must not be empty", entry_id));
            }
            if entry.update_interval_secs == 0 {
                errors.push(format!(
                    "vesync.{}: update_interval_secs must be positive",
                    entry_id
                ));
            }
            // One entry per account
            if !usernames.insert(entry.username.to_lowercase()) {
                errors.push(format!(
                    "vesync.{}: account {} is already configured",
                    entry_id, entry.username
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration:\n  {}", .0.join("\n  "))]
    Validation(Vec<String>),
}
