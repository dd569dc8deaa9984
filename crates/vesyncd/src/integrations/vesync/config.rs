use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

fn default_time_zone() -> String {
    "UTC".to_string()
}

fn default_update_interval_secs() -> u64 {
    30
}

fn default_enabled() -> bool {
    true
}

/// Configuration for one VeSync account entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Account email address
    pub username: String,

    pub password: String,

    /// Time zone reported to the VeSync cloud (default: "UTC")
    #[serde(default = "default_time_zone")]
    pub time_zone: String,

    /// JSON device snapshot served by the offline manager
    pub snapshot: PathBuf,

    /// Seconds between device refreshes (default: 30)
    #[serde(default = "default_update_interval_secs")]
    pub update_interval_secs: u64,

    /// Set to false to keep the entry configured but not loaded
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Config {
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str(
            r#"
            username = "me@example.com"
            password = "hunter2"
            snapshot = "/var/lib/vesyncd/devices.json"
            "#,
        )
        .unwrap();

        assert_eq!(config.time_zone, "UTC");
        assert_eq!(config.update_interval(), Duration::from_secs(30));
        assert!(config.enabled);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<Config, _> = toml::from_str(
            r#"
            username = "me@example.com"
            password = "hunter2"
            snapshot = "devices.json"
            polling = 5
            "#,
        );
        assert!(result.is_err());
    }
}
