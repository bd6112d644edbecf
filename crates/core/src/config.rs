//! Common configuration utilities

use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::error::{Error, Result};

/// Base trait for all configuration types
pub trait Configuration: Serialize + for<'de> Deserialize<'de> + Default {
    /// Validate the configuration
    fn validate(&self) -> Result<()>;

    /// Load configuration from a file
    fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::configuration(format!("Failed to read config file: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Load configuration from a TOML string
    fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::configuration(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::configuration(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, content)
            .map_err(|e| Error::configuration(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

/// Process configuration for the arbcom daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Channel the committee deliberates in (motions originate here)
    pub committee_channel: i64,

    /// Channel permanent archival records are sent to
    pub archive_channel: i64,

    /// Directory for persistent state
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Change-feed monitor settings
    #[serde(default)]
    pub monitor: MonitorSettings,
}

/// Settings for the background change-feed monitor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSettings {
    /// Whether the monitor runs at all
    #[serde(default)]
    pub enabled: bool,

    /// Wiki the feed is filtered to
    #[serde(default = "default_wiki")]
    pub wiki: String,

    /// Page titles that trigger a committee notice
    #[serde(default)]
    pub watched_titles: Vec<String>,
}

fn default_wiki() -> String {
    "zhwiki".to_string()
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            wiki: default_wiki(),
            watched_titles: Vec::new(),
        }
    }
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            committee_channel: 0,
            archive_channel: 0,
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            monitor: MonitorSettings::default(),
        }
    }
}

impl Configuration for BotConfig {
    fn validate(&self) -> Result<()> {
        if self.committee_channel == 0 {
            return Err(Error::configuration("committee_channel is required"));
        }
        if self.archive_channel == 0 {
            return Err(Error::configuration("archive_channel is required"));
        }
        if self.data_dir.is_empty() {
            return Err(Error::configuration("data_dir must not be empty"));
        }
        if self.monitor.enabled && self.monitor.watched_titles.is_empty() {
            return Err(Error::configuration(
                "monitor.watched_titles is required when the monitor is enabled",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_toml() {
        let config = BotConfig::from_toml(
            r#"
            committee_channel = -100123
            archive_channel = -100456
            "#,
        )
        .unwrap();

        assert_eq!(config.committee_channel, -100123);
        assert_eq!(config.archive_channel, -100456);
        assert_eq!(config.data_dir, "data");
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_config_missing_channel_rejected() {
        let result = BotConfig::from_toml("archive_channel = -100456");
        assert!(result.is_err());
    }
}
