//! Flagwatch configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FlagwatchConfig {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub digest: DigestConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

impl FlagwatchConfig {
    /// Load config from the default path (~/.flagwatch/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::FlagwatchError::Config(format!("Failed to read config: {e}"))
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            crate::error::FlagwatchError::Config(format!("Failed to parse config: {e}"))
        })?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| {
            crate::error::FlagwatchError::Config(format!("Failed to serialize config: {e}"))
        })?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Flagwatch home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".flagwatch")
    }
}

/// Discord credentials.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DiscordConfig {
    #[serde(default)]
    pub bot_token: String,
}

/// Competition directory endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default = "default_directory_url")]
    pub base_url: String,
    #[serde(default = "default_directory_timeout")]
    pub timeout_secs: u64,
}

fn default_directory_url() -> String {
    "https://ctftime.org/api/v1".into()
}
fn default_directory_timeout() -> u64 {
    10
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: default_directory_url(),
            timeout_secs: default_directory_timeout(),
        }
    }
}

/// Subscription reminder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Fixed channel reminders are broadcast to.
    #[serde(default)]
    pub channel_id: u64,
    /// Width of the pre-start reminder window, in hours.
    #[serde(default = "default_window_hours")]
    pub window_hours: i64,
    /// How long a notified record is retained after its event starts.
    #[serde(default = "default_grace_hours")]
    pub grace_hours: i64,
    /// Sweep period, in seconds.
    #[serde(default = "default_sweep_secs")]
    pub sweep_interval_secs: u64,
}

fn default_window_hours() -> i64 {
    24
}
fn default_grace_hours() -> i64 {
    2
}
fn default_sweep_secs() -> u64 {
    30
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            channel_id: 0,
            window_hours: default_window_hours(),
            grace_hours: default_grace_hours(),
            sweep_interval_secs: default_sweep_secs(),
        }
    }
}

/// Daily upcoming-events digest settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Local fire time, "HH:MM".
    #[serde(default = "default_digest_time")]
    pub time: String,
    /// How many upcoming events to list.
    #[serde(default = "default_digest_limit")]
    pub limit: usize,
    /// Lookahead horizon in days.
    #[serde(default = "default_digest_days")]
    pub lookahead_days: i64,
    /// Channel the digest goes to; 0 falls back to the notify channel.
    #[serde(default)]
    pub channel_id: u64,
}

fn default_digest_time() -> String {
    "09:00".into()
}
fn default_digest_limit() -> usize {
    5
}
fn default_digest_days() -> i64 {
    90
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            time: default_digest_time(),
            limit: default_digest_limit(),
            lookahead_days: default_digest_days(),
            channel_id: 0,
        }
    }
}

/// Persistence location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding subscriptions.json.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String {
    "~/.flagwatch".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl DigestConfig {
    /// Parse the configured "HH:MM" fire time. Invalid values disable the
    /// digest rather than firing at a surprising time.
    pub fn parse_time(&self) -> Option<(u32, u32)> {
        let (h, m) = self.time.split_once(':')?;
        let hour: u32 = h.parse().ok()?;
        let minute: u32 = m.parse().ok()?;
        if hour > 23 || minute > 59 {
            return None;
        }
        Some((hour, minute))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FlagwatchConfig::default();
        assert_eq!(config.notify.window_hours, 24);
        assert_eq!(config.notify.grace_hours, 2);
        assert_eq!(config.notify.sweep_interval_secs, 30);
        assert_eq!(config.directory.base_url, "https://ctftime.org/api/v1");
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            [notify]
            channel_id = 123456789
            grace_hours = 3

            [digest]
            enabled = true
            time = "08:30"
            limit = 10
        "#;

        let config: FlagwatchConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.notify.channel_id, 123456789);
        assert_eq!(config.notify.grace_hours, 3);
        assert_eq!(config.notify.window_hours, 24);
        assert!(config.digest.enabled);
        assert_eq!(config.digest.parse_time(), Some((8, 30)));
    }

    #[test]
    fn test_config_missing_fields_use_defaults() {
        let toml_str = "";
        let config: FlagwatchConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.notify.sweep_interval_secs, 30);
        assert_eq!(config.digest.limit, 5);
        assert!(!config.digest.enabled);
    }

    #[test]
    fn test_digest_time_validation() {
        let mut digest = DigestConfig::default();
        assert_eq!(digest.parse_time(), Some((9, 0)));
        digest.time = "24:00".into();
        assert_eq!(digest.parse_time(), None);
        digest.time = "nine".into();
        assert_eq!(digest.parse_time(), None);
    }

    #[test]
    fn test_home_dir() {
        let home = FlagwatchConfig::home_dir();
        assert!(home.to_string_lossy().contains("flagwatch"));
    }
}
