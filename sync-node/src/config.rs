//! Configuration loading for sync-node.
//!
//! Configuration is loaded from a TOML file (default: `driftsync.toml`).
//! A missing file yields the defaults.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the file failed.
    #[error("reading config failed: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing the file failed.
    #[error("parsing config failed: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Root configuration for a sync node.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Device identity configuration.
    #[serde(default)]
    pub device: DeviceConfig,
    /// Synchronization tuning.
    #[serde(default)]
    pub sync: SyncSettings,
}

/// Device identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    /// Human-readable device name (default: "driftsync device").
    #[serde(default = "default_device_name")]
    pub name: String,
    /// The owning user (default: the empty string; set it).
    #[serde(default)]
    pub username: String,
}

/// Synchronization tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncSettings {
    /// Length of one aggregation window in milliseconds (default: 500).
    #[serde(default = "default_aggregation_window_ms")]
    pub aggregation_window_ms: u64,
    /// Deadline for one exchange in seconds (default: 30, 0 = no deadline).
    #[serde(default = "default_exchange_timeout_secs")]
    pub exchange_timeout_secs: u64,
}

impl NodeConfig {
    /// Load configuration from a TOML file; defaults when it is absent.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// The aggregation window as a [`Duration`].
    pub fn aggregation_window(&self) -> Duration {
        Duration::from_millis(self.sync.aggregation_window_ms)
    }

    /// The exchange deadline, `None` when disabled.
    pub fn exchange_timeout(&self) -> Option<Duration> {
        match self.sync.exchange_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            sync: SyncSettings::default(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: default_device_name(),
            username: String::new(),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            aggregation_window_ms: default_aggregation_window_ms(),
            exchange_timeout_secs: default_exchange_timeout_secs(),
        }
    }
}

// Default value functions
fn default_device_name() -> String {
    "driftsync device".to_string()
}

fn default_aggregation_window_ms() -> u64 {
    500
}

fn default_exchange_timeout_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_fields_are_absent() {
        let config: NodeConfig = toml::from_str("").unwrap();
        assert_eq!(config.device.name, "driftsync device");
        assert_eq!(config.sync.aggregation_window_ms, 500);
        assert_eq!(config.exchange_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn parses_a_full_file() {
        let config: NodeConfig = toml::from_str(
            r#"
            [device]
            name = "laptop"
            username = "alice"

            [sync]
            aggregation_window_ms = 250
            exchange_timeout_secs = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.device.name, "laptop");
        assert_eq!(config.device.username, "alice");
        assert_eq!(config.aggregation_window(), Duration::from_millis(250));
        assert_eq!(config.exchange_timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn zero_timeout_disables_the_deadline() {
        let config: NodeConfig = toml::from_str(
            r#"
            [sync]
            exchange_timeout_secs = 0
            "#,
        )
        .unwrap();
        assert_eq!(config.exchange_timeout(), None);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = NodeConfig::load("does/not/exist.toml").unwrap();
        assert_eq!(config.sync.aggregation_window_ms, 500);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let err = toml::from_str::<NodeConfig>("not = [valid").unwrap_err();
        let _ = ConfigError::Parse(err);
    }
}
