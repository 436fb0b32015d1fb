//! Configuration for editor-pulse.

use crate::core::preset::DEFAULT_PRESET_COUNT;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main configuration for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Interval of the decay tick
    #[serde(rename = "tick_interval_ms", with = "duration_millis")]
    pub tick_interval: Duration,

    /// Number of visual presets the renderer offers
    pub preset_count: usize,

    /// Preset active when a session opens
    pub initial_preset: usize,

    /// Undelivered messages kept per renderer subscriber
    pub subscriber_capacity: usize,

    /// Default log filter when `RUST_LOG` is not set
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            preset_count: DEFAULT_PRESET_COUNT,
            initial_preset: 0,
            subscriber_capacity: 1024,
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("editor-pulse")
            .join("config.json")
    }

    /// Reject values a session cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval.is_zero() {
            return Err(ConfigError::Invalid("tick interval must be positive".into()));
        }
        if self.preset_count == 0 {
            return Err(ConfigError::Invalid("preset count must be at least 1".into()));
        }
        if self.subscriber_capacity == 0 {
            return Err(ConfigError::Invalid(
                "subscriber capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Serialize error: {0}")]
    Serialize(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Serde support for Duration as whole milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.tick_interval, Duration::from_millis(100));
        assert_eq!(config.preset_count, DEFAULT_PRESET_COUNT);
        assert_eq!(config.initial_preset, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_uses_milliseconds() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert_eq!(json["tick_interval_ms"], 100);

        let config: Config = serde_json::from_str(r#"{"tick_interval_ms": 250}"#).unwrap();
        assert_eq!(config.tick_interval, Duration::from_millis(250));
        // Missing fields fall back to defaults
        assert_eq!(config.subscriber_capacity, 1024);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let config = Config {
            tick_interval: Duration::ZERO,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = Config {
            preset_count: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            subscriber_capacity: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
