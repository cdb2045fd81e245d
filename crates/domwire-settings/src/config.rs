//! Configuration for DOMWire
//!
//! Provides configuration file handling and validation. Supports JSON and
//! TOML files; the default location is the platform config directory.
//!
//! Configuration is organized into sections:
//! - Event bus settings (logging toggle, binding prefix, history)
//! - Frame settings (animation frame interval)

use domwire_core::EventBusConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, SettingsError, SettingsResult};

/// Event bus settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusSettings {
    /// Log every `on` and `trigger` call at startup
    pub logging: bool,
    /// Attribute prefix recognised by the declarative binder
    pub attribute_prefix: String,
    /// Keep a history of triggered events
    pub enable_history: bool,
    /// Maximum number of events kept in history
    pub max_history_size: usize,
    /// How long events stay in history, in seconds
    pub history_retention_secs: u64,
    /// Capacity of the async broadcast channel
    pub channel_capacity: usize,
}

impl Default for BusSettings {
    fn default() -> Self {
        let bus = EventBusConfig::default();
        Self {
            logging: bus.logging,
            attribute_prefix: domwire_core::event_bus::DEFAULT_ATTRIBUTE_PREFIX.to_string(),
            enable_history: bus.enable_history,
            max_history_size: bus.max_history_size,
            history_retention_secs: bus.history_retention.as_secs(),
            channel_capacity: bus.channel_capacity,
        }
    }
}

impl BusSettings {
    /// Build the event bus configuration
    pub fn to_bus_config(&self) -> EventBusConfig {
        EventBusConfig {
            channel_capacity: self.channel_capacity,
            logging: self.logging,
            enable_history: self.enable_history,
            max_history_size: self.max_history_size,
            history_retention: Duration::from_secs(self.history_retention_secs),
        }
    }
}

/// Animation frame settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameSettings {
    /// Spacing between animation frames in milliseconds
    pub frame_interval_ms: u64,
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
        }
    }
}

impl FrameSettings {
    /// Frame spacing as a duration
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

/// Complete configuration
///
/// Aggregates all settings sections and provides file I/O operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Event bus settings
    pub bus: BusSettings,
    /// Frame settings
    pub frames: FrameSettings,
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Default config file location: `<config dir>/domwire/config.toml`
    pub fn default_path() -> SettingsResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("domwire").join("config.toml"))
            .ok_or_else(|| {
                ConfigError::UnsupportedPlatform(std::env::consts::OS.to_string()).into()
            })
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> SettingsResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let content = std::fs::read_to_string(path)?;

        let config: Self = match Format::of(path)? {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load config from `path` if it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::info!(path = %path.display(), "No configuration file, using defaults");
            Ok(Self::default())
        }
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match Format::of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        if self.frames.frame_interval_ms == 0 {
            return Err(ConfigError::ValueOutOfRange {
                key: "frames.frame_interval_ms".to_string(),
                value: "0".to_string(),
            }
            .into());
        }

        let prefix = &self.bus.attribute_prefix;
        if prefix.is_empty() || prefix.chars().any(char::is_whitespace) {
            return Err(SettingsError::InvalidSetting {
                key: "bus.attribute_prefix".to_string(),
                reason: "must be non-empty and contain no whitespace".to_string(),
            });
        }

        if self.bus.channel_capacity == 0 {
            return Err(ConfigError::ValueOutOfRange {
                key: "bus.channel_capacity".to_string(),
                value: "0".to_string(),
            }
            .into());
        }

        if self.bus.enable_history && self.bus.max_history_size == 0 {
            return Err(SettingsError::InvalidSetting {
                key: "bus.max_history_size".to_string(),
                reason: "must be > 0 when history is enabled".to_string(),
            });
        }

        Ok(())
    }
}

enum Format {
    Json,
    Toml,
}

impl Format {
    fn of(path: &Path) -> SettingsResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Format::Json),
            Some("toml") => Ok(Format::Toml),
            other => Err(ConfigError::UnsupportedFormat(other.unwrap_or("").to_string()).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_bus_defaults() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bus.attribute_prefix, "on:");
        assert_eq!(config.frames.frame_interval(), Duration::from_millis(16));

        let bus = config.bus.to_bus_config();
        assert_eq!(bus.channel_capacity, 1024);
        assert_eq!(bus.history_retention, Duration::from_secs(300));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml_str(
            r#"
            [bus]
            logging = true

            [frames]
            frame_interval_ms = 8
            "#,
        )
        .unwrap();
        assert!(config.bus.logging);
        assert_eq!(config.bus.attribute_prefix, "on:");
        assert_eq!(config.frames.frame_interval_ms, 8);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.frames.frame_interval_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(SettingsError::Config(ConfigError::ValueOutOfRange { .. }))
        ));

        let mut config = Config::default();
        config.bus.attribute_prefix = "on :".to_string();
        assert!(matches!(
            config.validate(),
            Err(SettingsError::InvalidSetting { .. })
        ));

        let mut config = Config::default();
        config.bus.enable_history = true;
        config.bus.max_history_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        assert!(matches!(
            Config::from_toml_str("[frames]\nframe_interval_ms = \"fast\""),
            Err(SettingsError::TomlError(_))
        ));
    }
}
