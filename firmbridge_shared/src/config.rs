//! Shared configuration logic for the bridge binary and tests.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [device]
//! id = "nokia5110"
//! initial_mode = "upload"
//!
//! [link]
//! response_timeout_ms = 250
//!
//! [ultrasonic]
//! timeout_micros = 25000
//! ```
//!
//! Every key is optional; missing keys take the defaults below.

use crate::board_config::{DeviceProfile, profile_for};
use crate::command::ConnectionMode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub ultrasonic: UltrasonicConfig,
}

/// Which device profile is attached and the mode the link starts in.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    #[serde(default = "default_device_id")]
    pub id: String,
    #[serde(default)]
    pub initial_mode: ConnectionMode,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            id: default_device_id(),
            initial_mode: ConnectionMode::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LinkConfig {
    /// Slack allowed for a round trip on top of any device-side wait.
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            response_timeout_ms: default_response_timeout_ms(),
        }
    }
}

impl LinkConfig {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UltrasonicConfig {
    #[serde(default = "default_echo_timeout_micros")]
    pub timeout_micros: u32,
}

impl Default for UltrasonicConfig {
    fn default() -> Self {
        Self {
            timeout_micros: default_echo_timeout_micros(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.device_profile()?;
        if self.ultrasonic.timeout_micros == 0 {
            return Err(ConfigError::Invalid(
                "ultrasonic.timeout_micros must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn device_profile(&self) -> Result<&'static DeviceProfile, ConfigError> {
        profile_for(&self.device.id)
            .ok_or_else(|| ConfigError::Invalid(format!("unknown device id '{}'", self.device.id)))
    }
}

// Default value functions
fn default_device_id() -> String { "arduinoNano".to_string() }
fn default_response_timeout_ms() -> u64 { 500 }
// 30 ms covers roughly 5 m of round trip
fn default_echo_timeout_micros() -> u32 { 30_000 }

/// Load configuration from a TOML file at the given path.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        tracing::error!("Failed to read config file '{}': {}", path, e);
        ConfigError::Io(e)
    })?;
    let config: Config = toml::from_str(&contents).map_err(|e| {
        tracing::error!("Failed to parse config TOML: {}", e);
        ConfigError::Toml(e)
    })?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.device.id, "arduinoNano");
        assert_eq!(config.device.initial_mode, ConnectionMode::Interactive);
        assert_eq!(config.link.response_timeout_ms, 500);
        assert_eq!(config.ultrasonic.timeout_micros, 30_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_config_success() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("bridge.toml");
        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "[device]\nid = 'nokia5110'\ninitial_mode = 'upload'").unwrap();
        file.flush().unwrap();
        let config = load_config(file_path.to_str().unwrap()).unwrap();
        assert_eq!(config.device.id, "nokia5110");
        assert_eq!(config.device.initial_mode, ConnectionMode::Upload);
        // Defaults for missing sections
        assert_eq!(config.ultrasonic.timeout_micros, 30_000);
        assert_eq!(config.device_profile().unwrap().id, "nokia5110");
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent_file.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("bad.toml");
        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "not a valid toml").unwrap();
        file.flush().unwrap();
        let result = load_config(file_path.to_str().unwrap());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_unknown_device_is_invalid() {
        let config: Config = toml::from_str("[device]\nid = 'esp32'").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_echo_timeout_is_invalid() {
        let config: Config = toml::from_str("[ultrasonic]\ntimeout_micros = 0").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
