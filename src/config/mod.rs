pub mod path;
pub mod settings;
#[cfg(test)]
pub mod settings_test;

use std::{io, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default rate at which devices are polled
pub const DEFAULT_POLL_RATE: u32 = 144;
/// Highest accepted poll rate
pub const MAX_POLL_RATE: u32 = 1000;
/// Default time between device scans
pub const DEFAULT_SCAN_INTERVAL_MS: u64 = 1500;

/// Represents all possible errors loading a [DaemonConfig]
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Could not read: {0}")]
    IoError(#[from] io::Error),
    #[error("Unable to deserialize: {0}")]
    DeserializeError(#[from] serde_yaml::Error),
}

/// Daemon configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default, rename_all = "snake_case")]
pub struct DaemonConfig {
    /// Rate in Hz at which devices are polled
    pub poll_rate: u32,
    /// Milliseconds between device scans
    pub scan_interval_ms: u64,
    /// Location of the per-device settings file
    pub settings_path: Option<PathBuf>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            poll_rate: DEFAULT_POLL_RATE,
            scan_interval_ms: DEFAULT_SCAN_INTERVAL_MS,
            settings_path: None,
        }
    }
}

impl DaemonConfig {
    /// Load a [DaemonConfig] from the given YAML string
    pub fn from_yaml(content: String) -> Result<DaemonConfig, LoadError> {
        let config: DaemonConfig = serde_yaml::from_str(content.as_str())?;
        Ok(config)
    }

    /// Load a [DaemonConfig] from the given YAML file
    pub fn from_yaml_file(path: String) -> Result<DaemonConfig, LoadError> {
        let file = std::fs::File::open(path)?;
        let config: DaemonConfig = serde_yaml::from_reader(file)?;
        Ok(config)
    }

    /// Loads the config at the given path, falling back to defaults if it
    /// is missing or malformed.
    pub fn load_or_default(path: PathBuf) -> DaemonConfig {
        if !path.exists() {
            log::debug!("No config found at {path:?}. Using defaults.");
            return DaemonConfig::default();
        }
        match DaemonConfig::from_yaml_file(path.to_string_lossy().to_string()) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to load config {path:?}: {e}. Using defaults.");
                DaemonConfig::default()
            }
        }
    }

    /// Poll rate clamped to 1..=1000 Hz
    pub fn poll_rate(&self) -> u32 {
        self.poll_rate.clamp(1, MAX_POLL_RATE)
    }

    /// Time between device polls
    pub fn poll_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.poll_rate() as u64)
    }

    /// Time between device scans
    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn test_defaults() -> Result<(), Box<dyn Error>> {
        let config = DaemonConfig::from_yaml("{}".to_string())?;
        assert_eq!(config, DaemonConfig::default());
        assert_eq!(config.poll_interval(), Duration::from_micros(6944));
        assert_eq!(config.scan_interval(), Duration::from_millis(1500));
        Ok(())
    }

    #[test]
    fn test_poll_rate_is_clamped() -> Result<(), Box<dyn Error>> {
        let config = DaemonConfig::from_yaml("poll_rate: 0\n".to_string())?;
        assert_eq!(config.poll_rate(), 1);
        assert_eq!(config.poll_interval(), Duration::from_secs(1));

        let config = DaemonConfig::from_yaml("poll_rate: 5000\nscan_interval_ms: 250\n".to_string())?;
        assert_eq!(config.poll_rate(), 1000);
        assert_eq!(config.scan_interval(), Duration::from_millis(250));
        Ok(())
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        let result = DaemonConfig::from_yaml("poll_rate: fast\n".to_string());
        assert!(matches!(result, Err(LoadError::DeserializeError(_))));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = DaemonConfig::load_or_default(PathBuf::from("/nonexistent/padbridge.yaml"));
        assert_eq!(config, DaemonConfig::default());
    }
}
