//! Daemon configuration.
//!
//! Sources, lowest precedence first: built-in defaults, the YAML file given
//! with `--config`, the `TEENSY_DEV` environment variable, command-line flags.

use cluster_link::LinkConfig;
use cluster_telemetry::{IntegratorConfig, LayoutKind};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Which producer feeds the store. Exactly one runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProducerKind {
    #[default]
    Link,
    /// Synthetic data, ticked by the daemon's main loop.
    DemoPull,
    /// Synthetic data on its own thread.
    DemoPush,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub flag_layout: LayoutKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Tick interval for both demo schedules.
    pub interval_ms: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self { interval_ms: 16 }
    }
}

impl DemoConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OdometerConfig {
    pub enabled: bool,
    pub period_ms: u64,
    pub max_gap_ms: u64,
    pub fallback_gap_ms: u64,
}

impl Default for OdometerConfig {
    fn default() -> Self {
        let defaults = IntegratorConfig::default();
        Self {
            enabled: defaults.enabled,
            period_ms: defaults.period.as_millis() as u64,
            max_gap_ms: defaults.max_gap.as_millis() as u64,
            fallback_gap_ms: defaults.fallback_gap.as_millis() as u64,
        }
    }
}

impl OdometerConfig {
    pub fn integrator(&self) -> IntegratorConfig {
        IntegratorConfig {
            period: Duration::from_millis(self.period_ms),
            max_gap: Duration::from_millis(self.max_gap_ms),
            fallback_gap: Duration::from_millis(self.fallback_gap_ms),
            enabled: self.enabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub link: LinkConfig,
    pub protocol: ProtocolConfig,
    pub producer: ProducerKind,
    pub demo: DemoConfig,
    pub odometer: OdometerConfig,
    /// JSON file holding trip, odometer and UI settings.
    pub settings_path: PathBuf,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            link: LinkConfig::default(),
            protocol: ProtocolConfig::default(),
            producer: ProducerKind::default(),
            demo: DemoConfig::default(),
            odometer: OdometerConfig::default(),
            settings_path: PathBuf::from("data.json"),
        }
    }
}

impl ClusterConfig {
    /// Load `path` over the defaults. A missing file yields the defaults.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %path.display(), "Config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.link
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.demo.interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "demo interval must be non-zero".to_string(),
            ));
        }
        if self.odometer.period_ms == 0 {
            return Err(ConfigError::Invalid(
                "odometer period must be non-zero".to_string(),
            ));
        }
        if self.odometer.fallback_gap_ms > self.odometer.max_gap_ms {
            return Err(ConfigError::Invalid(
                "odometer fallback gap exceeds max gap".to_string(),
            ));
        }
        if self.settings_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("settings path is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_defaults() -> TestResult {
        let config = ClusterConfig::default();
        assert_eq!(config.producer, ProducerKind::Link);
        assert_eq!(config.protocol.flag_layout, LayoutKind::Reference);
        assert_eq!(config.odometer.period_ms, 500);
        assert_eq!(config.settings_path, PathBuf::from("data.json"));
        config.validate()?;
        Ok(())
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() -> TestResult {
        let config = ClusterConfig::from_yaml(
            "producer: demo-push\nprotocol:\n  flag_layout: compact\nlink:\n  baud_rate: 115200\n",
        )?;
        assert_eq!(config.producer, ProducerKind::DemoPush);
        assert_eq!(config.protocol.flag_layout, LayoutKind::Compact);
        assert_eq!(config.link.baud_rate, 115_200);
        assert_eq!(config.link.device, "/dev/ttyACM0");
        Ok(())
    }

    #[test]
    fn test_empty_yaml_is_default() -> TestResult {
        assert_eq!(ClusterConfig::from_yaml("  \n")?, ClusterConfig::default());
        Ok(())
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ClusterConfig::default();
        config.odometer.period_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = ClusterConfig::default();
        config.link.device.clear();
        assert!(config.validate().is_err());

        let mut config = ClusterConfig::default();
        config.odometer.fallback_gap_ms = 10_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_integrator_config_mapping() {
        let odometer = OdometerConfig {
            enabled: false,
            period_ms: 250,
            ..OdometerConfig::default()
        };
        let integrator = odometer.integrator();
        assert!(!integrator.enabled);
        assert_eq!(integrator.period, Duration::from_millis(250));
        assert_eq!(integrator.max_gap, Duration::from_secs(5));
        assert_eq!(integrator.fallback_gap, Duration::from_secs(1));
    }
}
