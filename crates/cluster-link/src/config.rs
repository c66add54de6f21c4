//! Link configuration.

use crate::{LinkError, LinkResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable that overrides [`LinkConfig::device`], applied with
/// [`LinkConfig::apply_device_override`].
pub const DEVICE_ENV: &str = "TEENSY_DEV";

pub const DEFAULT_DEVICE: &str = "/dev/ttyACM0";
pub const DEFAULT_BAUD_RATE: u32 = 2_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Serial device path.
    pub device: String,
    pub baud_rate: u32,
    /// Upper bound on a single blocking read.
    pub read_timeout_ms: u64,
    /// Wait between failed open attempts.
    pub reconnect_delay_ms: u64,
    /// Pause after a read that returned nothing.
    pub idle_backoff_ms: u64,
    /// Bytes requested per read.
    pub read_chunk: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: 50,
            reconnect_delay_ms: 1000,
            idle_backoff_ms: 2,
            read_chunk: 64,
        }
    }
}

impl LinkConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }

    /// Replace the device path with `device` unless it is missing or blank.
    pub fn apply_device_override(&mut self, device: Option<String>) -> bool {
        match device.map(|d| d.trim().to_string()) {
            Some(device) if !device.is_empty() => {
                self.device = device;
                true
            }
            _ => false,
        }
    }

    pub fn validate(&self) -> LinkResult<()> {
        if self.device.trim().is_empty() {
            return Err(LinkError::InvalidConfig("device path is empty".to_string()));
        }
        if self.baud_rate == 0 {
            return Err(LinkError::InvalidConfig("baud rate must be non-zero".to_string()));
        }
        if self.read_timeout_ms == 0 {
            return Err(LinkError::InvalidConfig(
                "read timeout must be non-zero".to_string(),
            ));
        }
        if self.reconnect_delay_ms == 0 {
            return Err(LinkError::InvalidConfig(
                "reconnect delay must be non-zero".to_string(),
            ));
        }
        if self.read_chunk == 0 {
            return Err(LinkError::InvalidConfig(
                "read chunk must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
