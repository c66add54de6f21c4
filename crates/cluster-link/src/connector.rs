//! Opening the byte stream.

use crate::{LinkConfig, LinkError, LinkResult};
use serialport::SerialPort;
use std::io::{self, Read};
use std::time::Duration;

/// Byte stream handed to the reader; reads should time out rather than block
/// indefinitely.
pub type LinkStream = Box<dyn Read + Send>;

/// Opens the link's byte stream. Called again after every link loss.
pub trait Connector: Send {
    fn connect(&mut self) -> LinkResult<LinkStream>;

    /// Human-readable name of the endpoint, for logs.
    fn describe(&self) -> String;
}

/// Serial device via the `serialport` crate.
#[derive(Debug, Clone)]
pub struct SerialConnector {
    device: String,
    baud_rate: u32,
    timeout: Duration,
}

impl SerialConnector {
    pub fn new(device: impl Into<String>, baud_rate: u32, timeout: Duration) -> Self {
        Self {
            device: device.into(),
            baud_rate,
            timeout,
        }
    }

    pub fn from_config(config: &LinkConfig) -> Self {
        Self::new(config.device.clone(), config.baud_rate, config.read_timeout())
    }
}

struct SerialStream(Box<dyn SerialPort>);

impl Read for SerialStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Connector for SerialConnector {
    fn connect(&mut self) -> LinkResult<LinkStream> {
        let port = serialport::new(&self.device, self.baud_rate)
            .timeout(self.timeout)
            .open()
            .map_err(|e| LinkError::Open {
                device: self.device.clone(),
                source: io::Error::from(e),
            })?;
        Ok(Box::new(SerialStream(port)))
    }

    fn describe(&self) -> String {
        format!("{} @ {} baud", self.device, self.baud_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        let config = LinkConfig {
            device: "/dev/ttyUSB0".to_string(),
            baud_rate: 115_200,
            ..LinkConfig::default()
        };
        let connector = SerialConnector::from_config(&config);
        assert_eq!(connector.describe(), "/dev/ttyUSB0 @ 115200 baud");
        assert_eq!(connector.timeout, Duration::from_millis(50));
    }

    #[test]
    fn test_missing_device_is_open_error() {
        let mut connector =
            SerialConnector::new("/nonexistent/cluster-tty", 9600, Duration::from_millis(10));
        assert!(matches!(connector.connect(), Err(LinkError::Open { .. })));
    }
}
