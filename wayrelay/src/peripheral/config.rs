//! Peripheral connection settings.

use std::path::PathBuf;
use std::time::Duration;

use super::discovery::{DevDirectoryDiscovery, DeviceMatcher, DEFAULT_DEVICE_DIR, DEFAULT_DEVICE_PATTERN};
use super::link::{PeripheralLink, DEFAULT_CONNECT_TIMEOUT, DEFAULT_WRITE_TIMEOUT};
use super::worker::DEFAULT_QUEUE_CAPACITY;
use super::PeripheralError;

/// How to find and drive the guidance peripheral.
#[derive(Debug, Clone, PartialEq)]
pub struct PeripheralConfig {
    /// When false, guidance runs without a peripheral.
    pub enabled: bool,
    /// Regex matched against device names.
    pub device_pattern: String,
    /// Directory scanned for device nodes.
    pub device_dir: PathBuf,
    /// Bound on opening the device node.
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
    pub queue_capacity: usize,
}

impl Default for PeripheralConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            device_pattern: DEFAULT_DEVICE_PATTERN.to_string(),
            device_dir: PathBuf::from(DEFAULT_DEVICE_DIR),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl PeripheralConfig {
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_device_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.device_pattern = pattern.into();
        self
    }

    pub fn with_device_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.device_dir = dir.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn matcher(&self) -> Result<DeviceMatcher, PeripheralError> {
        DeviceMatcher::new(&self.device_pattern)
    }

    pub fn discovery(&self) -> DevDirectoryDiscovery {
        DevDirectoryDiscovery::new(&self.device_dir)
    }

    /// Discovers and connects to the first matching device.
    pub async fn connect(&self) -> Result<PeripheralLink, PeripheralError> {
        let matcher = self.matcher()?;
        PeripheralLink::connect(
            &self.discovery(),
            &matcher,
            self.connect_timeout,
            self.write_timeout,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = PeripheralConfig::default();
        assert!(config.enabled);
        assert_eq!(config.device_dir, PathBuf::from("/dev"));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.write_timeout, Duration::from_millis(500));
        assert_eq!(config.queue_capacity, 16);
        assert!(config.matcher().is_ok());
    }

    #[tokio::test]
    async fn test_connect_from_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("ttyS0"), b"").unwrap();
        std::fs::write(dir.path().join("ttyUSB0"), b"").unwrap();

        let config = PeripheralConfig::default().with_device_dir(dir.path());
        let mut link = config.connect().await.unwrap();
        assert_eq!(link.device().name, "ttyUSB0");

        link.send("D:0.50km | Dir:Depart\n").await.unwrap();
        link.disconnect().await;
        assert_eq!(
            std::fs::read_to_string(dir.path().join("ttyUSB0")).unwrap(),
            "D:0.50km | Dir:Depart\n"
        );
    }

    #[tokio::test]
    async fn test_connect_bad_pattern() {
        let config = PeripheralConfig::default().with_device_pattern("[");
        assert!(matches!(
            config.connect().await,
            Err(PeripheralError::InvalidPattern(_))
        ));
    }
}
