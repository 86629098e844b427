//! Peripheral discovery and opening.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use regex::Regex;
use tokio::io::AsyncWrite;

use super::PeripheralError;

/// A writable byte stream to a peripheral.
pub type PeripheralWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Boxed future used by [`DeviceDiscovery`] for dyn-compatibility.
pub type DiscoveryFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Default device directory scanned on Unix systems.
pub const DEFAULT_DEVICE_DIR: &str = "/dev";

/// Default device name pattern: Bluetooth RFCOMM and USB serial adapters.
pub const DEFAULT_DEVICE_PATTERN: &str = "^(rfcomm|ttyUSB|ttyACM)";

/// A peripheral candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Name matched against the [`DeviceMatcher`].
    pub name: String,
    /// Path or address used to open the device.
    pub path: PathBuf,
}

impl DeviceInfo {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Selects a device by name.
#[derive(Debug, Clone)]
pub struct DeviceMatcher {
    pattern: Regex,
}

impl DeviceMatcher {
    pub fn new(pattern: &str) -> Result<Self, PeripheralError> {
        let pattern = Regex::new(pattern)
            .map_err(|e| PeripheralError::InvalidPattern(format!("{}: {}", pattern, e)))?;
        Ok(Self { pattern })
    }

    /// Matches exactly one device name.
    pub fn exact(name: &str) -> Self {
        let pattern = format!("^{}$", regex::escape(name));
        Self {
            pattern: Regex::new(&pattern).expect("escaped literal is a valid pattern"),
        }
    }

    pub fn matches(&self, device: &DeviceInfo) -> bool {
        self.pattern.is_match(&device.name)
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }
}

impl Default for DeviceMatcher {
    fn default() -> Self {
        Self {
            pattern: Regex::new(DEFAULT_DEVICE_PATTERN).expect("default pattern is valid"),
        }
    }
}

/// Lists and opens peripherals.
///
/// Pairing and permissions are handled outside the engine; discovery only
/// reports devices that are already available to open.
pub trait DeviceDiscovery: Send + Sync {
    /// Lists the devices currently available.
    fn discover(&self) -> DiscoveryFuture<'_, Result<Vec<DeviceInfo>, PeripheralError>>;

    /// Opens a device for writing.
    fn open<'a>(&'a self, device: &'a DeviceInfo) -> DiscoveryFuture<'a, io::Result<PeripheralWriter>>;
}

/// Discovers serial device nodes in a directory such as `/dev`.
///
/// Line settings (baud rate, parity) are expected to be configured on the
/// node already, e.g. by `rfcomm bind` or `stty`.
#[derive(Debug, Clone)]
pub struct DevDirectoryDiscovery {
    directory: PathBuf,
}

impl Default for DevDirectoryDiscovery {
    fn default() -> Self {
        Self::new(DEFAULT_DEVICE_DIR)
    }
}

impl DevDirectoryDiscovery {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    async fn list(&self) -> Result<Vec<DeviceInfo>, PeripheralError> {
        let mut entries = tokio::fs::read_dir(&self.directory)
            .await
            .map_err(|e| PeripheralError::Discovery(format!("{}: {}", self.directory.display(), e)))?;

        let mut devices = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PeripheralError::Discovery(e.to_string()))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            devices.push(DeviceInfo::new(name, entry.path()));
        }
        devices.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(devices)
    }

    async fn open_path(path: &Path) -> io::Result<PeripheralWriter> {
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Box::new(file))
    }
}

impl DeviceDiscovery for DevDirectoryDiscovery {
    fn discover(&self) -> DiscoveryFuture<'_, Result<Vec<DeviceInfo>, PeripheralError>> {
        Box::pin(self.list())
    }

    fn open<'a>(&'a self, device: &'a DeviceInfo) -> DiscoveryFuture<'a, io::Result<PeripheralWriter>> {
        Box::pin(Self::open_path(&device.path))
    }
}
