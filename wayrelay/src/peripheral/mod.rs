//! Guidance peripheral over a serial transport.
//!
//! A [`PeripheralLink`] is a scoped connection: acquire it with
//! [`PeripheralLink::connect`], hand it to a [`PeripheralWorker`], and the
//! worker releases it when the guidance session tears down. Writes are
//! best-effort; failures are logged and never stop guidance.
//!
//! # Wire Format
//!
//! One ASCII line per guidance emission, no framing or acknowledgement:
//!
//! ```text
//! D:<distance km, 2 decimals>km | Dir:<instruction>\n
//! ```

mod config;
mod discovery;
mod link;
mod worker;

use thiserror::Error;

pub use config::PeripheralConfig;
pub use discovery::{
    DevDirectoryDiscovery, DeviceDiscovery, DeviceInfo, DeviceMatcher, DiscoveryFuture,
    PeripheralWriter, DEFAULT_DEVICE_DIR, DEFAULT_DEVICE_PATTERN,
};
pub use link::{PeripheralLink, DEFAULT_CONNECT_TIMEOUT, DEFAULT_WRITE_TIMEOUT};
pub use worker::{PeripheralForwarder, PeripheralStats, PeripheralWorker, DEFAULT_QUEUE_CAPACITY};

/// Errors from peripheral discovery, connection and writes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeripheralError {
    /// No discovered device matched the pattern.
    #[error("no peripheral matching '{0}'")]
    NotFound(String),

    /// The device exists but could not be opened.
    #[error("failed to connect to {device}: {reason}")]
    ConnectFailed { device: String, reason: String },

    /// `send` was called after disconnect.
    #[error("peripheral not connected")]
    NotConnected,

    /// A write or flush failed or timed out.
    #[error("peripheral write failed: {0}")]
    WriteFailed(String),

    /// Listing devices failed.
    #[error("device discovery failed: {0}")]
    Discovery(String),

    /// The device name pattern is not a valid regex.
    #[error("invalid device pattern: {0}")]
    InvalidPattern(String),
}
