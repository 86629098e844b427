//! Scoped serial connection.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::discovery::{DeviceDiscovery, DeviceInfo, DeviceMatcher, PeripheralWriter};
use super::PeripheralError;

/// Default bound on a single write + flush.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(500);

/// Default bound on opening the device node.
///
/// Opening an rfcomm node blocks while the Bluetooth link is established.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// An open connection to a guidance peripheral.
///
/// The underlying handle is released by [`disconnect`](Self::disconnect) or,
/// failing that, when the link is dropped.
pub struct PeripheralLink {
    device: DeviceInfo,
    writer: Option<PeripheralWriter>,
    write_timeout: Duration,
    lines_sent: u64,
}

impl std::fmt::Debug for PeripheralLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeripheralLink")
            .field("device", &self.device)
            .field("connected", &self.is_connected())
            .field("lines_sent", &self.lines_sent)
            .finish()
    }
}

impl PeripheralLink {
    /// Connects to the first discovered device whose name matches.
    ///
    /// Opening the device is bounded by `connect_timeout`; running out of time
    /// is a `ConnectFailed`.
    pub async fn connect(
        discovery: &dyn DeviceDiscovery,
        matcher: &DeviceMatcher,
        connect_timeout: Duration,
        write_timeout: Duration,
    ) -> Result<Self, PeripheralError> {
        let devices = discovery.discover().await?;
        let device = devices
            .into_iter()
            .find(|d| matcher.matches(d))
            .ok_or_else(|| PeripheralError::NotFound(matcher.as_str().to_string()))?;

        let writer = match tokio::time::timeout(connect_timeout, discovery.open(&device)).await {
            Ok(Ok(writer)) => writer,
            Ok(Err(e)) => {
                return Err(PeripheralError::ConnectFailed {
                    device: device.name.clone(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(PeripheralError::ConnectFailed {
                    device: device.name.clone(),
                    reason: format!("open timed out after {:?}", connect_timeout),
                })
            }
        };

        info!(device = %device.name, path = %device.path.display(), "Peripheral connected");
        Ok(Self::from_writer(device, writer, write_timeout))
    }

    /// Wraps an already-open writer.
    pub fn from_writer(device: DeviceInfo, writer: PeripheralWriter, write_timeout: Duration) -> Self {
        Self {
            device,
            writer: Some(writer),
            write_timeout,
            lines_sent: 0,
        }
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    pub fn is_connected(&self) -> bool {
        self.writer.is_some()
    }

    pub fn lines_sent(&self) -> u64 {
        self.lines_sent
    }

    /// Writes one message and flushes, bounded by the write timeout.
    ///
    /// No retry is attempted; the caller decides whether to log and move on.
    pub async fn send(&mut self, message: &str) -> Result<(), PeripheralError> {
        let writer = self.writer.as_mut().ok_or(PeripheralError::NotConnected)?;

        let write = async {
            writer.write_all(message.as_bytes()).await?;
            writer.flush().await
        };

        match tokio::time::timeout(self.write_timeout, write).await {
            Ok(Ok(())) => {
                self.lines_sent += 1;
                debug!(device = %self.device.name, bytes = message.len(), "Peripheral write");
                Ok(())
            }
            Ok(Err(e)) => Err(PeripheralError::WriteFailed(e.to_string())),
            Err(_) => Err(PeripheralError::WriteFailed(format!(
                "timed out after {}ms",
                self.write_timeout.as_millis()
            ))),
        }
    }

    /// Shuts the writer down and releases the handle. Idempotent.
    pub async fn disconnect(&mut self) {
        let Some(mut writer) = self.writer.take() else {
            return;
        };

        match tokio::time::timeout(self.write_timeout, writer.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(device = %self.device.name, error = %e, "Peripheral shutdown failed"),
            Err(_) => warn!(device = %self.device.name, "Peripheral shutdown timed out"),
        }
        info!(
            device = %self.device.name,
            lines_sent = self.lines_sent,
            "Peripheral disconnected"
        );
    }
}

impl Drop for PeripheralLink {
    fn drop(&mut self) {
        if self.writer.is_some() {
            debug!(device = %self.device.name, "Peripheral link dropped while connected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peripheral::discovery::DiscoveryFuture;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncReadExt, AsyncWrite};

    /// Writer that rejects every write.
    struct BrokenWriter;

    impl AsyncWrite for BrokenWriter {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "link lost")))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    struct FixedDiscovery {
        devices: Vec<DeviceInfo>,
        open_fails: bool,
        open_hangs: bool,
    }

    impl DeviceDiscovery for FixedDiscovery {
        fn discover(&self) -> DiscoveryFuture<'_, Result<Vec<DeviceInfo>, PeripheralError>> {
            let devices = self.devices.clone();
            Box::pin(async move { Ok(devices) })
        }

        fn open<'a>(
            &'a self,
            _device: &'a DeviceInfo,
        ) -> DiscoveryFuture<'a, io::Result<PeripheralWriter>> {
            let fails = self.open_fails;
            let hangs = self.open_hangs;
            Box::pin(async move {
                if hangs {
                    std::future::pending::<()>().await;
                }
                if fails {
                    Err(io::Error::new(io::ErrorKind::PermissionDenied, "busy"))
                } else {
                    let (a, _b) = tokio::io::duplex(64);
                    Ok(Box::new(a) as PeripheralWriter)
                }
            })
        }
    }

    fn device(name: &str) -> DeviceInfo {
        DeviceInfo::new(name, format!("/dev/{}", name))
    }

    #[tokio::test]
    async fn test_send_writes_line() {
        let (a, mut b) = tokio::io::duplex(256);
        let mut link = PeripheralLink::from_writer(device("rfcomm0"), Box::new(a), DEFAULT_WRITE_TIMEOUT);

        link.send("D:1.00km | Dir:Depart\n").await.unwrap();
        assert_eq!(link.lines_sent(), 1);

        let mut buf = vec![0u8; 22];
        b.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"D:1.00km | Dir:Depart\n");
    }

    #[tokio::test]
    async fn test_send_after_disconnect() {
        let (a, _b) = tokio::io::duplex(64);
        let mut link = PeripheralLink::from_writer(device("rfcomm0"), Box::new(a), DEFAULT_WRITE_TIMEOUT);

        link.disconnect().await;
        assert!(!link.is_connected());
        assert_eq!(link.send("x\n").await, Err(PeripheralError::NotConnected));

        // Second disconnect is a no-op.
        link.disconnect().await;
    }

    #[tokio::test]
    async fn test_write_failure() {
        let mut link =
            PeripheralLink::from_writer(device("rfcomm0"), Box::new(BrokenWriter), DEFAULT_WRITE_TIMEOUT);
        assert!(matches!(
            link.send("x\n").await,
            Err(PeripheralError::WriteFailed(_))
        ));
        assert!(link.is_connected());
    }

    #[tokio::test]
    async fn test_write_timeout() {
        // Nobody reads the other end and the buffer is tiny.
        let (a, _b) = tokio::io::duplex(4);
        let mut link =
            PeripheralLink::from_writer(device("rfcomm0"), Box::new(a), Duration::from_millis(20));

        let err = link.send("much longer than four bytes\n").await.unwrap_err();
        assert!(matches!(err, PeripheralError::WriteFailed(ref m) if m.contains("timed out")));
    }

    #[tokio::test]
    async fn test_connect_picks_matching_device() {
        let discovery = FixedDiscovery {
            devices: vec![device("tty0"), device("rfcomm3")],
            open_fails: false,
            open_hangs: false,
        };
        let link = PeripheralLink::connect(
            &discovery,
            &DeviceMatcher::default(),
            DEFAULT_CONNECT_TIMEOUT,
            DEFAULT_WRITE_TIMEOUT,
        )
            .await
            .unwrap();
        assert_eq!(link.device().name, "rfcomm3");
    }

    #[tokio::test]
    async fn test_connect_not_found() {
        let discovery = FixedDiscovery {
            devices: vec![device("tty0")],
            open_fails: false,
            open_hangs: false,
        };
        let err = PeripheralLink::connect(
            &discovery,
            &DeviceMatcher::default(),
            DEFAULT_CONNECT_TIMEOUT,
            DEFAULT_WRITE_TIMEOUT,
        )
            .await
            .unwrap_err();
        assert!(matches!(err, PeripheralError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_connect_open_failure() {
        let discovery = FixedDiscovery {
            devices: vec![device("rfcomm0")],
            open_fails: true,
            open_hangs: false,
        };
        let err = PeripheralLink::connect(
            &discovery,
            &DeviceMatcher::default(),
            DEFAULT_CONNECT_TIMEOUT,
            DEFAULT_WRITE_TIMEOUT,
        )
            .await
            .unwrap_err();
        assert!(matches!(err, PeripheralError::ConnectFailed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_open_times_out() {
        let discovery = FixedDiscovery {
            devices: vec![device("rfcomm0")],
            open_fails: false,
            open_hangs: true,
        };
        let err = PeripheralLink::connect(
            &discovery,
            &DeviceMatcher::default(),
            Duration::from_secs(2),
            DEFAULT_WRITE_TIMEOUT,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            PeripheralError::ConnectFailed { ref device, ref reason }
                if device == "rfcomm0" && reason.contains("timed out")
        ));
    }
}
