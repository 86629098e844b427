//! Background writer that owns a [`PeripheralLink`].
//!
//! Guidance lines are queued by a [`PeripheralForwarder`] (a non-blocking
//! observer) and written by a dedicated task, so slow or failing writes never
//! delay fix processing.
//!
//! ```text
//! GuidanceEmitter ──► PeripheralForwarder ──try_send──► [queue] ──► worker ──► PeripheralLink
//! ```
//!
//! The worker disconnects the link when the queue closes (all forwarders
//! dropped) or when its cancellation token fires.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::link::PeripheralLink;
use crate::guidance::{GuidanceObserver, GuidanceUpdate};

/// Default number of guidance lines buffered for the worker.
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Counters shared between the forwarder and the worker.
#[derive(Debug, Default)]
pub struct PeripheralStats {
    queued: AtomicU64,
    dropped: AtomicU64,
    sent: AtomicU64,
    failed: AtomicU64,
}

impl PeripheralStats {
    pub fn queued(&self) -> u64 {
        self.queued.load(Ordering::Relaxed)
    }

    /// Lines discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Lines whose write failed.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Queues guidance lines for the peripheral worker.
#[derive(Debug, Clone)]
pub struct PeripheralForwarder {
    tx: mpsc::Sender<String>,
    stats: Arc<PeripheralStats>,
}

impl PeripheralForwarder {
    pub fn stats(&self) -> Arc<PeripheralStats> {
        Arc::clone(&self.stats)
    }
}

impl GuidanceObserver for PeripheralForwarder {
    fn on_guidance(&self, update: &GuidanceUpdate) {
        match self.tx.try_send(update.message.to_wire_line()) {
            Ok(()) => {
                self.stats.queued.fetch_add(1, Ordering::Relaxed);
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(step = update.step_index, "Peripheral queue full, guidance line dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(step = update.step_index, "Peripheral worker gone, guidance not forwarded");
            }
        }
    }
}

/// Handle to a running peripheral worker.
#[derive(Debug)]
pub struct PeripheralWorker {
    handle: JoinHandle<PeripheralLink>,
    cancellation: CancellationToken,
}

impl PeripheralWorker {
    /// Spawns the worker task and returns it with its forwarder.
    pub fn spawn(
        link: PeripheralLink,
        queue_capacity: usize,
        cancellation: CancellationToken,
    ) -> (Self, PeripheralForwarder) {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let stats = Arc::new(PeripheralStats::default());

        let handle = tokio::spawn(run_worker(
            link,
            rx,
            Arc::clone(&stats),
            cancellation.clone(),
        ));

        (
            Self {
                handle,
                cancellation,
            },
            PeripheralForwarder { tx, stats },
        )
    }

    /// Waits for the worker to drain its queue and disconnect.
    ///
    /// Forwarders must be dropped first, otherwise this waits until the
    /// cancellation token fires. Returns the disconnected link.
    pub async fn join(self) -> Option<PeripheralLink> {
        finish(self.handle.await)
    }

    /// Cancels the worker without draining, then waits for it.
    pub async fn shutdown(self) -> Option<PeripheralLink> {
        self.cancellation.cancel();
        self.join().await
    }

    /// Gives the worker `drain` to flush queued lines, then cancels it.
    pub async fn close(mut self, drain: Duration) -> Option<PeripheralLink> {
        tokio::select! {
            result = &mut self.handle => return finish(result),
            _ = tokio::time::sleep(drain) => {
                debug!(drain_ms = drain.as_millis() as u64, "Peripheral drain timed out");
            }
        }
        self.shutdown().await
    }
}

fn finish(result: Result<PeripheralLink, tokio::task::JoinError>) -> Option<PeripheralLink> {
    match result {
        Ok(link) => Some(link),
        Err(e) => {
            warn!(error = %e, "Peripheral worker task failed");
            None
        }
    }
}

async fn run_worker(
    mut link: PeripheralLink,
    mut rx: mpsc::Receiver<String>,
    stats: Arc<PeripheralStats>,
    cancellation: CancellationToken,
) -> PeripheralLink {
    info!(device = %link.device().name, "Peripheral worker started");

    loop {
        tokio::select! {
            biased;

            _ = cancellation.cancelled() => {
                debug!("Peripheral worker cancelled");
                break;
            }

            line = rx.recv() => {
                let Some(line) = line else {
                    debug!("Peripheral queue closed");
                    break;
                };
                match link.send(&line).await {
                    Ok(()) => {
                        stats.sent.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        stats.failed.fetch_add(1, Ordering::Relaxed);
                        warn!(error = %e, "Guidance line not forwarded to peripheral");
                    }
                }
            }
        }
    }

    link.disconnect().await;
    info!(
        sent = stats.sent(),
        failed = stats.failed(),
        dropped = stats.dropped(),
        "Peripheral worker stopped"
    );
    link
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guidance::GuidanceMessage;
    use crate::peripheral::{DeviceInfo, DEFAULT_WRITE_TIMEOUT};
    use chrono::Utc;
    use tokio::io::AsyncReadExt;

    fn update(step: usize, text: &str) -> GuidanceUpdate {
        GuidanceUpdate {
            generation: 1,
            step_index: step,
            step_count: 3,
            distance_to_step_m: 3.0,
            message: GuidanceMessage::new(1.5, text),
            emitted_at: Utc::now(),
        }
    }

    fn link(writer: tokio::io::DuplexStream) -> PeripheralLink {
        PeripheralLink::from_writer(
            DeviceInfo::new("rfcomm0", "/dev/rfcomm0"),
            Box::new(writer),
            DEFAULT_WRITE_TIMEOUT,
        )
    }

    #[tokio::test]
    async fn test_forwarded_lines_reach_device() {
        let (a, mut b) = tokio::io::duplex(1024);
        let (worker, forwarder) = PeripheralWorker::spawn(link(a), 4, CancellationToken::new());

        forwarder.on_guidance(&update(0, "Depart"));
        forwarder.on_guidance(&update(1, "Turn left"));
        let stats = forwarder.stats();
        drop(forwarder);

        let link = worker.join().await.unwrap();
        assert!(!link.is_connected());
        assert_eq!(stats.sent(), 2);

        let mut received = String::new();
        b.read_to_string(&mut received).await.unwrap();
        assert_eq!(
            received,
            "D:1.50km | Dir:Depart\nD:1.50km | Dir:Turn left\n"
        );
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        // Tiny pipe nobody reads: the worker stalls on the first write.
        let (a, _b) = tokio::io::duplex(1);
        let cancellation = CancellationToken::new();
        let (worker, forwarder) = PeripheralWorker::spawn(link(a), 1, cancellation);

        for i in 0..10 {
            forwarder.on_guidance(&update(i, "Keep going"));
        }
        let stats = forwarder.stats();
        assert!(stats.dropped() > 0);
        assert!(stats.queued() + stats.dropped() == 10);

        drop(forwarder);
        let link = worker.shutdown().await.unwrap();
        assert!(!link.is_connected());
    }

    #[tokio::test]
    async fn test_cancellation_disconnects() {
        let (a, _b) = tokio::io::duplex(64);
        let cancellation = CancellationToken::new();
        let (worker, _forwarder) = PeripheralWorker::spawn(link(a), 4, cancellation.clone());

        cancellation.cancel();
        let link = worker.join().await.unwrap();
        assert!(!link.is_connected());
    }

    #[tokio::test]
    async fn test_close_cancels_stuck_worker() {
        // Forwarder kept alive: the queue never closes on its own.
        let (a, _b) = tokio::io::duplex(64);
        let (worker, _forwarder) = PeripheralWorker::spawn(link(a), 4, CancellationToken::new());

        let link = worker.close(Duration::from_millis(20)).await.unwrap();
        assert!(!link.is_connected());
    }
}
