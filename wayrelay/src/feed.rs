//! Position feed adapters.
//!
//! Fixes arrive as text lines (stdin, a replay file, a pipe from a GPS
//! daemon). Each line is parsed, passed through a [`FixFilter`] enforcing the
//! minimum elapsed time and moved distance, and forwarded into the guidance
//! session's event channel.
//!
//! Accepted line formats:
//!
//! ```text
//! 53.5511,9.9937
//! 53.5511 9.9937
//! {"latitude": 53.5511, "longitude": 9.9937}
//! # comments and blank lines are ignored
//! ```

use std::time::{Duration, Instant};

use serde::Deserialize;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::geo::{distance_meters, Coordinate};
use crate::session::{PositionFix, SessionEvent};

/// Default minimum time between forwarded fixes.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(1000);

/// Default minimum movement between forwarded fixes, in meters.
pub const DEFAULT_MIN_DISTANCE_M: f64 = 1.0;

/// Errors from reading the feed source.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("position feed read failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Deserialize)]
struct JsonFix {
    latitude: f64,
    longitude: f64,
}

/// Parses one feed line.
///
/// Returns `None` for blank lines, comments and anything unparseable. The
/// values are not range-checked here; the session validates every fix.
pub fn parse_fix(line: &str) -> Option<PositionFix> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    if line.starts_with('{') {
        let fix: JsonFix = serde_json::from_str(line).ok()?;
        return Some(PositionFix::new(fix.latitude, fix.longitude));
    }

    let mut parts = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty());
    let latitude = parts.next()?.parse().ok()?;
    let longitude = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(PositionFix::new(latitude, longitude))
}

/// Configuration for [`FixFilter`].
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub min_interval: Duration,
    pub min_distance_m: f64,
    /// Delay between lines when replaying a recorded track.
    pub pace: Option<Duration>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            min_interval: DEFAULT_MIN_INTERVAL,
            min_distance_m: DEFAULT_MIN_DISTANCE_M,
            pace: None,
        }
    }
}

impl FeedConfig {
    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    pub fn with_min_distance_m(mut self, min_distance_m: f64) -> Self {
        self.min_distance_m = min_distance_m;
        self
    }

    pub fn with_pace(mut self, pace: Option<Duration>) -> Self {
        self.pace = pace;
        self
    }
}

/// Drops fixes that arrive too soon or have barely moved.
///
/// Fixes that are not valid coordinates are passed through untouched so the
/// session can account for them.
#[derive(Debug)]
pub struct FixFilter {
    min_interval: Duration,
    min_distance_m: f64,
    last: Option<(Coordinate, Instant)>,
}

impl FixFilter {
    pub fn new(config: &FeedConfig) -> Self {
        Self {
            min_interval: config.min_interval,
            min_distance_m: config.min_distance_m,
            last: None,
        }
    }

    /// Returns true when the fix should be forwarded.
    pub fn accept(&mut self, fix: &PositionFix) -> bool {
        self.accept_at(fix, Instant::now())
    }

    /// Same as [`accept`](Self::accept) with an explicit arrival time.
    pub fn accept_at(&mut self, fix: &PositionFix, now: Instant) -> bool {
        let Ok(position) = fix.coordinate() else {
            return true;
        };

        if let Some((last_position, last_time)) = self.last {
            if now.duration_since(last_time) < self.min_interval {
                return false;
            }
            if distance_meters(last_position, position) < self.min_distance_m {
                return false;
            }
        }

        self.last = Some((position, now));
        true
    }
}

/// Spawns a task forwarding fixes read from `reader` into `events`.
///
/// The task ends at end of input, on cancellation, or when the session's
/// event channel closes. It returns the number of fixes forwarded.
pub fn spawn_line_feed<R>(
    reader: R,
    config: FeedConfig,
    events: mpsc::Sender<SessionEvent>,
    cancellation: CancellationToken,
) -> JoinHandle<Result<u64, FeedError>>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = reader.lines();
        let mut filter = FixFilter::new(&config);
        let mut forwarded = 0u64;

        loop {
            let line = tokio::select! {
                biased;
                _ = cancellation.cancelled() => break,
                line = lines.next_line() => line?,
            };
            let Some(line) = line else {
                info!(forwarded, "Position feed reached end of input");
                break;
            };

            let Some(fix) = parse_fix(&line) else {
                if !line.trim().is_empty() && !line.trim_start().starts_with('#') {
                    debug!(line = %line, "Unparseable position line skipped");
                }
                continue;
            };

            if !filter.accept(&fix) {
                continue;
            }

            if events.send(SessionEvent::Fix(fix)).await.is_err() {
                warn!("Guidance session closed, stopping position feed");
                break;
            }
            forwarded += 1;

            if let Some(pace) = config.pace {
                tokio::select! {
                    _ = cancellation.cancelled() => break,
                    _ = tokio::time::sleep(pace) => {}
                }
            }
        }

        Ok(forwarded)
    })
}
