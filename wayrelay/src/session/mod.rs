//! Guidance session: route lifecycle plus the event loop that drives it.
//!
//! The session is the only owner of mutable guidance state. Position fixes
//! and navigation requests arrive on a single event channel and are handled
//! to completion in arrival order; route recomputes run as background tasks
//! whose results come back tagged with their generation.
//!
//! ```text
//!  PositionFeed ──Fix──┐
//!                      ├──► GuidanceSession ──► StepTracker ──► GuidanceEmitter ──► observers
//!  CLI/UI ──Navigate───┘         │  ▲
//!                                ▼  │ RouteOutcome{generation}
//!                           RouteProvider (spawned)
//! ```

mod guidance;
mod routes;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::geo::{Coordinate, GeoError};
use crate::guidance::DEFAULT_UPDATE_CHANNEL_CAPACITY;
use crate::route::TravelMode;
use crate::tracker::DEFAULT_STEP_THRESHOLD_M;

pub use guidance::{FixOutcome, GuidanceSession, SessionSummary};
pub use routes::{RouteCompletion, RouteSession};

/// Default distance from the route geometry that triggers a reroute.
pub const DEFAULT_DEVIATION_THRESHOLD_M: f64 = 50.0;

/// Default minimum time between two deviation-triggered reroutes.
pub const DEFAULT_REROUTE_COOLDOWN: Duration = Duration::from_secs(10);

/// Default time the peripheral worker gets to flush on teardown.
pub const DEFAULT_PERIPHERAL_DRAIN: Duration = Duration::from_secs(1);

/// A raw position sample as reported by a feed.
///
/// Not yet validated; the session checks every fix before using it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    pub latitude: f64,
    pub longitude: f64,
}

impl PositionFix {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Validates the fix.
    pub fn coordinate(&self) -> Result<Coordinate, GeoError> {
        Coordinate::new(self.latitude, self.longitude)
    }
}

impl From<Coordinate> for PositionFix {
    fn from(c: Coordinate) -> Self {
        Self::new(c.latitude, c.longitude)
    }
}

/// Input to a running [`GuidanceSession`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A new position sample.
    Fix(PositionFix),
    /// Start (or restart) guidance towards a destination.
    Navigate {
        destination: Coordinate,
        mode: TravelMode,
    },
}

/// Tuning for a [`GuidanceSession`].
#[derive(Debug, Clone)]
pub struct GuidanceConfig {
    /// A step is reached when the user is strictly closer than this.
    pub step_threshold_m: f64,
    /// Distance from the route line that counts as off route.
    pub deviation_threshold_m: f64,
    /// Minimum spacing between reroutes.
    pub reroute_cooldown: Duration,
    /// Capacity of the broadcast channel for UI subscribers.
    pub update_channel_capacity: usize,
    /// How long teardown waits for queued peripheral lines.
    pub peripheral_drain: Duration,
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            step_threshold_m: DEFAULT_STEP_THRESHOLD_M,
            deviation_threshold_m: DEFAULT_DEVIATION_THRESHOLD_M,
            reroute_cooldown: DEFAULT_REROUTE_COOLDOWN,
            update_channel_capacity: DEFAULT_UPDATE_CHANNEL_CAPACITY,
            peripheral_drain: DEFAULT_PERIPHERAL_DRAIN,
        }
    }
}

impl GuidanceConfig {
    pub fn with_step_threshold_m(mut self, meters: f64) -> Self {
        self.step_threshold_m = meters;
        self
    }

    pub fn with_deviation_threshold_m(mut self, meters: f64) -> Self {
        self.deviation_threshold_m = meters;
        self
    }

    pub fn with_reroute_cooldown(mut self, cooldown: Duration) -> Self {
        self.reroute_cooldown = cooldown;
        self
    }

    pub fn with_update_channel_capacity(mut self, capacity: usize) -> Self {
        self.update_channel_capacity = capacity;
        self
    }

    pub fn with_peripheral_drain(mut self, drain: Duration) -> Self {
        self.peripheral_drain = drain;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fix_validation() {
        assert!(PositionFix::new(45.0, 7.0).coordinate().is_ok());
        assert!(matches!(
            PositionFix::new(91.0, 7.0).coordinate(),
            Err(GeoError::InvalidLatitude(_))
        ));
        assert!(PositionFix::new(f64::INFINITY, 7.0).coordinate().is_err());
    }

    #[test]
    fn test_config_defaults() {
        let config = GuidanceConfig::default();
        assert_eq!(config.step_threshold_m, 30.0);
        assert_eq!(config.deviation_threshold_m, 50.0);
        assert_eq!(config.reroute_cooldown, Duration::from_secs(10));

        let config = config.with_step_threshold_m(15.0);
        assert_eq!(config.step_threshold_m, 15.0);
    }
}
