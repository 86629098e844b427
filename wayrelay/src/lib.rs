//! Wayrelay - turn-by-turn guidance relayed to a serial peripheral
//!
//! This library follows a moving user along a precomputed route and forwards
//! each step transition to an external device (for example a Bluetooth serial
//! module driving a small display).
//!
//! # Architecture
//!
//! ```text
//! PositionFeed ──► GuidanceSession ──► StepTracker ──► GuidanceEmitter ──┬──► UI subscribers
//!                       │   ▲                                            └──► PeripheralLink
//!                       ▼   │ (generation-tagged results)
//!                   RouteProvider
//! ```
//!
//! - [`geo`] - coordinates and great-circle distance
//! - [`tracker`] - forward-only, threshold-gated step matching
//! - [`session`] - route ownership, generation counter and the event loop
//! - [`guidance`] - message composition and observer dispatch
//! - [`peripheral`] - scoped serial connection with best-effort sends
//! - [`provider`] - routing (OSRM) and geocoding (Nominatim) adapters
//! - [`feed`] - position fix parsing and filtering

pub mod config;
pub mod error;
pub mod feed;
pub mod geo;
pub mod guidance;
pub mod logging;
pub mod peripheral;
pub mod provider;
pub mod route;
pub mod session;
pub mod tracker;

/// Crate version, as reported by the CLI banner and default user agent.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use error::GuidanceError;
pub use geo::Coordinate;
pub use guidance::{GuidanceMessage, GuidanceUpdate};
pub use route::{Maneuver, Route, Step, TravelMode};
pub use session::{GuidanceSession, SessionEvent};
pub use tracker::{StepMatch, StepTracker};
