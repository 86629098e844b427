//! Guidance emission.
//!
//! Turns tracker results into [`GuidanceUpdate`]s and fans them out to
//! observers: synchronous [`GuidanceObserver`]s (the peripheral forwarder)
//! and a broadcast channel for UI consumers.
//!
//! ```text
//! StepMatch ──► GuidanceEmitter ──┬──► GuidanceObserver (non-blocking)
//!   (changed index only)          └──► broadcast::Receiver<GuidanceUpdate>
//! ```

mod emitter;
mod message;

pub use emitter::{GuidanceEmitter, GuidanceObserver, DEFAULT_UPDATE_CHANNEL_CAPACITY};
pub use message::{GuidanceMessage, GuidanceUpdate};
