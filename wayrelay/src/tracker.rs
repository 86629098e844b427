//! Forward-only step tracking.
//!
//! The tracker keeps a monotonic pointer into a route's step list. On every
//! fix it re-evaluates the steps from its current index onward and moves to
//! the nearest one within the arrival threshold, if any.
//!
//! # Matching Rules
//!
//! - Steps before the current index are never scanned, so the index never
//!   decreases within a route generation.
//! - Among steps within the threshold, the globally closest one wins (ties go
//!   to the lowest index). Walking through a step without lingering is
//!   therefore recovered on the next fix near a later step.
//! - Nothing within the threshold means no opinion: the index is left as is,
//!   so GPS jitter cannot cause a false transition.

use crate::geo::{distance_meters, Coordinate};
use crate::route::{Route, RouteGeneration, Step};

/// Default arrival radius around a maneuver location.
pub const DEFAULT_STEP_THRESHOLD_M: f64 = 30.0;

/// A step resolved from a position fix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepMatch {
    pub index: usize,
    /// Distance from the fix to the step's maneuver location in meters.
    pub distance: f64,
}

/// Finds the closest step within `threshold_m`, scanning `steps[from_index..]`.
///
/// Returns `None` when no scanned step is within the threshold or when
/// `from_index` is past the end of the list.
pub fn locate(
    position: Coordinate,
    steps: &[Step],
    from_index: usize,
    threshold_m: f64,
) -> Option<StepMatch> {
    let candidates = steps.get(from_index..)?;

    let mut best: Option<StepMatch> = None;
    for (offset, step) in candidates.iter().enumerate() {
        let distance = distance_meters(position, step.location());
        if distance >= threshold_m {
            continue;
        }
        // Strict comparison keeps the lowest index on an exact tie.
        if best.map_or(true, |b| distance < b.distance) {
            best = Some(StepMatch {
                index: from_index + offset,
                distance,
            });
        }
    }
    best
}

/// Tracker state for the active route generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerState {
    pub current_step_index: usize,
    pub route_generation: RouteGeneration,
    /// Whether a fix has actually resolved to `current_step_index`.
    pub confirmed: bool,
}

impl TrackerState {
    fn fresh(route_generation: RouteGeneration) -> Self {
        Self {
            current_step_index: 0,
            route_generation,
            confirmed: false,
        }
    }
}

/// Owns the monotonic step pointer for one guidance session.
#[derive(Debug)]
pub struct StepTracker {
    threshold_m: f64,
    state: Option<TrackerState>,
}

impl Default for StepTracker {
    fn default() -> Self {
        Self::new(DEFAULT_STEP_THRESHOLD_M)
    }
}

impl StepTracker {
    pub fn new(threshold_m: f64) -> Self {
        Self {
            threshold_m,
            state: None,
        }
    }

    pub fn threshold_m(&self) -> f64 {
        self.threshold_m
    }

    /// Current state, or `None` before any route has been installed.
    pub fn state(&self) -> Option<TrackerState> {
        self.state
    }

    /// Resets the pointer to step 0 for a newly installed route generation.
    ///
    /// Older generations are ignored so a late reset cannot rewind progress.
    pub fn reset(&mut self, generation: RouteGeneration) {
        match self.state {
            Some(state) if state.route_generation >= generation => {}
            _ => self.state = Some(TrackerState::fresh(generation)),
        }
    }

    /// Resolves `position` against `route` and advances the pointer.
    ///
    /// Returns the match when the fix is within the threshold of a step at or
    /// after the current index. Returns `None` (leaving state untouched) when
    /// nothing is in range, when the route is older than the tracked
    /// generation, or when the final step has already been reached.
    pub fn advance(&mut self, position: Coordinate, route: &Route) -> Option<StepMatch> {
        if route.is_empty() {
            return None;
        }

        self.reset(route.generation);
        let state = self.state.as_mut()?;
        if state.route_generation != route.generation {
            return None;
        }

        let last = route.steps.len() - 1;
        if state.confirmed && state.current_step_index >= last {
            return None;
        }

        let found = locate(
            position,
            &route.steps,
            state.current_step_index,
            self.threshold_m,
        )?;

        debug_assert!(found.index >= state.current_step_index);
        state.current_step_index = found.index;
        state.confirmed = true;
        Some(found)
    }
}
