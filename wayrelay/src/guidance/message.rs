//! Guidance message composition and wire rendering.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::route::{Route, RouteGeneration};

/// The text relayed for one step transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuidanceMessage {
    /// Route distance in kilometers, rounded to two decimals.
    pub distance_remaining_km: f64,
    pub instruction_text: String,
}

impl GuidanceMessage {
    pub fn new(distance_remaining_km: f64, instruction_text: impl Into<String>) -> Self {
        Self {
            distance_remaining_km: round_2(distance_remaining_km),
            instruction_text: instruction_text.into(),
        }
    }

    /// Builds the message for `step_index` of `route`.
    pub fn for_step(route: &Route, step_index: usize) -> Option<Self> {
        let step = route.step(step_index)?;
        Some(Self {
            distance_remaining_km: route.total_distance_km(),
            instruction_text: step.instruction().to_string(),
        })
    }

    /// Renders the peripheral line: `D:<km>km | Dir:<instruction>\n`.
    ///
    /// The instruction is flattened to printable ASCII so the message always
    /// occupies exactly one line on the wire.
    pub fn to_wire_line(&self) -> String {
        format!(
            "D:{:.2}km | Dir:{}\n",
            self.distance_remaining_km,
            sanitize_ascii(&self.instruction_text)
        )
    }
}

impl fmt::Display for GuidanceMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.2} km - {}",
            self.distance_remaining_km, self.instruction_text
        )
    }
}

/// A guidance emission as seen by observers.
#[derive(Debug, Clone, Serialize)]
pub struct GuidanceUpdate {
    pub generation: RouteGeneration,
    pub step_index: usize,
    pub step_count: usize,
    /// Distance from the triggering fix to the step's maneuver point.
    pub distance_to_step_m: f64,
    pub message: GuidanceMessage,
    pub emitted_at: DateTime<Utc>,
}

impl GuidanceUpdate {
    /// True when this update announces the route's final step.
    pub fn is_final_step(&self) -> bool {
        self.step_index + 1 == self.step_count
    }
}

fn round_2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn sanitize_ascii(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            c if c.is_ascii_control() || c.is_whitespace() => ' ',
            c if c.is_ascii() => c,
            _ => '?',
        })
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;
    use crate::route::Step;

    #[test]
    fn test_wire_line_format() {
        let msg = GuidanceMessage::new(3.456, "Turn left onto Main Street");
        assert_eq!(msg.to_wire_line(), "D:3.46km | Dir:Turn left onto Main Street\n");
    }

    #[test]
    fn test_wire_line_pads_two_decimals() {
        let msg = GuidanceMessage::new(2.0, "Depart");
        assert_eq!(msg.to_wire_line(), "D:2.00km | Dir:Depart\n");
    }

    #[test]
    fn test_wire_line_is_single_ascii_line() {
        let msg = GuidanceMessage::new(1.0, "Turn right\nonto Straße\r");
        let line = msg.to_wire_line();
        assert_eq!(line, "D:1.00km | Dir:Turn right onto Stra?e\n");
        assert_eq!(line.matches('\n').count(), 1);
        assert!(line.is_ascii());
    }

    #[test]
    fn test_for_step_uses_route_total() {
        let origin = Coordinate::new(0.0, 0.0).unwrap();
        let route = Route::new(
            vec![origin],
            vec![Step::new(origin, "Depart"), Step::new(origin, "Arrive")],
            4_321.0,
        );

        let msg = GuidanceMessage::for_step(&route, 1).unwrap();
        assert_eq!(msg.distance_remaining_km, 4.32);
        assert_eq!(msg.instruction_text, "Arrive");
        assert!(GuidanceMessage::for_step(&route, 2).is_none());
    }
}
