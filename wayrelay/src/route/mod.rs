//! Route data model.
//!
//! A [`Route`] is produced by a [`RouteProvider`](crate::provider::RouteProvider)
//! and then stamped with a generation by the
//! [`RouteSession`](crate::session::RouteSession) that requested it. Routes are
//! replaced wholesale, never edited in place.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;

/// Monotonic tag distinguishing successive route computations.
pub type RouteGeneration = u64;

/// How the user is travelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    #[default]
    Driving,
    Walking,
}

impl TravelMode {
    /// Name used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            TravelMode::Driving => "driving",
            TravelMode::Walking => "walking",
        }
    }
}

impl fmt::Display for TravelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TravelMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "driving" | "car" => Ok(TravelMode::Driving),
            "walking" | "foot" => Ok(TravelMode::Walking),
            other => Err(format!("unknown travel mode '{}'", other)),
        }
    }
}

/// One discrete turn or instruction point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Maneuver {
    pub location: Coordinate,
    pub instruction_text: String,
    /// Maneuver category as reported by the router (`turn`, `depart`, ...).
    pub kind: String,
    /// Direction qualifier (`left`, `slight right`, ...); empty when absent.
    pub modifier: String,
}

/// A route step; steps are ordered and indexed `0..N-1` within a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub maneuver: Maneuver,
}

impl Step {
    /// Convenience constructor used by providers and tests.
    pub fn new(location: Coordinate, instruction_text: impl Into<String>) -> Self {
        Self {
            maneuver: Maneuver {
                location,
                instruction_text: instruction_text.into(),
                kind: String::new(),
                modifier: String::new(),
            },
        }
    }

    /// Sets the maneuver type and modifier.
    pub fn with_kind(mut self, kind: impl Into<String>, modifier: impl Into<String>) -> Self {
        self.maneuver.kind = kind.into();
        self.maneuver.modifier = modifier.into();
        self
    }

    pub fn location(&self) -> Coordinate {
        self.maneuver.location
    }

    pub fn instruction(&self) -> &str {
        &self.maneuver.instruction_text
    }
}

/// A complete route between origin and destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub geometry: Vec<Coordinate>,
    pub steps: Vec<Step>,
    pub total_distance_meters: f64,
    /// Zero until the route session installs the route.
    pub generation: RouteGeneration,
}

impl Route {
    pub fn new(geometry: Vec<Coordinate>, steps: Vec<Step>, total_distance_meters: f64) -> Self {
        Self {
            geometry,
            steps,
            total_distance_meters,
            generation: 0,
        }
    }

    /// Returns the route tagged with `generation`.
    pub fn with_generation(mut self, generation: RouteGeneration) -> Self {
        self.generation = generation;
        self
    }

    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Total distance in kilometers rounded to two decimals.
    pub fn total_distance_km(&self) -> f64 {
        (self.total_distance_meters / 1000.0 * 100.0).round() / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_travel_mode_parse() {
        assert_eq!("Walking".parse::<TravelMode>(), Ok(TravelMode::Walking));
        assert_eq!("car".parse::<TravelMode>(), Ok(TravelMode::Driving));
        assert!("boat".parse::<TravelMode>().is_err());
        assert_eq!(TravelMode::default(), TravelMode::Driving);
    }

    #[test]
    fn test_total_distance_km_rounds() {
        let route = Route::new(Vec::new(), Vec::new(), 12_346.0);
        assert_eq!(route.total_distance_km(), 12.35);

        let route = Route::new(Vec::new(), Vec::new(), 994.0);
        assert_eq!(route.total_distance_km(), 0.99);
    }

    #[test]
    fn test_with_generation() {
        let route = Route::new(Vec::new(), Vec::new(), 0.0);
        assert_eq!(route.generation, 0);
        assert_eq!(route.with_generation(7).generation, 7);
    }
}
