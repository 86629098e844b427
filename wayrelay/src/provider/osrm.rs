//! OSRM routing provider.
//!
//! # URL Pattern
//!
//! `{base}/route/v1/{profile}/{lon},{lat};{lon},{lat}?overview=full&geometries=geojson&steps=true`
//!
//! - Coordinates are given longitude first
//! - `overview=full` returns the complete polyline used for deviation checks
//! - `steps=true` returns one maneuver per step in each leg
//!
//! Error responses carry a JSON body with a `code` field (`NoRoute`,
//! `InvalidQuery`, ...) even when the HTTP status is 400.

use serde::Deserialize;
use tracing::debug;

use super::http::AsyncHttpClient;
use super::types::{ProviderError, ProviderFuture, RouteProvider};
use crate::geo::Coordinate;
use crate::route::{Route, Step, TravelMode};

/// Public OSRM demo server.
pub const DEFAULT_OSRM_URL: &str = "https://router.project-osrm.org";

/// OSRM route provider.
pub struct OsrmRouteProvider<C: AsyncHttpClient> {
    http_client: C,
    base_url: String,
}

impl<C: AsyncHttpClient> OsrmRouteProvider<C> {
    /// Creates a provider against the public demo server.
    pub fn new(http_client: C) -> Self {
        Self::with_base_url(http_client, DEFAULT_OSRM_URL)
    }

    /// Creates a provider against a custom OSRM instance.
    pub fn with_base_url(http_client: C, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn build_url(&self, start: Coordinate, end: Coordinate, mode: TravelMode) -> String {
        format!(
            "{}/route/v1/{}/{},{};{},{}?overview=full&geometries=geojson&steps=true",
            self.base_url,
            profile(mode),
            start.longitude,
            start.latitude,
            end.longitude,
            end.latitude
        )
    }

    async fn fetch(
        &self,
        start: Coordinate,
        end: Coordinate,
        mode: TravelMode,
    ) -> Result<Route, ProviderError> {
        let url = self.build_url(start, end, mode);
        debug!(url = %url, "Requesting OSRM route");

        match self.http_client.get(&url).await {
            Ok(body) => parse_route_response(&body),
            Err(ProviderError::HttpStatus { status, url, body }) => {
                // Prefer OSRM's own error code when the body has one.
                match serde_json::from_str::<OsrmResponse>(&body) {
                    Ok(response) => parse_route(response),
                    Err(_) => Err(ProviderError::HttpStatus { status, url, body }),
                }
            }
            Err(e) => Err(e),
        }
    }
}

impl<C: AsyncHttpClient> RouteProvider for OsrmRouteProvider<C> {
    fn route(
        &self,
        start: Coordinate,
        end: Coordinate,
        mode: TravelMode,
    ) -> ProviderFuture<'_, Route> {
        Box::pin(self.fetch(start, end, mode))
    }

    fn name(&self) -> &str {
        "OSRM"
    }
}

fn profile(mode: TravelMode) -> &'static str {
    match mode {
        TravelMode::Driving => "driving",
        TravelMode::Walking => "foot",
    }
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    distance: f64,
    geometry: OsrmGeometry,
    #[serde(default)]
    legs: Vec<OsrmLeg>,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<[f64; 2]>,
}

#[derive(Debug, Deserialize)]
struct OsrmLeg {
    #[serde(default)]
    steps: Vec<OsrmStep>,
}

#[derive(Debug, Deserialize)]
struct OsrmStep {
    maneuver: OsrmManeuver,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct OsrmManeuver {
    location: [f64; 2],
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    modifier: Option<String>,
    #[serde(default)]
    exit: Option<u32>,
}

fn parse_route_response(body: &[u8]) -> Result<Route, ProviderError> {
    let response: OsrmResponse = serde_json::from_slice(body)
        .map_err(|e| ProviderError::InvalidResponse(format!("OSRM JSON: {}", e)))?;
    parse_route(response)
}

fn parse_route(response: OsrmResponse) -> Result<Route, ProviderError> {
    if response.code != "Ok" {
        let detail = response.message.unwrap_or(response.code);
        return Err(ProviderError::NoRoute(detail));
    }

    let route = response
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::NoRoute("response contained no routes".to_string()))?;

    let geometry = route
        .geometry
        .coordinates
        .iter()
        .map(|[lon, lat]| to_coordinate(*lon, *lat))
        .collect::<Result<Vec<_>, _>>()?;

    let mut steps = Vec::new();
    for step in route.legs.into_iter().flat_map(|leg| leg.steps) {
        let [lon, lat] = step.maneuver.location;
        let modifier = step.maneuver.modifier.unwrap_or_default();
        let text = compose_instruction(
            &step.maneuver.kind,
            &modifier,
            &step.name,
            step.maneuver.exit,
        );
        steps.push(
            Step::new(to_coordinate(lon, lat)?, text).with_kind(step.maneuver.kind, modifier),
        );
    }

    if steps.is_empty() {
        return Err(ProviderError::EmptyRoute);
    }

    Ok(Route::new(geometry, steps, route.distance))
}

fn to_coordinate(lon: f64, lat: f64) -> Result<Coordinate, ProviderError> {
    Coordinate::new(lat, lon)
        .map_err(|e| ProviderError::InvalidResponse(format!("bad coordinate: {}", e)))
}

/// Builds a human-readable instruction from OSRM maneuver fields.
pub fn compose_instruction(kind: &str, modifier: &str, name: &str, exit: Option<u32>) -> String {
    let base = match kind {
        "depart" => "Depart".to_string(),
        "arrive" => return "Arrive at destination".to_string(),
        "roundabout" | "rotary" | "exit roundabout" | "exit rotary" => match exit {
            Some(n) => format!("At the roundabout, take exit {}", n),
            None => "Enter the roundabout".to_string(),
        },
        "on ramp" => with_side("Take the ramp", modifier),
        "off ramp" => with_side("Take the exit", modifier),
        "fork" => with_modifier("Keep", modifier),
        "merge" => with_modifier("Merge", modifier),
        "continue" | "new name" => with_modifier("Continue", modifier),
        _ => match modifier {
            "uturn" => "Make a U-turn".to_string(),
            "straight" => "Go straight".to_string(),
            _ => with_modifier("Turn", modifier),
        },
    };

    if name.is_empty() {
        base
    } else {
        format!("{} onto {}", base, name)
    }
}

fn with_modifier(verb: &str, modifier: &str) -> String {
    if modifier.is_empty() {
        verb.to_string()
    } else {
        format!("{} {}", verb, modifier)
    }
}

fn with_side(verb: &str, modifier: &str) -> String {
    if modifier.contains("left") {
        format!("{} on the left", verb)
    } else if modifier.contains("right") {
        format!("{} on the right", verb)
    } else {
        verb.to_string()
    }
}
