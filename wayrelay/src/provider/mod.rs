//! Routing and geocoding provider abstraction
//!
//! The guidance engine consumes routes and coordinates through the
//! [`RouteProvider`] and [`Geocoder`] traits. Concrete adapters talk to OSRM
//! and Nominatim over HTTP via the [`AsyncHttpClient`] seam.
//!
//! ```ignore
//! use wayrelay::provider::{AsyncReqwestClient, OsrmRouteProvider, RouteProvider};
//!
//! let provider = OsrmRouteProvider::new(AsyncReqwestClient::new()?);
//! let route = provider.route(start, end, TravelMode::Driving).await?;
//! ```

mod config;
mod http;
mod nominatim;
mod osrm;
mod types;

pub use config::{default_user_agent, RoutingConfig};
pub use http::{AsyncHttpClient, AsyncReqwestClient, DEFAULT_HTTP_TIMEOUT_SECS};
pub use nominatim::{NominatimGeocoder, DEFAULT_NOMINATIM_URL};
pub use osrm::{compose_instruction, OsrmRouteProvider, DEFAULT_OSRM_URL};
pub use types::{Geocoder, ProviderError, ProviderFuture, RouteProvider};

#[cfg(test)]
pub use http::tests::MockAsyncHttpClient;

use crate::geo::Coordinate;

/// Resolves a destination argument.
///
/// Input of the form `lat,lon` is used directly; anything else goes through
/// the geocoder.
pub async fn resolve_destination(
    geocoder: &dyn Geocoder,
    input: &str,
) -> Result<Coordinate, ProviderError> {
    if let Ok(coordinate) = input.parse::<Coordinate>() {
        return Ok(coordinate);
    }
    geocoder.geocode(input.trim()).await
}
