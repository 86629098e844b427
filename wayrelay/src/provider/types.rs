//! Provider traits and errors.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::geo::Coordinate;
use crate::route::{Route, TravelMode};

/// Boxed future returned by provider traits.
///
/// Boxing keeps the traits dyn-compatible so sessions can hold an
/// `Arc<dyn RouteProvider>`.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send + 'a>>;

/// Errors from routing and geocoding backends.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// The backend found no route between the endpoints.
    #[error("no route: {0}")]
    NoRoute(String),

    /// Transport-level failure (connect, timeout, body read).
    #[error("network error: {0}")]
    NetworkError(String),

    /// Non-success HTTP status; the body is kept for backends that put
    /// structured error codes there.
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        status: u16,
        url: String,
        body: String,
    },

    /// The backend answered with something we could not interpret.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The route contained no steps.
    #[error("route has no steps")]
    EmptyRoute,

    /// A free-text destination could not be resolved.
    #[error("geocoding failed for '{0}'")]
    GeocodeFailed(String),
}

/// Supplies routes on request.
pub trait RouteProvider: Send + Sync {
    /// Computes a route from `start` to `end`.
    ///
    /// The returned route carries generation 0; the caller stamps it.
    fn route(&self, start: Coordinate, end: Coordinate, mode: TravelMode)
        -> ProviderFuture<'_, Route>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

/// Resolves a free-text query to a single best-match coordinate.
pub trait Geocoder: Send + Sync {
    fn geocode<'a>(&'a self, query: &'a str) -> ProviderFuture<'a, Coordinate>;
}
