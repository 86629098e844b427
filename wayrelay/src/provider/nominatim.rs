//! Nominatim geocoder.
//!
//! `GET {base}/search?q=<query>&format=json&limit=1` returns an array of
//! places whose `lat`/`lon` are decimal strings. The first entry is taken as
//! the best match.

use serde::Deserialize;
use tracing::debug;

use super::http::AsyncHttpClient;
use super::types::{Geocoder, ProviderError, ProviderFuture};
use crate::geo::Coordinate;

/// Public Nominatim instance.
pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";

/// Free-text geocoder backed by Nominatim.
pub struct NominatimGeocoder<C: AsyncHttpClient> {
    http_client: C,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: String,
}

impl<C: AsyncHttpClient> NominatimGeocoder<C> {
    pub fn new(http_client: C) -> Self {
        Self::with_base_url(http_client, DEFAULT_NOMINATIM_URL)
    }

    pub fn with_base_url(http_client: C, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn build_url(&self, query: &str) -> Result<String, ProviderError> {
        reqwest::Url::parse_with_params(
            &format!("{}/search", self.base_url),
            &[("q", query), ("format", "json"), ("limit", "1")],
        )
        .map(String::from)
        .map_err(|e| ProviderError::InvalidResponse(format!("bad geocoder URL: {}", e)))
    }

    async fn lookup(&self, query: &str) -> Result<Coordinate, ProviderError> {
        let url = self.build_url(query)?;
        let body = self.http_client.get(&url).await?;

        let places: Vec<NominatimPlace> = serde_json::from_slice(&body)
            .map_err(|e| ProviderError::InvalidResponse(format!("Nominatim JSON: {}", e)))?;
        let place = places
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::GeocodeFailed(query.to_string()))?;

        let lat = place.lat.parse::<f64>();
        let lon = place.lon.parse::<f64>();
        let coordinate = match (lat, lon) {
            (Ok(lat), Ok(lon)) => Coordinate::new(lat, lon)
                .map_err(|_| ProviderError::GeocodeFailed(query.to_string()))?,
            _ => return Err(ProviderError::GeocodeFailed(query.to_string())),
        };

        debug!(query, place = %place.display_name, %coordinate, "Geocoded destination");
        Ok(coordinate)
    }
}

impl<C: AsyncHttpClient> Geocoder for NominatimGeocoder<C> {
    fn geocode<'a>(&'a self, query: &'a str) -> ProviderFuture<'a, Coordinate> {
        Box::pin(self.lookup(query))
    }
}
