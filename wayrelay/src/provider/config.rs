//! Routing backend settings.

use super::http::{AsyncReqwestClient, DEFAULT_HTTP_TIMEOUT_SECS};
use super::nominatim::{NominatimGeocoder, DEFAULT_NOMINATIM_URL};
use super::osrm::{OsrmRouteProvider, DEFAULT_OSRM_URL};
use super::types::ProviderError;
use crate::route::TravelMode;

/// Where and how to fetch routes and geocode destinations.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingConfig {
    pub osrm_url: String,
    pub nominatim_url: String,
    pub mode: TravelMode,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            osrm_url: DEFAULT_OSRM_URL.to_string(),
            nominatim_url: DEFAULT_NOMINATIM_URL.to_string(),
            mode: TravelMode::default(),
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            user_agent: default_user_agent(),
        }
    }
}

/// `wayrelay/<version>`.
pub fn default_user_agent() -> String {
    format!("wayrelay/{}", crate::VERSION)
}

impl RoutingConfig {
    pub fn with_osrm_url(mut self, url: impl Into<String>) -> Self {
        self.osrm_url = url.into();
        self
    }

    pub fn with_nominatim_url(mut self, url: impl Into<String>) -> Self {
        self.nominatim_url = url.into();
        self
    }

    pub fn with_mode(mut self, mode: TravelMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// HTTP client shared by both adapters.
    pub fn http_client(&self) -> Result<AsyncReqwestClient, ProviderError> {
        AsyncReqwestClient::with_options(self.timeout_secs, &self.user_agent)
    }

    pub fn route_provider(&self) -> Result<OsrmRouteProvider<AsyncReqwestClient>, ProviderError> {
        Ok(OsrmRouteProvider::with_base_url(
            self.http_client()?,
            self.osrm_url.clone(),
        ))
    }

    pub fn geocoder(&self) -> Result<NominatimGeocoder<AsyncReqwestClient>, ProviderError> {
        Ok(NominatimGeocoder::with_base_url(
            self.http_client()?,
            self.nominatim_url.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RoutingConfig::default();
        assert_eq!(config.osrm_url, DEFAULT_OSRM_URL);
        assert_eq!(config.mode, TravelMode::Driving);
        assert_eq!(config.timeout_secs, 15);
        assert!(config.user_agent.starts_with("wayrelay/"));
    }

    #[test]
    fn test_builders() {
        let config = RoutingConfig::default()
            .with_osrm_url("http://localhost:5000")
            .with_mode(TravelMode::Walking)
            .with_timeout_secs(3);
        assert_eq!(config.osrm_url, "http://localhost:5000");
        assert_eq!(config.mode, TravelMode::Walking);
        assert!(config.route_provider().is_ok());
        assert!(config.geocoder().is_ok());
    }
}
