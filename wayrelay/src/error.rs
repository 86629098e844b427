//! Crate-level error type.
//!
//! Each component owns its own error enum; [`GuidanceError`] gathers them for
//! callers (mainly the CLI) that drive several components at once. Inside the
//! guidance session none of these are fatal: failures are logged and the
//! session keeps running with the affected feature disabled.

use thiserror::Error;

use crate::config::ConfigError;
use crate::feed::FeedError;
use crate::geo::GeoError;
use crate::peripheral::PeripheralError;
use crate::provider::ProviderError;

/// Any error surfaced by the wayrelay library.
#[derive(Debug, Error)]
pub enum GuidanceError {
    /// A position fix or coordinate argument was malformed.
    #[error("invalid fix: {0}")]
    InvalidFix(#[from] GeoError),

    /// Routing or geocoding failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The serial peripheral could not be used.
    #[error(transparent)]
    Peripheral(#[from] PeripheralError),

    /// Configuration could not be loaded or saved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The position feed failed.
    #[error(transparent)]
    Feed(#[from] FeedError),

    /// Logging could not be initialized.
    #[error("logging setup failed: {0}")]
    Logging(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wraps_component_errors() {
        let err: GuidanceError = ProviderError::NoRoute("no path".to_string()).into();
        assert!(matches!(err, GuidanceError::Provider(_)));
        assert!(err.to_string().contains("no path"));

        let err: GuidanceError = GeoError::InvalidLatitude(91.0).into();
        assert!(err.to_string().starts_with("invalid fix"));
    }
}
