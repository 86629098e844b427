//! CLI error type.

use std::fmt;

use wayrelay::config::ConfigError;
use wayrelay::peripheral::PeripheralError;
use wayrelay::provider::ProviderError;
use wayrelay::GuidanceError;

/// Errors reported to the user before exiting with status 1.
#[derive(Debug)]
pub enum CliError {
    /// Bad arguments or configuration.
    Config(String),
    /// A library operation failed.
    Guidance(GuidanceError),
    /// Local I/O (fix files, runtime setup).
    Io(std::io::Error),
    /// An interactive prompt failed or was aborted.
    Prompt(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Guidance(e) => write!(f, "{}", e),
            CliError::Io(e) => write!(f, "I/O error: {}", e),
            CliError::Prompt(msg) => write!(f, "Prompt failed: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Guidance(e) => Some(e),
            CliError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GuidanceError> for CliError {
    fn from(e: GuidanceError) -> Self {
        CliError::Guidance(e)
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Guidance(e.into())
    }
}

impl From<ProviderError> for CliError {
    fn from(e: ProviderError) -> Self {
        CliError::Guidance(e.into())
    }
}

impl From<PeripheralError> for CliError {
    fn from(e: PeripheralError) -> Self {
        CliError::Guidance(e.into())
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e)
    }
}

impl From<dialoguer::Error> for CliError {
    fn from(e: dialoguer::Error) -> Self {
        CliError::Prompt(e.to_string())
    }
}
