//! Argument types shared across commands.

use clap::ValueEnum;
use wayrelay::config::ConfigFile;
use wayrelay::TravelMode;

/// Travel mode selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ModeArg {
    /// Car routing
    Driving,
    /// Pedestrian routing
    Walking,
}

impl From<ModeArg> for TravelMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Driving => TravelMode::Driving,
            ModeArg::Walking => TravelMode::Walking,
        }
    }
}

/// CLI takes precedence, then config.
pub fn resolve_mode(cli_mode: Option<ModeArg>, config: &ConfigFile) -> TravelMode {
    cli_mode.map(TravelMode::from).unwrap_or(config.routing.mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_mode_precedence() {
        let mut config = ConfigFile::default();
        config.routing.mode = TravelMode::Walking;

        assert_eq!(resolve_mode(None, &config), TravelMode::Walking);
        assert_eq!(
            resolve_mode(Some(ModeArg::Driving), &config),
            TravelMode::Driving
        );
    }
}
