//! Geocode command - resolve a place name to coordinates.

use wayrelay::provider::{Geocoder, RoutingConfig};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Run the geocode command.
pub fn run(query: String) -> Result<(), CliError> {
    let runner = CliRunner::new()?;
    runner.log_startup("geocode");
    let routing = RoutingConfig::from_config_file(runner.config());

    let coordinate = runner.block_on(async {
        let geocoder = routing.geocoder()?;
        geocoder.geocode(&query).await
    })?;

    println!("{}", coordinate);
    Ok(())
}
