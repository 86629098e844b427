//! Route command - print the maneuver list for a trip.

use console::style;
use wayrelay::provider::{resolve_destination, RouteProvider, RoutingConfig};
use wayrelay::Route;

use super::common::{resolve_mode, ModeArg};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Run the route command.
pub fn run(from: String, to: String, mode: Option<ModeArg>) -> Result<(), CliError> {
    let runner = CliRunner::new()?;
    runner.log_startup("route");
    let config = runner.config();
    let routing = RoutingConfig::from_config_file(config);
    let mode = resolve_mode(mode, config);

    let route = runner.block_on(async {
        let geocoder = routing.geocoder()?;
        let start = resolve_destination(&geocoder, &from).await?;
        let end = resolve_destination(&geocoder, &to).await?;
        let provider = routing.route_provider()?;
        provider.route(start, end, mode).await
    })?;

    print_route(&route);
    Ok(())
}

fn print_route(route: &Route) {
    println!(
        "{} steps, {:.2} km",
        route.step_count(),
        route.total_distance_km()
    );
    println!();
    for (i, step) in route.steps.iter().enumerate() {
        println!(
            "{:>3}. {}  {}",
            i + 1,
            step.instruction(),
            style(step.location()).dim()
        );
    }
}
