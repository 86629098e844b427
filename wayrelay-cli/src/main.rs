//! Wayrelay CLI - Command-line interface
//!
//! Runs turn-by-turn guidance against an OSRM backend and relays each step to
//! a serial peripheral.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use console::style;
use wayrelay::Coordinate;

use commands::common::ModeArg;
use commands::config::ConfigCommands;
use commands::navigate::NavigateArgs;

#[derive(Parser)]
#[command(name = "wayrelay")]
#[command(version = wayrelay::VERSION)]
#[command(about = "Turn-by-turn guidance relayed to a serial peripheral", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow a route and emit guidance as position fixes arrive
    Navigate {
        /// Destination as "lat,lon" or a place name
        #[arg(long)]
        to: String,

        /// Starting position as "lat,lon" (otherwise the first fix is used)
        #[arg(long, value_parser = parse_coordinate)]
        from: Option<Coordinate>,

        /// Travel mode (overrides config)
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Peripheral device name pattern (overrides config)
        #[arg(long)]
        device: Option<String>,

        /// Do not connect a peripheral
        #[arg(long)]
        no_peripheral: bool,

        /// Replay fixes from a file of "lat,lon" lines instead of stdin
        #[arg(long)]
        fixes: Option<PathBuf>,

        /// Delay between replayed fixes in milliseconds
        #[arg(long)]
        pace_ms: Option<u64>,
    },

    /// Print the maneuver list between two places
    Route {
        /// Origin as "lat,lon" or a place name
        #[arg(long)]
        from: String,

        /// Destination as "lat,lon" or a place name
        #[arg(long)]
        to: String,

        /// Travel mode (overrides config)
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },

    /// Resolve a place name to coordinates
    Geocode {
        /// Free-text place query
        query: String,
    },

    /// List candidate serial peripherals
    Devices {
        /// Device name pattern (overrides config)
        #[arg(long)]
        pattern: Option<String>,

        /// Also show devices that do not match the pattern
        #[arg(long)]
        all: bool,
    },

    /// View or modify configuration settings
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Create the configuration file and pick a peripheral
    Init,
}

fn parse_coordinate(value: &str) -> Result<Coordinate, String> {
    value.parse().map_err(|e| format!("{}", e))
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Navigate {
            to,
            from,
            mode,
            device,
            no_peripheral,
            fixes,
            pace_ms,
        } => commands::navigate::run(NavigateArgs {
            from,
            to,
            mode,
            device,
            no_peripheral,
            fixes,
            pace_ms,
        }),
        Commands::Route { from, to, mode } => commands::route::run(from, to, mode),
        Commands::Geocode { query } => commands::geocode::run(query),
        Commands::Devices { pattern, all } => commands::devices::run(pattern, all),
        Commands::Config(command) => commands::config::run(command),
        Commands::Init => commands::init::run(),
    };

    if let Err(e) = result {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_navigate_parses_from_coordinate() {
        let cli = Cli::try_parse_from([
            "wayrelay", "navigate", "--to", "Berlin", "--from", "52.5,13.4", "--no-peripheral",
        ])
        .unwrap();
        match cli.command {
            Commands::Navigate { from, no_peripheral, .. } => {
                assert_eq!(from, Some(Coordinate::new(52.5, 13.4).unwrap()));
                assert!(no_peripheral);
            }
            _ => panic!("expected navigate"),
        }
    }

    #[test]
    fn test_navigate_rejects_bad_coordinate() {
        let result = Cli::try_parse_from(["wayrelay", "navigate", "--to", "x", "--from", "north"]);
        assert!(result.is_err());
    }
}
