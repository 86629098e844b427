//! `config` subcommands: inspect and edit `~/.wayrelay/config.ini`.

use clap::Subcommand;
use console::style;
use wayrelay::config::{config_file_path, ConfigFile, ConfigKey};

use crate::error::CliError;

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print one setting (e.g. guidance.step_threshold_m)
    Get { key: String },

    /// Change one setting and save the file
    Set { key: String, value: String },

    /// Print every setting; changed values are marked with '*'
    List,

    /// Print the location of the config file
    Path,
}

pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Get { key } => {
            let key = lookup(&key)?;
            let config = ConfigFile::load()?;
            println!("{}", display_value(&key.get(&config)));
        }
        ConfigCommands::Set { key, value } => {
            let key = lookup(&key)?;
            // Editing must work even when the current file does not parse.
            let mut config = ConfigFile::load().unwrap_or_default();
            key.set(&mut config, &value)?;
            config.save()?;
            println!("{} = {}", key, display_value(&key.get(&config)));
        }
        ConfigCommands::List => list(&ConfigFile::load()?),
        ConfigCommands::Path => println!("{}", config_file_path().display()),
    }
    Ok(())
}

fn lookup(name: &str) -> Result<ConfigKey, CliError> {
    name.parse().map_err(|_| {
        CliError::Config(format!(
            "no setting named '{}' (see 'wayrelay config list')",
            name
        ))
    })
}

fn display_value(value: &str) -> &str {
    if value.is_empty() {
        "(unset)"
    } else {
        value
    }
}

fn list(config: &ConfigFile) {
    let defaults = ConfigFile::default();
    let width = ConfigKey::all()
        .iter()
        .map(|k| k.name().len())
        .max()
        .unwrap_or(0);

    for key in ConfigKey::all() {
        let value = key.get(config);
        let changed = value != key.get(&defaults);
        let marker = if changed { "*" } else { " " };
        let line = format!("{} {:<width$} = {}", marker, key.name(), display_value(&value));
        if changed {
            println!("{}", style(line).bold());
        } else {
            println!("{}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_reports_unknown_key() {
        let err = lookup("guidance.nope").unwrap_err();
        assert!(err.to_string().contains("wayrelay config list"));
        assert_eq!(
            lookup("feed.min_interval_ms").unwrap(),
            ConfigKey::FeedMinIntervalMs
        );
    }

    #[test]
    fn test_display_value_for_unset() {
        assert_eq!(display_value(""), "(unset)");
        assert_eq!(display_value("info"), "info");
    }
}
