//! Init command - write the configuration file and pick a peripheral.

use console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Select};
use wayrelay::config::{config_file_path, ConfigFile};
use wayrelay::peripheral::{DeviceInfo, DeviceMatcher};

use super::devices::discover;
use crate::error::CliError;

/// Run the init command.
pub fn run() -> Result<(), CliError> {
    let mut config = ConfigFile::load().unwrap_or_default();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let devices = match runtime.block_on(discover(&config, None)) {
        Ok((matcher, devices)) => devices
            .into_iter()
            .filter(|d| matcher.matches(d))
            .collect(),
        Err(e) => {
            println!("{} {}", style("Device discovery failed:").yellow(), e);
            Vec::new()
        }
    };

    let theme = ColorfulTheme::default();
    match devices.len() {
        0 => {
            println!("No serial peripherals detected.");
            println!("Pair the device and set peripheral.device_pattern later if needed.");
            println!();
        }
        _ => {
            if let Some(device) = prompt_device(&theme, &devices)? {
                config.peripheral.device_pattern = DeviceMatcher::exact(&device.name).as_str().to_string();
                config.peripheral.enabled = true;
                println!("Selected: {}", device.path.display());
                println!();
            }
        }
    }

    let path = config_file_path();
    if path.exists()
        && !Confirm::with_theme(&theme)
            .with_prompt(format!("Overwrite {}?", path.display()))
            .default(false)
            .interact()?
    {
        println!("Configuration unchanged.");
        return Ok(());
    }

    config.save()?;
    println!("Configuration file: {}", path.display());
    println!();
    println!("Edit this file or use 'wayrelay config set' to customize settings.");
    println!("CLI arguments override config file values when specified.");
    Ok(())
}

fn prompt_device(theme: &ColorfulTheme, devices: &[DeviceInfo]) -> Result<Option<DeviceInfo>, CliError> {
    let mut items: Vec<String> = devices
        .iter()
        .map(|d| d.path.display().to_string())
        .collect();
    items.push("Skip (keep current pattern)".to_string());

    let choice = Select::with_theme(theme)
        .with_prompt("Select the guidance peripheral")
        .items(&items)
        .default(0)
        .interact_opt()?;

    Ok(choice.and_then(|i| devices.get(i).cloned()))
}
