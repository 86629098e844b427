//! Devices command - list candidate peripherals.

use console::style;
use wayrelay::config::ConfigFile;
use wayrelay::peripheral::{DeviceDiscovery, DeviceInfo, DeviceMatcher, PeripheralConfig};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Run the devices command.
pub fn run(pattern: Option<String>, all: bool) -> Result<(), CliError> {
    let runner = CliRunner::new()?;
    let (matcher, devices) = runner.block_on(discover(runner.config(), pattern))?;

    println!("Pattern: {}", matcher.as_str());
    println!();

    let mut shown = 0;
    for device in &devices {
        let matched = matcher.matches(device);
        if !matched && !all {
            continue;
        }
        shown += 1;
        if matched {
            println!("  {} {}", style("●").green(), device.path.display());
        } else {
            println!("  {} {}", style("○").dim(), style(device.path.display()).dim());
        }
    }

    if shown == 0 {
        println!("  (no matching devices)");
    }
    Ok(())
}

/// Lists devices from the configured directory with the effective matcher.
pub async fn discover(
    config: &ConfigFile,
    pattern: Option<String>,
) -> Result<(DeviceMatcher, Vec<DeviceInfo>), CliError> {
    let mut peripheral = PeripheralConfig::from_config_file(config);
    if let Some(pattern) = pattern {
        peripheral = peripheral.with_device_pattern(pattern);
    }
    let matcher = peripheral.matcher()?;
    let devices = peripheral.discovery().discover().await?;
    Ok((matcher, devices))
}
