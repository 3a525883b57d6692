//! `romflash --list-devices`

use anyhow::{Context, Result};

use crate::cli::output::format_device_table;
use crate::core::registry::{DeviceProfile, DeviceRegistry};

/// Print every known device
pub fn execute(registry: &DeviceRegistry, json: bool) -> Result<()> {
    if json {
        let profiles: Vec<&DeviceProfile> = registry.list_all().collect();
        let text =
            serde_json::to_string_pretty(&profiles).context("Failed to serialize device table")?;
        println!("{text}");
        return Ok(());
    }

    print!("{}", format_device_table(registry.list_all()));
    Ok(())
}
