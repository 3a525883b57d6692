//! `romflash --detect`

use anyhow::{Context as _, Result};

use crate::cli::output::{create_spinner, format_detected, status};
use crate::cli::Context;
use crate::core::detect::DeviceDetector;
use crate::infra::locator::Toolset;
use crate::infra::process::SystemRunner;

/// Identify the attached device; `false` when nothing answered
pub async fn execute(context: &Context, json: bool) -> Result<bool> {
    let timeouts = context.settings.timeouts();
    let tools = Toolset::resolve(&context.settings.locator());
    let runner = SystemRunner;

    let spinner = (!json).then(|| create_spinner("Detecting device..."));
    let detected = DeviceDetector::new(&runner, &tools, timeouts.probe)
        .detect()
        .await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    if json {
        let value = serde_json::json!({
            "device": detected,
            "known": detected
                .as_ref()
                .is_some_and(|d| context.registry.contains(&d.codename)),
        });
        let text = serde_json::to_string_pretty(&value).context("Failed to serialize result")?;
        println!("{text}");
        return Ok(detected.is_some());
    }

    match detected {
        Some(device) => {
            let known = context.registry.contains(&device.codename);
            println!("{}", format_detected(&device, known));
            Ok(true)
        }
        None => {
            eprintln!(
                "{} No device detected. Check the cable and that USB debugging or bootloader mode is enabled.",
                status::ERROR
            );
            Ok(false)
        }
    }
}
