//! Output formatting and progress indicators
//!
//! Spinners, status prefixes and the human-readable rendering of device
//! lists, detection results and flash reports.

use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::core::detect::DetectedDevice;
use crate::core::registry::DeviceProfile;
use crate::core::report::{BackupOutcome, FlashReport, RebootOutcome};

/// Create a spinner for operations with unknown duration
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner:.blue} {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Status message prefixes
pub mod status {
    /// Success prefix (green checkmark)
    pub const SUCCESS: &str = "✓";

    /// Error prefix (red X)
    pub const ERROR: &str = "✗";

    /// Warning prefix (yellow triangle)
    pub const WARNING: &str = "⚠";

    /// Info prefix (blue circle)
    pub const INFO: &str = "ℹ";
}

/// Table of known devices
pub fn format_device_table<'a>(profiles: impl IntoIterator<Item = &'a DeviceProfile>) -> String {
    let mut out = format!(
        "{:<12} {:<28} {:<14} {}\n",
        "CODENAME", "DEVICE", "PROTOCOL", "A/B"
    );
    for p in profiles {
        let _ = writeln!(
            out,
            "{:<12} {:<28} {:<14} {}",
            p.codename,
            p.display_name(),
            p.protocol.as_str(),
            if p.supports_ab { "yes" } else { "no" }
        );
    }
    out
}

/// One-line detection result
pub fn format_detected(device: &DetectedDevice, known: bool) -> String {
    let suffix = if known {
        String::new()
    } else {
        " (not in the device table)".to_string()
    };
    format!(
        "{} {} ({} via {}){suffix}",
        status::SUCCESS,
        device.codename,
        device.serial,
        device.transport
    )
}

/// Operator-facing instructions for a device
pub fn format_instructions(profile: &DeviceProfile) -> String {
    let mut out = format!(
        "{} {} - put the device in {} mode\n",
        status::INFO,
        profile.display_name(),
        profile.bootloader_mode
    );
    if let Some(keys) = &profile.key_combination {
        let _ = writeln!(out, "   Key combination: {keys}");
    }
    for line in &profile.special_instructions {
        let _ = writeln!(out, "   {} {line}", status::WARNING);
    }
    out
}

/// Summary of a finished run
pub fn format_report(report: &FlashReport, report_path: Option<&Path>) -> String {
    let mut out = String::new();

    for step in &report.steps {
        let prefix = if step.success {
            status::SUCCESS
        } else {
            status::ERROR
        };
        let elapsed = Duration::from_millis(step.elapsed_ms);
        let _ = writeln!(out, "{prefix} {} ({elapsed:?})", step.partition);
    }

    match &report.backup {
        Some(BackupOutcome::Saved { path, bytes }) => {
            let _ = writeln!(
                out,
                "{} EFS backup: {} ({bytes} bytes)",
                status::INFO,
                path.display()
            );
        }
        Some(BackupOutcome::Skipped { reason }) => {
            let _ = writeln!(out, "{} EFS backup skipped: {reason}", status::WARNING);
        }
        Some(BackupOutcome::Failed { message }) => {
            let _ = writeln!(out, "{} EFS backup failed: {message}", status::WARNING);
        }
        None => {}
    }

    if let Some(RebootOutcome::Failed { message }) = &report.reboot {
        let _ = writeln!(
            out,
            "{} Reboot failed, reboot the device manually: {message}",
            status::WARNING
        );
    }

    for note in &report.notes {
        let _ = writeln!(out, "{} {note}", status::WARNING);
    }

    match &report.failure {
        None => {
            let _ = writeln!(out, "{} Flash completed", status::SUCCESS);
        }
        Some(failure) => {
            let _ = writeln!(
                out,
                "{} Flash failed [{}]: {}",
                status::ERROR,
                failure.kind,
                failure.message
            );
        }
    }

    if let Some(path) = report_path {
        let _ = writeln!(out, "{} Report: {}", status::INFO, path.display());
    }
    out
}

/// Print an error with its cause chain
pub fn display_error(error: &anyhow::Error) {
    eprintln!("{} {error}", status::ERROR);
    for cause in error.chain().skip(1) {
        eprintln!("  caused by: {cause}");
    }
}
