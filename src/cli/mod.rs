//! Command-line interface module
//!
//! This module handles argument parsing and output formatting.
//! It contains no flashing logic - that belongs in the [`crate::core`] module.

pub mod commands;
pub mod output;

use anyhow::{bail, Context as _, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::core::plan::{Slot, SlotPolicy};
use crate::core::registry::DeviceRegistry;
use crate::core::settings::Settings;
use crate::infra::dirs::AppDirs;
use crate::infra::logging;

/// romflash - flash Android firmware onto supported phones
///
/// Picks fastboot or heimdall from the device's profile, splits the firmware
/// into partition images and writes them in order, stopping at the first
/// failure.
#[derive(Parser, Debug)]
#[command(name = "romflash")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Firmware file (.zip, .img or .tar)
    #[arg(required_unless_present_any = ["list_devices", "detect"])]
    pub firmware: Option<PathBuf>,

    /// Device codename; detected from the attached device when omitted
    #[arg(short, long)]
    pub device: Option<String>,

    /// Only talk to the device with this transport serial
    #[arg(short, long)]
    pub serial: Option<String>,

    /// List supported devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Detect the attached device and exit
    #[arg(long)]
    pub detect: bool,

    /// Erase userdata and cache after writing the images
    #[arg(long)]
    pub wipe_data: bool,

    /// Skip the EFS backup on Samsung devices
    #[arg(long)]
    pub no_backup: bool,

    /// A/B slots to write
    #[arg(long, value_enum, default_value_t = SlotArg::Both)]
    pub slot: SlotArg,

    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Output in JSON format for scripting
    #[arg(long)]
    pub json: bool,

    /// Directory for the JSON run report
    #[arg(long, value_name = "DIR")]
    pub report_dir: Option<PathBuf>,

    /// Settings file to use instead of config.toml in the config directory
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// `--slot` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SlotArg {
    /// Same image to both slots
    Both,
    /// Slot A only
    A,
    /// Slot B only
    B,
}

impl From<SlotArg> for SlotPolicy {
    fn from(arg: SlotArg) -> Self {
        match arg {
            SlotArg::Both => Self::Both,
            SlotArg::A => Self::Only(Slot::A),
            SlotArg::B => Self::Only(Slot::B),
        }
    }
}

/// Everything a command needs, loaded once per invocation
pub struct Context {
    /// Application directories
    pub dirs: AppDirs,
    /// User settings
    pub settings: Settings,
    /// Device table
    pub registry: DeviceRegistry,
}

impl Cli {
    /// Execute the CLI command
    ///
    /// Returns whether the command succeeded; errors are setup failures.
    pub async fn run(self) -> Result<bool> {
        let context = self.load_context()?;

        if self.list_devices {
            commands::list::execute(&context.registry, self.json)?;
            return Ok(true);
        }
        if self.detect {
            return commands::detect::execute(&context, self.json).await;
        }

        let Some(firmware) = self.firmware.clone() else {
            bail!("No firmware file given");
        };
        commands::flash::execute(&context, &self, &firmware).await
    }

    fn load_context(&self) -> Result<Context> {
        let dirs = AppDirs::new();

        let settings = match &self.config {
            Some(path) if !path.is_file() => bail!("Config file not found: {}", path.display()),
            Some(path) => Settings::load_from_path(path),
            None => Settings::load(&dirs),
        }
        .context("Failed to load settings")?;

        logging::init(self.verbose, Some(&settings.log_file(&dirs)));

        let devices_file = settings.devices_file(&dirs);
        let registry = DeviceRegistry::load(Some(&devices_file))
            .with_context(|| format!("Failed to load device table {}", devices_file.display()))?;
        tracing::debug!("Loaded {} device profile(s)", registry.len());

        Ok(Context {
            dirs,
            settings,
            registry,
        })
    }
}
