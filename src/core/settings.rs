//! Settings and per-run configuration
//!
//! [`Settings`] is read from `config.toml` in the config directory. A
//! [`RunConfig`] is derived from it once per flash run and passed explicitly
//! to every component; nothing is cached process-wide.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::defaults;
use crate::error::SettingsError;
use crate::infra::dirs::AppDirs;
use crate::infra::locator::{Tool, ToolLocator, Toolset};

/// User settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Command timeouts
    #[serde(default)]
    pub timeouts: TimeoutSettings,

    /// Tool locations
    #[serde(default)]
    pub tools: ToolSettings,

    /// Device table location
    #[serde(default)]
    pub registry: RegistrySettings,

    /// Report and log locations
    #[serde(default)]
    pub output: OutputSettings,
}

/// Timeout overrides, in seconds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeoutSettings {
    /// Single-partition write
    pub flash_step: Option<u64>,
    /// Multi-partition vendor call
    pub multi_partition: Option<u64>,
    /// Read-only probes
    pub probe: Option<u64>,
    /// Final reboot
    pub reboot: Option<u64>,
    /// EFS backup pull
    pub backup: Option<u64>,
}

/// Tool path overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolSettings {
    /// Explicit adb path
    pub adb: Option<PathBuf>,
    /// Explicit fastboot path
    pub fastboot: Option<PathBuf>,
    /// Explicit heimdall path
    pub heimdall: Option<PathBuf>,
    /// Extra directories searched before the conventional ones
    #[serde(default)]
    pub search_dirs: Vec<PathBuf>,
}

/// Device table settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrySettings {
    /// User device table; defaults to `devices.toml` in the config directory
    pub devices_file: Option<PathBuf>,
}

/// Output settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Directory for JSON run reports
    pub report_dir: Option<PathBuf>,
    /// Command log file
    pub log_file: Option<PathBuf>,
}

impl Settings {
    /// Load settings from the config directory
    ///
    /// A missing file yields defaults; an unreadable or invalid file is an error.
    pub fn load(dirs: &AppDirs) -> Result<Self, SettingsError> {
        Self::load_from_path(&dirs.config_path())
    }

    /// Load settings from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| SettingsError::ReadError {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| SettingsError::ParseError {
            path: path.display().to_string(),
            error: e.to_string(),
        })
    }

    /// Effective timeouts
    #[must_use]
    pub fn timeouts(&self) -> Timeouts {
        let t = &self.timeouts;
        let secs = |value: Option<u64>, default: u64| Duration::from_secs(value.unwrap_or(default));
        Timeouts {
            flash_step: secs(t.flash_step, defaults::FLASH_STEP_TIMEOUT_SECS),
            multi_partition: secs(t.multi_partition, defaults::MULTI_PARTITION_TIMEOUT_SECS),
            probe: secs(t.probe, defaults::PROBE_TIMEOUT_SECS),
            reboot: secs(t.reboot, defaults::REBOOT_TIMEOUT_SECS),
            backup: secs(t.backup, defaults::BACKUP_TIMEOUT_SECS),
        }
    }

    /// Tool locator honouring the `[tools]` section
    #[must_use]
    pub fn locator(&self) -> ToolLocator {
        let mut locator = ToolLocator::new().with_search_dirs(self.tools.search_dirs.clone());
        for (tool, path) in [
            (Tool::Adb, &self.tools.adb),
            (Tool::Fastboot, &self.tools.fastboot),
            (Tool::Heimdall, &self.tools.heimdall),
        ] {
            if let Some(path) = path {
                locator = locator.with_override(tool, path.clone());
            }
        }
        locator
    }

    /// Effective user device table path
    #[must_use]
    pub fn devices_file(&self, dirs: &AppDirs) -> PathBuf {
        self.registry
            .devices_file
            .clone()
            .unwrap_or_else(|| dirs.devices_path())
    }

    /// Effective report directory
    #[must_use]
    pub fn report_dir(&self, dirs: &AppDirs) -> PathBuf {
        self.output
            .report_dir
            .clone()
            .unwrap_or_else(|| dirs.reports_dir())
    }

    /// Effective command log path
    #[must_use]
    pub fn log_file(&self, dirs: &AppDirs) -> PathBuf {
        self.output
            .log_file
            .clone()
            .unwrap_or_else(|| dirs.log_path())
    }
}

/// Resolved command timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Single-partition write
    pub flash_step: Duration,
    /// Multi-partition vendor call
    pub multi_partition: Duration,
    /// Read-only probes
    pub probe: Duration,
    /// Final reboot
    pub reboot: Duration,
    /// EFS backup pull
    pub backup: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Settings::default().timeouts()
    }
}

/// Configuration for a single flash run
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Command timeouts
    pub timeouts: Timeouts,
    /// Tools found for this run
    pub tools: Toolset,
    /// Where backups are written
    pub backup_dir: PathBuf,
}

impl RunConfig {
    /// Resolve tools and timeouts for a new run
    pub fn from_settings(settings: &Settings, dirs: &AppDirs) -> Self {
        Self {
            timeouts: settings.timeouts(),
            tools: Toolset::resolve(&settings.locator()),
            backup_dir: settings.report_dir(dirs),
        }
    }

    /// Run configuration with explicit tools and default timeouts
    pub fn with_tools(tools: Toolset, backup_dir: PathBuf) -> Self {
        Self {
            timeouts: Timeouts::default(),
            tools,
            backup_dir,
        }
    }
}
