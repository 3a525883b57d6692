//! Platform-specific directory management
//!
//! Provides platform-specific paths for config and data directories.
//! Follows XDG Base Directory Specification on Linux and standard locations on macOS.
//!
//! Environment variables can override default directories:
//! - `ROMFLASH_CONFIG_DIR` - Override config directory
//! - `ROMFLASH_DATA_DIR` - Override data directory (reports and command log)

use std::env;
use std::path::PathBuf;

use crate::config::defaults::{LOG_FILE_NAME, REPORTS_SUBDIR};

/// Environment variable names for directory overrides
pub const ENV_CONFIG_DIR: &str = "ROMFLASH_CONFIG_DIR";
pub const ENV_DATA_DIR: &str = "ROMFLASH_DATA_DIR";

/// Application name used in directory paths
const APP_NAME: &str = "romflash";

/// Platform-specific directory provider
#[derive(Debug, Clone)]
pub struct AppDirs {
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl AppDirs {
    /// Create a new `AppDirs` instance
    ///
    /// Checks environment variables first, then falls back to platform defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config_dir: Self::resolve(ENV_CONFIG_DIR, dirs::config_dir(), ".config"),
            data_dir: Self::resolve(ENV_DATA_DIR, dirs::data_dir(), ".local/share"),
        }
    }

    /// Directories rooted at explicit paths
    #[must_use]
    pub fn with_roots(config_dir: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            config_dir,
            data_dir,
        }
    }

    /// Get the config directory path
    ///
    /// - Linux: `$XDG_CONFIG_HOME/romflash` or `~/.config/romflash`
    /// - macOS: `~/Library/Application Support/romflash`
    #[must_use]
    pub fn config_dir(&self) -> PathBuf {
        self.config_dir.clone()
    }

    /// Get the data directory path
    ///
    /// - Linux: `$XDG_DATA_HOME/romflash` or `~/.local/share/romflash`
    /// - macOS: `~/Library/Application Support/romflash`
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone()
    }

    /// `config.toml` in the config directory
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// User device table in the config directory
    #[must_use]
    pub fn devices_path(&self) -> PathBuf {
        self.config_dir.join("devices.toml")
    }

    /// Default report directory
    #[must_use]
    pub fn reports_dir(&self) -> PathBuf {
        self.data_dir.join(REPORTS_SUBDIR)
    }

    /// Default command log file
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(LOG_FILE_NAME)
    }

    fn resolve(env_var: &str, platform: Option<PathBuf>, home_fallback: &str) -> PathBuf {
        if let Ok(path) = env::var(env_var) {
            return PathBuf::from(path);
        }

        platform.map(|p| p.join(APP_NAME)).unwrap_or_else(|| {
            dirs::home_dir()
                .map(|h| h.join(home_fallback).join(APP_NAME))
                .unwrap_or_else(|| PathBuf::from(".").join(home_fallback).join(APP_NAME))
        })
    }
}

impl Default for AppDirs {
    fn default() -> Self {
        Self::new()
    }
}
