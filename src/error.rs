//! Error types for romflash
//!
//! Domain-specific error types using thiserror. Each component returns its
//! own error enum; [`FlashError`] aggregates them for the orchestrator without
//! losing the specific kind.

use std::path::PathBuf;
use thiserror::Error;

use crate::core::registry::Protocol;

/// Device registry errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    /// Codename not present in the registry
    #[error("Device '{codename}' is not supported. Run with --list-devices to see supported devices")]
    NotFound { codename: String },

    /// Device table could not be parsed
    #[error("Failed to parse device table '{source_name}': {error}")]
    ParseError { source_name: String, error: String },

    /// Device table could not be read
    #[error("Failed to read device table '{path}': {error}")]
    ReadError { path: PathBuf, error: String },

    /// A profile violates a registry invariant
    #[error("Invalid profile for '{codename}': {reason}")]
    InvalidProfile { codename: String, reason: String },
}

/// Package decomposition errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecomposeError {
    /// Firmware file does not exist
    #[error("Firmware file not found: {path}")]
    NotFound { path: PathBuf },

    /// Extension outside the supported set
    #[error("Unsupported firmware format '{extension}' for {path} (expected .zip, .img or .tar)")]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// Archive extraction failed
    #[error("Failed to extract '{path}': {error}")]
    ExtractionFailed { path: PathBuf, error: String },
}

/// External command errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    /// The process could not be started
    #[error("Failed to execute '{command}': {error}")]
    Spawn { command: String, error: String },

    /// The process exceeded its time budget and was killed
    #[error("Command '{command}' timed out after {seconds}s")]
    Timeout { command: String, seconds: u64 },
}

/// Tool lookup errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LocateError {
    /// Tool not found on PATH or in any conventional location
    #[error("'{tool}' not found in PATH or in {searched} conventional locations")]
    NotFound { tool: String, searched: usize },
}

/// Settings errors
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Failed to read config file
    #[error("Failed to read config file '{path}': {error}")]
    ReadError { path: String, error: String },

    /// Failed to parse config file
    #[error("Failed to parse config file '{path}': {error}")]
    ParseError { path: String, error: String },
}

/// Terminal failure of a flash run
///
/// Every variant ends the current run. Nothing here is retried automatically.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlashError {
    /// No device identity could be established
    #[error("Could not resolve target device: {reason}")]
    DeviceUnresolved { reason: String },

    /// Protocol has no backend in this tool
    #[error("Flash protocol '{protocol}' is not implemented yet")]
    UnsupportedProtocol { protocol: Protocol },

    /// A transport binary required by the protocol is missing
    #[error("Missing required tool '{tool}' for {protocol}: install it or set [tools] in config.toml")]
    MissingTooling { protocol: Protocol, tool: String },

    /// No device answered on the protocol's enumeration command
    #[error("No device reachable in {mode} mode: {detail}")]
    DeviceUnreachable { mode: String, detail: String },

    /// Bootloader is locked (or its state could not be confirmed)
    #[error("Bootloader of '{codename}' is locked: {detail}")]
    BootloaderLocked { codename: String, detail: String },

    /// Firmware file missing
    #[error("Firmware file not found: {path}")]
    PackageNotFound { path: PathBuf },

    /// Firmware extension outside the supported set
    #[error("Unsupported firmware format '{extension}' for {path}")]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// Archive could not be extracted
    #[error("Failed to extract '{path}': {error}")]
    ExtractionFailed { path: PathBuf, error: String },

    /// Package supplies nothing the profile's partition table recognizes
    #[error("Package provides no image for any partition of '{codename}'")]
    EmptyPlan { codename: String },

    /// A plan step refers to an image that is not on disk
    #[error("Image for partition '{partition}' is missing: {path}")]
    MissingImage { partition: String, path: PathBuf },

    /// Operator declined the confirmation prompt
    #[error("Flash cancelled by operator")]
    Cancelled,

    /// A flash step failed
    #[error("Flashing '{partition}' failed: {message}")]
    StepFailed { partition: String, message: String },

    /// A command exceeded its timeout
    #[error("Command '{command}' timed out after {seconds}s")]
    CommandTimeout { command: String, seconds: u64 },
}

impl FlashError {
    /// Stable name of the error kind, used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DeviceUnresolved { .. } => "DeviceUnresolved",
            Self::UnsupportedProtocol { .. } => "UnsupportedProtocol",
            Self::MissingTooling { .. } => "MissingTooling",
            Self::DeviceUnreachable { .. } => "DeviceUnreachable",
            Self::BootloaderLocked { .. } => "BootloaderLocked",
            Self::PackageNotFound { .. } => "PackageNotFound",
            Self::UnsupportedFormat { .. } => "UnsupportedFormat",
            Self::ExtractionFailed { .. } => "ExtractionFailed",
            Self::EmptyPlan { .. } => "EmptyPlan",
            Self::MissingImage { .. } => "MissingImage",
            Self::Cancelled => "Cancelled",
            Self::StepFailed { .. } => "StepFailed",
            Self::CommandTimeout { .. } => "CommandTimeout",
        }
    }
}

impl From<DecomposeError> for FlashError {
    fn from(error: DecomposeError) -> Self {
        match error {
            DecomposeError::NotFound { path } => Self::PackageNotFound { path },
            DecomposeError::UnsupportedFormat { path, extension } => {
                Self::UnsupportedFormat { path, extension }
            }
            DecomposeError::ExtractionFailed { path, error } => {
                Self::ExtractionFailed { path, error }
            }
        }
    }
}

impl From<RegistryError> for FlashError {
    fn from(error: RegistryError) -> Self {
        Self::DeviceUnresolved {
            reason: error.to_string(),
        }
    }
}

/// Filesystem errors
#[derive(Error, Debug)]
pub enum FilesystemError {
    /// Failed to create directory
    #[error("Failed to create directory '{path}': {error}")]
    CreateDir { path: PathBuf, error: String },

    /// Failed to write file
    #[error("Failed to write file '{path}': {error}")]
    WriteFile { path: PathBuf, error: String },
}
