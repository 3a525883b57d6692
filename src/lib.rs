//! romflash - flash Android firmware onto phones over their bootloader protocol
//!
//! Given a firmware file and a device codename (or an attached device), the
//! library picks the device's flashing protocol, splits the firmware into
//! partition images, builds an ordered plan and runs it through fastboot or
//! heimdall, stopping at the first failure.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Device registry, package decomposition, planning and orchestration
//! - [`infra`] - Infrastructure layer (processes, tool lookup, archives, logging)
//! - [`config`] - Default constants and the built-in device table
//! - [`error`] - Error types and handling

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;

#[cfg(test)]
pub mod test_utils;
