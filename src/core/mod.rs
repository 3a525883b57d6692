//! Core flashing logic
//!
//! External commands are never spawned here directly; everything goes through
//! [`crate::infra::process::CommandRunner`].
//!
//! # Submodules
//!
//! - [`registry`] - Device profiles and the device table
//! - [`partition`] - Partition roles and image classification
//! - [`package`] - Firmware package decomposition
//! - [`plan`] - Flash plan building
//! - [`backend`] - fastboot and heimdall command vocabularies
//! - [`detect`] - Attached device detection
//! - [`orchestrator`] - The flash state machine
//! - [`report`] - Run reports
//! - [`settings`] - User settings and per-run configuration

pub mod backend;
pub mod detect;
pub mod orchestrator;
pub mod package;
pub mod partition;
pub mod plan;
pub mod registry;
pub mod report;
pub mod settings;
