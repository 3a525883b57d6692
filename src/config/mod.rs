//! Configuration constants and the built-in device table

pub mod defaults;

/// Built-in device table, parsed by [`crate::core::registry::DeviceRegistry::builtin`]
pub const BUILTIN_DEVICES: &str = include_str!("devices.toml");
