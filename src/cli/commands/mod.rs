//! CLI command implementations
//!
//! Each command is implemented in its own submodule.

pub mod detect;
pub mod flash;
pub mod list;
