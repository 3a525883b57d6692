//! Infrastructure layer
//!
//! Handles all I/O: external processes, tool lookup, archive extraction,
//! filesystem writes and logging.

pub mod archive;
pub mod dirs;
pub mod filesystem;
pub mod locator;
pub mod logging;
pub mod process;
