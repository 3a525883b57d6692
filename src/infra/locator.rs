//! Transport tool location
//!
//! Finds adb, fastboot and heimdall on the host. Only existence is checked;
//! a broken binary shows up on its first real invocation.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::defaults::{CONVENTIONAL_TOOL_DIRS, HOME_PLATFORM_TOOLS};
use crate::error::LocateError;

/// Transport binaries this tool can drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    /// Android debug bridge
    Adb,
    /// Fastboot bootloader client
    Fastboot,
    /// Heimdall download-mode client
    Heimdall,
}

impl Tool {
    /// All known tools
    pub const ALL: [Tool; 3] = [Self::Adb, Self::Fastboot, Self::Heimdall];

    /// Executable base name without platform suffix
    pub fn binary_name(self) -> &'static str {
        match self {
            Self::Adb => "adb",
            Self::Fastboot => "fastboot",
            Self::Heimdall => "heimdall",
        }
    }

    /// Executable file name on the current platform
    fn file_name(self) -> String {
        if cfg!(windows) {
            format!("{}.exe", self.binary_name())
        } else {
            self.binary_name().to_string()
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary_name())
    }
}

/// Resolves tool names to executable paths
#[derive(Debug, Clone, Default)]
pub struct ToolLocator {
    overrides: BTreeMap<Tool, PathBuf>,
    search_dirs: Vec<PathBuf>,
    use_path: bool,
}

impl ToolLocator {
    /// Locator over PATH and the conventional install locations
    pub fn new() -> Self {
        let mut search_dirs: Vec<PathBuf> =
            CONVENTIONAL_TOOL_DIRS.iter().map(PathBuf::from).collect();
        if let Some(home) = dirs::home_dir() {
            search_dirs.push(home.join(HOME_PLATFORM_TOOLS));
        }
        Self {
            overrides: BTreeMap::new(),
            search_dirs,
            use_path: true,
        }
    }

    /// Locator that searches only the given directories, not PATH
    pub fn isolated(search_dirs: Vec<PathBuf>) -> Self {
        Self {
            overrides: BTreeMap::new(),
            search_dirs,
            use_path: false,
        }
    }

    /// Pin a tool to an explicit path
    #[must_use]
    pub fn with_override(mut self, tool: Tool, path: PathBuf) -> Self {
        self.overrides.insert(tool, path);
        self
    }

    /// Search additional directories before the conventional ones
    #[must_use]
    pub fn with_search_dirs(mut self, dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut extra: Vec<PathBuf> = dirs.into_iter().collect();
        extra.append(&mut self.search_dirs);
        self.search_dirs = extra;
        self
    }

    /// Find the best match for `tool`
    pub fn locate(&self, tool: Tool) -> Result<PathBuf, LocateError> {
        if let Some(path) = self.overrides.get(&tool) {
            if path.is_file() {
                return Ok(path.clone());
            }
            tracing::warn!(
                "Configured path for {} does not exist: {}",
                tool,
                path.display()
            );
        }

        if self.use_path {
            if let Ok(path) = which::which(tool.binary_name()) {
                return Ok(path);
            }
        }

        let file_name = tool.file_name();
        self.search_dirs
            .iter()
            .map(|dir| dir.join(&file_name))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| LocateError::NotFound {
                tool: tool.binary_name().to_string(),
                searched: self.search_dirs.len(),
            })
    }
}

/// Tool paths resolved once for a single run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Toolset {
    paths: BTreeMap<Tool, PathBuf>,
}

impl Toolset {
    /// Resolve every known tool; missing tools are simply absent
    pub fn resolve(locator: &ToolLocator) -> Self {
        let mut paths = BTreeMap::new();
        for tool in Tool::ALL {
            match locator.locate(tool) {
                Ok(path) => {
                    tracing::debug!("Found {} at {}", tool, path.display());
                    paths.insert(tool, path);
                }
                Err(e) => tracing::debug!("{e}"),
            }
        }
        Self { paths }
    }

    /// Toolset with explicit paths, used by tests and callers with fixed installs
    pub fn from_paths(paths: impl IntoIterator<Item = (Tool, PathBuf)>) -> Self {
        Self {
            paths: paths.into_iter().collect(),
        }
    }

    /// Path of `tool`, if found
    pub fn get(&self, tool: Tool) -> Option<&Path> {
        self.paths.get(&tool).map(PathBuf::as_path)
    }

    /// Iterate over found tools
    pub fn iter(&self) -> impl Iterator<Item = (Tool, &Path)> {
        self.paths.iter().map(|(tool, path)| (*tool, path.as_path()))
    }
}
