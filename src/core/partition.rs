//! Partition image roles
//!
//! The closed set of image roles a firmware package can bind, and the single
//! function that maps a file name onto a role.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Role an image plays on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionRole {
    /// Kernel and ramdisk
    Boot,
    /// Recovery environment
    Recovery,
    /// System image
    System,
    /// Vendor image
    Vendor,
    /// User data
    Userdata,
    /// Cache
    Cache,
}

impl PartitionRole {
    /// Every role, in canonical order
    pub const ALL: [PartitionRole; 6] = [
        Self::Boot,
        Self::Recovery,
        Self::System,
        Self::Vendor,
        Self::Userdata,
        Self::Cache,
    ];

    /// Lowercase name, also the expected image base name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Boot => "boot",
            Self::Recovery => "recovery",
            Self::System => "system",
            Self::Vendor => "vendor",
            Self::Userdata => "userdata",
            Self::Cache => "cache",
        }
    }

    /// Whether `--wipe-data` may erase a partition of this role
    pub fn is_wipeable(self) -> bool {
        matches!(self, Self::Userdata | Self::Cache)
    }
}

impl fmt::Display for PartitionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PartitionRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown partition role '{s}'"))
    }
}

/// Classify an image file by its name
///
/// The extension must be `.img` and the base name must equal a role name,
/// both compared case-insensitively. `BOOT.IMG` is boot, `boot-debug.img` is
/// nothing.
pub fn classify(file_name: &Path) -> Option<PartitionRole> {
    let extension = file_name.extension()?.to_str()?;
    if !extension.eq_ignore_ascii_case("img") {
        return None;
    }
    let stem = file_name.file_stem()?.to_str()?;
    stem.parse().ok()
}
