//! Device registry
//!
//! Static mapping from device codename to its flashing profile. The table is
//! parsed once at startup from the built-in `devices.toml` plus an optional
//! user table, and never changes afterwards.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

use super::partition::PartitionRole;
use crate::error::RegistryError;

/// Low-level flashing protocol a device speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Protocol {
    /// Fastboot-style per-partition writes
    DirectFlash,
    /// Samsung download mode (Heimdall)
    DownloadMode,
    /// Proprietary vendor tool (Odin, SP Flash Tool)
    VendorTool,
    /// Recovery sideload over adb
    Sideload,
}

impl Protocol {
    /// Kebab-case name as used in device tables
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DirectFlash => "direct-flash",
            Self::DownloadMode => "download-mode",
            Self::VendorTool => "vendor-tool",
            Self::Sideload => "sideload",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mode the device must be booted into before flashing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BootloaderMode {
    /// Fastboot / bootloader mode
    Fastboot,
    /// Samsung download mode
    Download,
    /// Recovery mode
    Recovery,
}

impl fmt::Display for BootloaderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fastboot => "fastboot",
            Self::Download => "download",
            Self::Recovery => "recovery",
        })
    }
}

/// One entry of a device's partition table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionEntry {
    /// Partition name as the backend expects it
    pub name: String,
    /// Image role written to this partition
    pub role: PartitionRole,
}

/// Flashing profile of one device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Unique device codename
    pub codename: String,

    /// Manufacturer
    pub manufacturer: String,

    /// Marketing model name
    pub model: String,

    /// Flashing protocol
    pub protocol: Protocol,

    /// Mode the device must be in
    pub bootloader_mode: BootloaderMode,

    /// Button combination to enter the bootloader mode
    #[serde(default)]
    pub key_combination: Option<String>,

    /// Ordered partition table
    pub partitions: Vec<PartitionEntry>,

    /// A/B slot scheme
    #[serde(default)]
    pub supports_ab: bool,

    /// Bootloader must be unlocked before flashing
    #[serde(default)]
    pub requires_unlock: bool,

    /// Operator instructions shown before any destructive step
    #[serde(default)]
    pub special_instructions: Vec<String>,
}

impl DeviceProfile {
    /// Human-readable `manufacturer model`
    pub fn display_name(&self) -> String {
        format!("{} {}", self.manufacturer, self.model)
    }

    fn validate(&self) -> Result<(), RegistryError> {
        let invalid = |reason: &str| RegistryError::InvalidProfile {
            codename: self.codename.clone(),
            reason: reason.to_string(),
        };

        if self.codename.trim().is_empty() {
            return Err(invalid("codename is empty"));
        }
        if self.partitions.is_empty() {
            return Err(invalid("partition table is empty"));
        }

        let mut seen = HashSet::new();
        for entry in &self.partitions {
            if !seen.insert(entry.name.to_ascii_lowercase()) {
                return Err(invalid(&format!("duplicate partition '{}'", entry.name)));
            }
        }
        Ok(())
    }
}

/// On-disk shape of a device table
#[derive(Debug, Default, Deserialize)]
struct DeviceTable {
    #[serde(default)]
    device: Vec<DeviceProfile>,
}

/// Read-only device registry
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    profiles: BTreeMap<String, DeviceProfile>,
}

impl DeviceRegistry {
    /// Registry holding only the built-in device table
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::from_toml(crate::config::BUILTIN_DEVICES, "built-in")
    }

    /// Built-in table overlaid with the user table at `user_table`, if present
    pub fn load(user_table: Option<&Path>) -> Result<Self, RegistryError> {
        let mut registry = Self::builtin()?;

        if let Some(path) = user_table.filter(|p| p.exists()) {
            let content =
                std::fs::read_to_string(path).map_err(|e| RegistryError::ReadError {
                    path: path.to_path_buf(),
                    error: e.to_string(),
                })?;
            let overlay = Self::from_toml(&content, &path.display().to_string())?;
            tracing::debug!(
                "Loaded {} device profile(s) from {}",
                overlay.len(),
                path.display()
            );
            registry.profiles.extend(overlay.profiles);
        }

        Ok(registry)
    }

    /// Parse a device table
    pub fn from_toml(content: &str, source_name: &str) -> Result<Self, RegistryError> {
        let table: DeviceTable =
            toml::from_str(content).map_err(|e| RegistryError::ParseError {
                source_name: source_name.to_string(),
                error: e.to_string(),
            })?;
        Self::from_profiles(table.device)
    }

    /// Build a registry from profiles; later duplicates are rejected
    pub fn from_profiles(profiles: Vec<DeviceProfile>) -> Result<Self, RegistryError> {
        let mut map = BTreeMap::new();
        for profile in profiles {
            profile.validate()?;
            if map.contains_key(&profile.codename) {
                return Err(RegistryError::InvalidProfile {
                    codename: profile.codename,
                    reason: "codename defined twice".to_string(),
                });
            }
            map.insert(profile.codename.clone(), profile);
        }
        Ok(Self { profiles: map })
    }

    /// Look up a profile by codename
    pub fn lookup(&self, codename: &str) -> Result<&DeviceProfile, RegistryError> {
        self.profiles
            .get(codename)
            .ok_or_else(|| RegistryError::NotFound {
                codename: codename.to_string(),
            })
    }

    /// Whether a codename is known
    pub fn contains(&self, codename: &str) -> bool {
        self.profiles.contains_key(codename)
    }

    /// All profiles in codename order
    pub fn list_all(&self) -> impl Iterator<Item = &DeviceProfile> {
        self.profiles.values()
    }

    /// Number of profiles
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_profiles_are_valid() {
        let registry = DeviceRegistry::builtin().expect("built-in table must parse");
        assert!(registry.len() >= 4);

        for profile in registry.list_all() {
            assert!(
                !profile.partitions.is_empty(),
                "{} has an empty partition table",
                profile.codename
            );
            assert!(matches!(
                profile.protocol,
                Protocol::DirectFlash
                    | Protocol::DownloadMode
                    | Protocol::VendorTool
                    | Protocol::Sideload
            ));
        }
    }

    #[test]
    fn test_lookup_known_and_unknown() {
        let registry = DeviceRegistry::builtin().unwrap();

        let sailfish = registry.lookup("sailfish").unwrap();
        assert_eq!(sailfish.protocol, Protocol::DirectFlash);
        assert!(sailfish.supports_ab);
        assert_eq!(sailfish.partitions[0].name, "boot");

        let j5 = registry.lookup("j5nlte").unwrap();
        assert_eq!(j5.protocol, Protocol::DownloadMode);
        assert_eq!(j5.bootloader_mode, BootloaderMode::Download);
        assert!(!j5.supports_ab);

        let err = registry.lookup("nosuch").unwrap_err();
        assert_eq!(
            err,
            RegistryError::NotFound {
                codename: "nosuch".to_string()
            }
        );
    }

    #[test]
    fn test_list_all_is_sorted_by_codename() {
        let registry = DeviceRegistry::builtin().unwrap();
        let codenames: Vec<_> = registry.list_all().map(|p| p.codename.clone()).collect();
        let mut sorted = codenames.clone();
        sorted.sort();
        assert_eq!(codenames, sorted);
    }

    #[test]
    fn test_empty_partition_table_rejected() {
        let content = r#"
[[device]]
codename = "bare"
manufacturer = "acme"
model = "Bare"
protocol = "direct-flash"
bootloader_mode = "fastboot"
partitions = []
"#;
        let err = DeviceRegistry::from_toml(content, "test").unwrap_err();
        assert!(matches!(err, RegistryError::InvalidProfile { .. }));
    }

    #[test]
    fn test_duplicate_partition_rejected() {
        let content = r#"
[[device]]
codename = "dup"
manufacturer = "acme"
model = "Dup"
protocol = "direct-flash"
bootloader_mode = "fastboot"
partitions = [
    { name = "boot", role = "boot" },
    { name = "BOOT", role = "recovery" },
]
"#;
        let err = DeviceRegistry::from_toml(content, "test").unwrap_err();
        assert!(err.to_string().contains("duplicate partition"));
    }

    #[test]
    fn test_unknown_protocol_rejected() {
        let content = r#"
[[device]]
codename = "odd"
manufacturer = "acme"
model = "Odd"
protocol = "carrier-pigeon"
bootloader_mode = "fastboot"
partitions = [{ name = "boot", role = "boot" }]
"#;
        let err = DeviceRegistry::from_toml(content, "test").unwrap_err();
        assert!(matches!(err, RegistryError::ParseError { .. }));
    }

    #[test]
    fn test_user_table_overrides_and_extends() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("devices.toml");
        std::fs::write(
            &path,
            r#"
[[device]]
codename = "gsi"
manufacturer = "generic"
model = "Custom GSI"
protocol = "direct-flash"
bootloader_mode = "fastboot"
requires_unlock = false
partitions = [{ name = "system", role = "system" }]

[[device]]
codename = "beryllium"
manufacturer = "xiaomi"
model = "Poco F1"
protocol = "direct-flash"
bootloader_mode = "fastboot"
partitions = [
    { name = "boot", role = "boot" },
    { name = "system", role = "system" },
]
"#,
        )
        .unwrap();

        let registry = DeviceRegistry::load(Some(&path)).unwrap();
        assert_eq!(registry.lookup("gsi").unwrap().model, "Custom GSI");
        assert!(!registry.lookup("gsi").unwrap().requires_unlock);
        assert!(registry.contains("beryllium"));
        assert!(registry.contains("sailfish"));
    }

    #[test]
    fn test_missing_user_table_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("devices.toml");
        let registry = DeviceRegistry::load(Some(&path)).unwrap();
        assert_eq!(registry.len(), DeviceRegistry::builtin().unwrap().len());
    }
}
