//! Default configuration values

/// Timeout for a single-partition write (seconds)
pub const FLASH_STEP_TIMEOUT_SECS: u64 = 300;

/// Timeout for a multi-partition vendor call (seconds)
pub const MULTI_PARTITION_TIMEOUT_SECS: u64 = 600;

/// Timeout for read-only probes: enumeration, getvar, getprop (seconds)
pub const PROBE_TIMEOUT_SECS: u64 = 10;

/// Timeout for the final reboot command (seconds)
pub const REBOOT_TIMEOUT_SECS: u64 = 30;

/// Timeout for pulling the EFS backup over adb (seconds)
pub const BACKUP_TIMEOUT_SECS: u64 = 120;

/// Conventional install locations searched after PATH
pub const CONVENTIONAL_TOOL_DIRS: &[&str] = &[
    "/usr/bin",
    "/usr/local/bin",
    "/opt/platform-tools",
    "C:\\platform-tools",
    "C:\\adb",
];

/// SDK platform-tools directory relative to the home directory
pub const HOME_PLATFORM_TOOLS: &str = "Android/Sdk/platform-tools";

/// Block device holding the Samsung EFS partition
pub const EFS_BLOCK_DEVICE: &str = "/dev/block/by-name/efs";

/// Default log file name under the data directory
pub const LOG_FILE_NAME: &str = "romflash.log";

/// Reports subdirectory under the data directory
pub const REPORTS_SUBDIR: &str = "reports";

/// Minimum proptest iterations
pub const MIN_PROPTEST_ITERATIONS: u32 = 100;
