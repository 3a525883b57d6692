//! Flash run report
//!
//! The report is produced for every run, successful or not, and written as
//! JSON so an operator can see exactly which partitions were written.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use super::package::PackageFormat;
use super::partition::PartitionRole;
use super::plan::PlanStep;
use super::registry::{DeviceProfile, Protocol};
use crate::error::{FilesystemError, FlashError};
use crate::infra::filesystem;

/// Orchestrator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlashState {
    /// Nothing checked yet
    Idle,
    /// Tools present, device reachable, bootloader acceptable
    PrerequisitesChecked,
    /// Package decomposed
    PackagePrepared,
    /// Plan built and validated
    PlanBuilt,
    /// Writing to the device
    Executing,
    /// Every step succeeded
    Succeeded,
    /// Run ended with an error
    Failed,
}

/// Overall verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Every step succeeded
    Succeeded,
    /// The run failed
    Failed,
}

/// Device identity as recorded in the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceSummary {
    /// Codename
    pub codename: String,
    /// Manufacturer
    pub manufacturer: String,
    /// Model
    pub model: String,
}

impl From<&DeviceProfile> for DeviceSummary {
    fn from(profile: &DeviceProfile) -> Self {
        Self {
            codename: profile.codename.clone(),
            manufacturer: profile.manufacturer.clone(),
            model: profile.model.clone(),
        }
    }
}

/// Result of one executed step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    /// Partition name as passed to the backend
    pub partition: String,
    /// Whether the step succeeded
    pub success: bool,
    /// Backend output or error text
    pub message: String,
    /// Wall time of the command covering this step
    pub elapsed_ms: u64,
}

/// Result of the EFS backup attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BackupOutcome {
    /// Backup written
    Saved {
        /// Backup file
        path: PathBuf,
        /// Size in bytes
        bytes: u64,
    },
    /// Backup not attempted
    Skipped {
        /// Why
        reason: String,
    },
    /// Backup attempted and failed
    Failed {
        /// Error text
        message: String,
    },
}

/// Result of the final reboot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum RebootOutcome {
    /// Reboot command succeeded
    Issued,
    /// The flash command itself reboots the device
    IncludedInFlash,
    /// Reboot command failed; the flash is still complete
    Failed {
        /// Error text
        message: String,
    },
}

/// Failure details
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    /// Error kind, e.g. `BootloaderLocked`
    pub kind: String,
    /// Full error message
    pub message: String,
}

/// Report of one flash run
#[derive(Debug, Clone, Serialize)]
pub struct FlashReport {
    /// Firmware file
    pub package: PathBuf,
    /// Target device
    pub device: Option<DeviceSummary>,
    /// Transport serial the run was bound to
    pub serial: Option<String>,
    /// Protocol used
    pub protocol: Option<Protocol>,
    /// Detected package format
    pub package_format: Option<PackageFormat>,
    /// Roles the package bound
    pub bound_roles: Vec<PartitionRole>,
    /// Unlock state as reported by the device
    pub unlock_state: Option<String>,
    /// Operator instructions shown before flashing
    pub special_instructions: Vec<String>,
    /// Planned steps
    pub plan: Vec<PlanStep>,
    /// Executed steps, in order
    pub steps: Vec<StepOutcome>,
    /// EFS backup
    pub backup: Option<BackupOutcome>,
    /// Final reboot
    pub reboot: Option<RebootOutcome>,
    /// Warnings worth keeping with the report
    pub notes: Vec<String>,
    /// Final state
    pub state: FlashState,
    /// Last state reached before the failure
    pub failed_at: Option<FlashState>,
    /// Overall verdict
    pub verdict: Verdict,
    /// Failure, when the verdict is failed
    pub failure: Option<Failure>,
    /// Start time, Unix seconds
    pub started_at: u64,
    /// End time, Unix seconds
    pub finished_at: u64,
}

impl FlashReport {
    /// Empty report for a run on `package`
    pub fn new(package: &Path) -> Self {
        Self {
            package: package.to_path_buf(),
            device: None,
            serial: None,
            protocol: None,
            package_format: None,
            bound_roles: Vec::new(),
            unlock_state: None,
            special_instructions: Vec::new(),
            plan: Vec::new(),
            steps: Vec::new(),
            backup: None,
            reboot: None,
            notes: Vec::new(),
            state: FlashState::Idle,
            failed_at: None,
            verdict: Verdict::Failed,
            failure: None,
            started_at: unix_now(),
            finished_at: 0,
        }
    }

    /// Whether the run succeeded
    pub fn succeeded(&self) -> bool {
        self.verdict == Verdict::Succeeded
    }

    /// First failed step, if any
    pub fn failed_step(&self) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| !s.success)
    }

    /// Record the terminal error raised while in state `at`
    pub fn record_failure(&mut self, at: FlashState, error: &FlashError) {
        self.verdict = Verdict::Failed;
        self.state = FlashState::Failed;
        self.failed_at = Some(at);
        self.failure = Some(Failure {
            kind: error.kind().to_string(),
            message: error.to_string(),
        });
    }

    /// Record success
    pub fn record_success(&mut self) {
        self.verdict = Verdict::Succeeded;
        self.state = FlashState::Succeeded;
        self.failed_at = None;
        self.failure = None;
    }

    /// Stamp the finish time
    pub fn finish(&mut self) {
        self.finished_at = unix_now();
    }

    /// Pretty JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Write the report into `dir`, returning the file path
    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf, FilesystemError> {
        let codename = self
            .device
            .as_ref()
            .map_or("unknown", |d| d.codename.as_str());
        let path = dir.join(format!("romflash-{codename}-{}.json", self.started_at));

        let json = self.to_json().map_err(|e| FilesystemError::WriteFile {
            path: path.clone(),
            error: e.to_string(),
        })?;
        filesystem::write_file(&path, json.as_bytes())?;
        Ok(path)
    }
}

/// Seconds since the Unix epoch
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
