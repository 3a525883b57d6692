//! Flash orchestrator
//!
//! Drives one flash run through
//! `Idle → PrerequisitesChecked → PackagePrepared → PlanBuilt → Executing`
//! and ends in `Succeeded` or `Failed`. Every precondition is checked before
//! the first destructive command, the plan stops at the first failing step
//! and a [`FlashReport`] is produced whatever happens.

use std::path::Path;
use std::time::Instant;

use super::backend::{parse_device_list, Backend, Invocation, UnlockState};
use super::detect::{DeviceDetector, Transport};
use super::package::decompose;
use super::plan::{build_plan, FlashPlan, PlanOptions};
use super::registry::{DeviceProfile, DeviceRegistry};
use super::report::{
    unix_now, BackupOutcome, DeviceSummary, FlashReport, FlashState, RebootOutcome, StepOutcome,
};
use super::settings::RunConfig;
use crate::config::defaults::EFS_BLOCK_DEVICE;
use crate::error::{CommandError, FlashError};
use crate::infra::filesystem;
use crate::infra::locator::Tool;
use crate::infra::process::{CommandRunner, CommandSpec};

/// Which device to flash
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceTarget {
    /// Codename given by the operator
    Codename(String),
    /// Detect the attached device
    Auto,
}

/// Per-run options
#[derive(Debug, Clone, Default)]
pub struct FlashOptions {
    /// Plan shaping
    pub plan: PlanOptions,
    /// Transport serial to bind the run to
    pub serial: Option<String>,
    /// Back up EFS before flashing Samsung devices
    pub backup: bool,
}

/// Hooks for the front end
///
/// All methods have no-op defaults; `confirm` approves by default.
pub trait FlashObserver {
    /// The orchestrator entered `state`
    fn state_changed(&self, _state: FlashState) {}

    /// Show the device's special instructions before anything destructive
    fn show_instructions(&self, _profile: &DeviceProfile) {}

    /// Last chance to abort; `false` cancels the run
    fn confirm(&self, _profile: &DeviceProfile, _plan: &FlashPlan) -> bool {
        true
    }

    /// A backend command is about to run for `partitions`
    fn step_started(&self, _partitions: &[String]) {}

    /// A step finished
    fn step_finished(&self, _outcome: &StepOutcome) {}
}

/// Observer that approves everything and shows nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct Unattended;

impl FlashObserver for Unattended {}

/// Runs flash plans against a device
pub struct FlashOrchestrator<'a, R> {
    registry: &'a DeviceRegistry,
    config: &'a RunConfig,
    runner: &'a R,
    observer: &'a dyn FlashObserver,
    state: FlashState,
}

impl<'a, R: CommandRunner> FlashOrchestrator<'a, R> {
    /// Create an orchestrator for one run
    pub fn new(
        registry: &'a DeviceRegistry,
        config: &'a RunConfig,
        runner: &'a R,
        observer: &'a dyn FlashObserver,
    ) -> Self {
        Self {
            registry,
            config,
            runner,
            observer,
            state: FlashState::Idle,
        }
    }

    /// Current state
    pub fn state(&self) -> FlashState {
        self.state
    }

    /// Flash `package_path` onto `target`
    pub async fn flash(
        &mut self,
        target: &DeviceTarget,
        package_path: &Path,
        options: &FlashOptions,
    ) -> FlashReport {
        let mut report = FlashReport::new(package_path);
        self.transition(FlashState::Idle);

        match self.run(target, package_path, options, &mut report).await {
            Ok(()) => {
                report.record_success();
                self.transition(FlashState::Succeeded);
                tracing::info!("Flash completed successfully");
            }
            Err(e) => {
                tracing::error!("Flash failed ({:?}): {e}", self.state);
                report.record_failure(self.state, &e);
                self.transition(FlashState::Failed);
            }
        }

        report.finish();
        report
    }

    async fn run(
        &mut self,
        target: &DeviceTarget,
        package_path: &Path,
        options: &FlashOptions,
        report: &mut FlashReport,
    ) -> Result<(), FlashError> {
        let (profile, serial) = self.resolve_device(target, options.serial.as_deref()).await?;
        tracing::info!("Target device: {} ({})", profile.codename, profile.display_name());
        report.device = Some(DeviceSummary::from(profile));
        report.protocol = Some(profile.protocol);
        report.serial.clone_from(&serial);
        report
            .special_instructions
            .clone_from(&profile.special_instructions);

        let backend = self.check_prerequisites(profile, serial.as_deref(), report).await?;
        self.transition(FlashState::PrerequisitesChecked);

        // Dropping the package removes its extraction directory
        let package = decompose(package_path)?;
        report.package_format = Some(package.format());
        report.bound_roles = package.roles().collect();
        self.transition(FlashState::PackagePrepared);

        let mut plan_options = options.plan;
        if plan_options.wipe_data && !backend.supports_erase() {
            let note = format!(
                "{} mode cannot erase partitions; data wipe skipped",
                backend.mode_name()
            );
            tracing::warn!("{note}");
            report.notes.push(note);
            plan_options.wipe_data = false;
        }
        let plan = build_plan(profile, &package, plan_options)?;
        report.plan = plan.steps().to_vec();
        self.transition(FlashState::PlanBuilt);

        self.observer.show_instructions(profile);
        for line in &profile.special_instructions {
            tracing::info!("Instruction: {line}");
        }
        if !self.observer.confirm(profile, &plan) {
            return Err(FlashError::Cancelled);
        }

        if is_samsung(profile) {
            report.backup = Some(if options.backup {
                self.backup_efs(profile, serial.as_deref()).await
            } else {
                BackupOutcome::Skipped {
                    reason: "disabled by operator".to_string(),
                }
            });
        }

        self.transition(FlashState::Executing);
        for invocation in backend.invocations(&plan, &self.config.timeouts) {
            self.execute(&invocation, report).await?;
        }

        report.reboot = Some(self.reboot(&backend).await);
        Ok(())
    }

    fn transition(&mut self, state: FlashState) {
        tracing::debug!("State: {:?} -> {:?}", self.state, state);
        self.state = state;
        self.observer.state_changed(state);
    }

    async fn resolve_device(
        &self,
        target: &DeviceTarget,
        serial: Option<&str>,
    ) -> Result<(&'a DeviceProfile, Option<String>), FlashError> {
        let registry = self.registry;
        match target {
            DeviceTarget::Codename(codename) => {
                Ok((registry.lookup(codename)?, serial.map(String::from)))
            }
            DeviceTarget::Auto => {
                let detector = DeviceDetector::new(
                    self.runner,
                    &self.config.tools,
                    self.config.timeouts.probe,
                );
                let detected = detector
                    .detect_where(|codename| registry.contains(codename))
                    .await
                    .ok_or_else(|| FlashError::DeviceUnresolved {
                        reason: "no supported device detected; connect one or pass --device"
                            .to_string(),
                    })?;
                let profile = registry.lookup(&detected.codename)?;
                // adb serials are not guaranteed to match the bootloader's
                let serial = serial.map(String::from).or_else(|| {
                    (detected.transport == Transport::Fastboot).then_some(detected.serial)
                });
                Ok((profile, serial))
            }
        }
    }

    async fn check_prerequisites(
        &self,
        profile: &DeviceProfile,
        serial: Option<&str>,
        report: &mut FlashReport,
    ) -> Result<Backend, FlashError> {
        let backend = Backend::for_profile(profile, &self.config.tools, serial)?;
        let probe = self.config.timeouts.probe;

        let enumerate = backend.enumerate_command();
        let unreachable = match self.runner.run(&enumerate, probe).await {
            Ok(output) if backend.is_reachable(&output) => None,
            Ok(output) => Some(match (output.success(), serial) {
                (true, Some(serial)) => format!("device '{serial}' not listed"),
                (true, None) => "no device listed".to_string(),
                (false, _) => output.message(),
            }),
            Err(e) => Some(e.to_string()),
        };
        if let Some(detail) = unreachable {
            let detail = match &profile.key_combination {
                Some(keys) => format!("{detail} (enter {} mode with: {keys})", backend.mode_name()),
                None => detail,
            };
            return Err(FlashError::DeviceUnreachable {
                mode: backend.mode_name().to_string(),
                detail,
            });
        }

        let unlock = match backend.unlock_query() {
            Some(query) => match self.runner.run(&query, probe).await {
                Ok(output) => Backend::parse_unlock(&output),
                Err(e) => UnlockState::Unknown(e.to_string()),
            },
            None => UnlockState::NotQueryable,
        };
        report.unlock_state = Some(describe_unlock(&unlock));

        if profile.requires_unlock {
            match unlock {
                UnlockState::Unlocked => {}
                UnlockState::Locked => {
                    return Err(FlashError::BootloaderLocked {
                        codename: profile.codename.clone(),
                        detail: "unlock it before flashing".to_string(),
                    });
                }
                UnlockState::Unknown(reason) => {
                    return Err(FlashError::BootloaderLocked {
                        codename: profile.codename.clone(),
                        detail: format!("unlock state could not be confirmed ({reason})"),
                    });
                }
                UnlockState::NotQueryable => {
                    let note = format!(
                        "{} mode cannot report the bootloader lock state; make sure it is unlocked",
                        backend.mode_name()
                    );
                    tracing::warn!("{note}");
                    report.notes.push(note);
                }
            }
        }

        Ok(backend)
    }

    async fn execute(
        &self,
        invocation: &Invocation,
        report: &mut FlashReport,
    ) -> Result<(), FlashError> {
        tracing::info!("Flashing {}...", invocation.partitions.join(", "));
        self.observer.step_started(&invocation.partitions);

        let started = Instant::now();
        let result = self
            .runner
            .run(&invocation.command, invocation.timeout)
            .await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let (success, message, error) = match result {
            Ok(output) if output.success() => (true, output.message(), None),
            Ok(output) => {
                let message = output.message();
                let error = FlashError::StepFailed {
                    partition: invocation.partitions.join(","),
                    message: message.clone(),
                };
                (false, message, Some(error))
            }
            Err(CommandError::Timeout { command, seconds }) => {
                let error = FlashError::CommandTimeout { command, seconds };
                (false, error.to_string(), Some(error))
            }
            Err(e @ CommandError::Spawn { .. }) => {
                let message = e.to_string();
                let error = FlashError::StepFailed {
                    partition: invocation.partitions.join(","),
                    message: message.clone(),
                };
                (false, message, Some(error))
            }
        };

        for partition in &invocation.partitions {
            let outcome = StepOutcome {
                partition: partition.clone(),
                success,
                message: message.clone(),
                elapsed_ms,
            };
            self.observer.step_finished(&outcome);
            report.steps.push(outcome);
        }

        match error {
            None => {
                tracing::info!("Flashed {}", invocation.partitions.join(", "));
                Ok(())
            }
            Some(error) => Err(error),
        }
    }

    async fn reboot(&self, backend: &Backend) -> RebootOutcome {
        let Some(command) = backend.reboot_command() else {
            return RebootOutcome::IncludedInFlash;
        };

        tracing::info!("Rebooting device...");
        match self.runner.run(&command, self.config.timeouts.reboot).await {
            Ok(output) if output.success() => RebootOutcome::Issued,
            Ok(output) => {
                tracing::warn!("Reboot failed: {}", output.message());
                RebootOutcome::Failed {
                    message: output.message(),
                }
            }
            Err(e) => {
                tracing::warn!("Reboot failed: {e}");
                RebootOutcome::Failed {
                    message: e.to_string(),
                }
            }
        }
    }

    /// Copy the EFS partition over adb; never fails the run
    async fn backup_efs(&self, profile: &DeviceProfile, serial: Option<&str>) -> BackupOutcome {
        let Some(adb) = self.config.tools.get(Tool::Adb) else {
            return BackupOutcome::Skipped {
                reason: "adb not found".to_string(),
            };
        };

        let listed = match self
            .runner
            .run(&CommandSpec::new(adb).arg("devices"), self.config.timeouts.probe)
            .await
        {
            Ok(output) if output.success() => parse_device_list(&output.stdout_text(), "device"),
            _ => Vec::new(),
        };
        let target = match serial {
            Some(serial) => listed.into_iter().find(|s| s == serial),
            None => listed.into_iter().next(),
        };
        let Some(target) = target else {
            tracing::warn!("Device not visible over adb; EFS backup skipped");
            return BackupOutcome::Skipped {
                reason: "device not visible over adb; back up EFS manually if needed".to_string(),
            };
        };

        tracing::info!("Backing up EFS from {target}...");
        let command = CommandSpec::new(adb)
            .args(["-s", target.as_str()])
            .args(["exec-out", "su", "-c"])
            .arg(format!("dd if={EFS_BLOCK_DEVICE}"));

        let output = match self.runner.run(&command, self.config.timeouts.backup).await {
            Ok(output) if output.success() && !output.stdout.is_empty() => output,
            Ok(output) => {
                let message = match output.message() {
                    m if m.is_empty() => "no data read".to_string(),
                    m => m,
                };
                tracing::warn!("EFS backup failed: {message}");
                return BackupOutcome::Failed { message };
            }
            Err(e) => {
                tracing::warn!("EFS backup failed: {e}");
                return BackupOutcome::Failed {
                    message: e.to_string(),
                };
            }
        };

        let path = self.config.backup_dir.join(format!(
            "{}-{target}-efs-{}.img",
            profile.codename,
            unix_now()
        ));
        match filesystem::write_file(&path, &output.stdout) {
            Ok(()) => {
                tracing::info!("EFS backup saved to {}", path.display());
                BackupOutcome::Saved {
                    bytes: output.stdout.len() as u64,
                    path,
                }
            }
            Err(e) => {
                tracing::warn!("EFS backup failed: {e}");
                BackupOutcome::Failed {
                    message: e.to_string(),
                }
            }
        }
    }
}

fn is_samsung(profile: &DeviceProfile) -> bool {
    profile.manufacturer.eq_ignore_ascii_case("samsung")
}

fn describe_unlock(state: &UnlockState) -> String {
    match state {
        UnlockState::Unlocked => "unlocked".to_string(),
        UnlockState::Locked => "locked".to_string(),
        UnlockState::Unknown(reason) => format!("unknown: {reason}"),
        UnlockState::NotQueryable => "not-queryable".to_string(),
    }
}
