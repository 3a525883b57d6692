//! Protocol backends
//!
//! Each backend knows the command vocabulary of one transport tool: how to
//! check that a device is attached, how to read the unlock state, and how
//! to turn a [`FlashPlan`] into concrete invocations. Backends build
//! commands; the orchestrator runs them.

use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use super::plan::{FlashPlan, StepAction};
use super::registry::{DeviceProfile, Protocol};
use super::settings::Timeouts;
use crate::error::FlashError;
use crate::infra::locator::{Tool, Toolset};
use crate::infra::process::{CommandOutput, CommandSpec};

/// Bootloader lock state as reported by the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlockState {
    /// Bootloader is unlocked
    Unlocked,
    /// Bootloader is locked
    Locked,
    /// The query ran but its answer was not understood
    Unknown(String),
    /// The protocol has no way to ask
    NotQueryable,
}

/// One command run by the orchestrator, covering one or more plan steps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Partitions written by this command, in plan order
    pub partitions: Vec<String>,
    /// Command to run
    pub command: CommandSpec,
    /// Time budget
    pub timeout: Duration,
}

/// Fastboot backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectFlash {
    fastboot: PathBuf,
    serial: Option<String>,
}

impl DirectFlash {
    fn command(&self) -> CommandSpec {
        let spec = CommandSpec::new(&self.fastboot);
        match &self.serial {
            Some(serial) => spec.args(["-s", serial.as_str()]),
            None => spec,
        }
    }
}

/// Heimdall backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadMode {
    heimdall: PathBuf,
}

/// Backend selected for a device's protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// `fastboot flash <partition> <image>` per step
    DirectFlash(DirectFlash),
    /// `heimdall flash --PART image ...` in one call
    DownloadMode(DownloadMode),
}

impl Backend {
    /// Pick the backend for `profile` using tools from `tools`
    pub fn for_profile(
        profile: &DeviceProfile,
        tools: &Toolset,
        serial: Option<&str>,
    ) -> Result<Self, FlashError> {
        let require = |tool: Tool| {
            tools
                .get(tool)
                .map(PathBuf::from)
                .ok_or_else(|| FlashError::MissingTooling {
                    protocol: profile.protocol,
                    tool: tool.to_string(),
                })
        };

        match profile.protocol {
            Protocol::DirectFlash => Ok(Self::DirectFlash(DirectFlash {
                fastboot: require(Tool::Fastboot)?,
                serial: serial.map(String::from),
            })),
            Protocol::DownloadMode => {
                if let Some(serial) = serial {
                    tracing::warn!("heimdall cannot select a device; ignoring serial {serial}");
                }
                Ok(Self::DownloadMode(DownloadMode {
                    heimdall: require(Tool::Heimdall)?,
                }))
            }
            protocol @ (Protocol::VendorTool | Protocol::Sideload) => {
                Err(FlashError::UnsupportedProtocol { protocol })
            }
        }
    }

    /// Name of the device mode the backend talks to
    pub fn mode_name(&self) -> &'static str {
        match self {
            Self::DirectFlash(_) => "fastboot",
            Self::DownloadMode(_) => "download",
        }
    }

    /// Whether erase steps can be executed
    pub fn supports_erase(&self) -> bool {
        matches!(self, Self::DirectFlash(_))
    }

    /// Command enumerating attached devices in this mode
    pub fn enumerate_command(&self) -> CommandSpec {
        match self {
            Self::DirectFlash(b) => CommandSpec::new(&b.fastboot).arg("devices"),
            Self::DownloadMode(b) => CommandSpec::new(&b.heimdall).arg("detect"),
        }
    }

    /// Interpret the enumeration output
    pub fn is_reachable(&self, output: &CommandOutput) -> bool {
        if !output.success() {
            return false;
        }
        match self {
            Self::DirectFlash(b) => {
                let serials = parse_device_list(&output.stdout_text(), "fastboot");
                match &b.serial {
                    Some(wanted) => serials.iter().any(|s| s == wanted),
                    None => !serials.is_empty(),
                }
            }
            Self::DownloadMode(_) => true,
        }
    }

    /// Command reading the unlock state, if the protocol has one
    pub fn unlock_query(&self) -> Option<CommandSpec> {
        match self {
            Self::DirectFlash(b) => Some(b.command().args(["getvar", "unlocked"])),
            Self::DownloadMode(_) => None,
        }
    }

    /// Interpret the unlock query output
    pub fn parse_unlock(output: &CommandOutput) -> UnlockState {
        static UNLOCKED: OnceLock<Regex> = OnceLock::new();
        let re = UNLOCKED.get_or_init(|| {
            Regex::new(r"(?im)unlocked:\s*(\w+)").expect("static regex is valid")
        });

        let combined = output.combined();
        match re.captures(&combined).and_then(|c| c.get(1)) {
            Some(value) => match value.as_str().to_ascii_lowercase().as_str() {
                "yes" | "true" | "1" => UnlockState::Unlocked,
                "no" | "false" | "0" => UnlockState::Locked,
                other => UnlockState::Unknown(format!("unexpected value '{other}'")),
            },
            None => UnlockState::Unknown(format!(
                "no 'unlocked' variable in output: {}",
                output.message()
            )),
        }
    }

    /// Commands executing `plan`, in order
    pub fn invocations(&self, plan: &FlashPlan, timeouts: &Timeouts) -> Vec<Invocation> {
        match self {
            Self::DirectFlash(b) => plan
                .steps()
                .iter()
                .map(|step| {
                    let command = match &step.action {
                        StepAction::Write { image } => b
                            .command()
                            .args(["flash", step.partition.as_str()])
                            .path_arg(image),
                        StepAction::Erase => b.command().args(["erase", step.partition.as_str()]),
                    };
                    Invocation {
                        partitions: vec![step.partition.clone()],
                        command,
                        timeout: timeouts.flash_step,
                    }
                })
                .collect(),
            Self::DownloadMode(b) => {
                let mut command = CommandSpec::new(&b.heimdall).arg("flash");
                let mut partitions = Vec::new();
                for step in plan.steps() {
                    match &step.action {
                        StepAction::Write { image } => {
                            command = command
                                .arg(format!("--{}", step.partition.to_ascii_uppercase()))
                                .path_arg(image);
                            partitions.push(step.partition.clone());
                        }
                        StepAction::Erase => {
                            tracing::warn!(
                                "Download mode cannot erase '{}'; skipping",
                                step.partition
                            );
                        }
                    }
                }
                if partitions.is_empty() {
                    return Vec::new();
                }
                vec![Invocation {
                    partitions,
                    command: command.arg("--reboot"),
                    timeout: timeouts.multi_partition,
                }]
            }
        }
    }

    /// Reboot command issued after a successful flash
    ///
    /// `None` when the flash invocation already reboots the device.
    pub fn reboot_command(&self) -> Option<CommandSpec> {
        match self {
            Self::DirectFlash(b) => Some(b.command().arg("reboot")),
            Self::DownloadMode(_) => None,
        }
    }
}

/// Serials from `adb devices` / `fastboot devices` output in the given state
pub fn parse_device_list(output: &str, state: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let serial = fields.next()?;
            let line_state = fields.next()?;
            (line_state == state).then(|| serial.to_string())
        })
        .collect()
}
