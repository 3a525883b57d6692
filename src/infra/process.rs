//! External command execution
//!
//! Every transport tool invocation goes through a [`CommandRunner`]. The
//! system runner spawns the process with tokio and enforces a hard timeout;
//! the child is killed when the timeout fires. Each invocation and its result
//! is logged under the `romflash::command` target, which the command log
//! layer writes to disk.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::error::CommandError;

/// Log target for command invocations
pub const COMMAND_LOG_TARGET: &str = "romflash::command";

/// A fully specified external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable path
    pub program: PathBuf,
    /// Arguments
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Create a command for `program` with no arguments
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append a path argument
    #[must_use]
    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    /// File name of the program, e.g. `fastboot`
    pub fn program_name(&self) -> String {
        self.program
            .file_stem()
            .map_or_else(
                || self.program.to_string_lossy().into_owned(),
                |s| s.to_string_lossy().into_owned(),
            )
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    /// Raw standard output
    pub stdout: Vec<u8>,
    /// Standard error, lossily decoded
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the command exited with status 0
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Standard output, lossily decoded
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Stdout followed by stderr; fastboot prints getvar results on stderr
    pub fn combined(&self) -> String {
        let mut text = self.stdout_text();
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&self.stderr);
        text
    }

    /// Short message for reports: stderr if present, else stdout
    pub fn message(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout_text().trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Executes external commands with a timeout
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run `spec` to completion or until `timeout` elapses
    async fn run(&self, spec: &CommandSpec, timeout: Duration)
        -> Result<CommandOutput, CommandError>;
}

/// Runner backed by real processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
        timeout: Duration,
    ) -> Result<CommandOutput, CommandError> {
        tracing::info!(target: COMMAND_LOG_TARGET, "Executing: {spec}");

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let result = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(Ok(output)) => Ok(CommandOutput {
                code: output.status.code(),
                stdout: output.stdout,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }),
            Ok(Err(e)) => Err(CommandError::Spawn {
                command: spec.to_string(),
                error: e.to_string(),
            }),
            Err(_) => Err(CommandError::Timeout {
                command: spec.to_string(),
                seconds: timeout.as_secs(),
            }),
        };

        log_result(spec, &result);
        result
    }
}

fn log_result(spec: &CommandSpec, result: &Result<CommandOutput, CommandError>) {
    match result {
        Ok(output) if output.success() => {
            tracing::info!(target: COMMAND_LOG_TARGET, "Finished: {} (exit 0)", spec.program_name());
        }
        Ok(output) => {
            tracing::warn!(
                target: COMMAND_LOG_TARGET,
                "Failed: {} (exit {:?}): {}",
                spec,
                output.code,
                output.message()
            );
        }
        Err(e) => tracing::error!(target: COMMAND_LOG_TARGET, "{e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_spec_display() {
        let spec = CommandSpec::new("/usr/bin/fastboot")
            .args(["flash", "boot_a"])
            .path_arg(Path::new("/tmp/boot.img"));
        assert_eq!(
            spec.to_string(),
            "/usr/bin/fastboot flash boot_a /tmp/boot.img"
        );
        assert_eq!(spec.program_name(), "fastboot");
    }

    #[test]
    fn test_program_name_strips_exe() {
        let spec = CommandSpec::new("C:\\platform-tools\\adb.exe");
        // Backslashes are not separators on unix, so only check the suffix handling there
        assert!(spec.program_name().ends_with("adb"));
    }

    #[test]
    fn test_output_message_prefers_stderr() {
        let output = CommandOutput {
            code: Some(1),
            stdout: b"ok\n".to_vec(),
            stderr: "FAILED (remote: 'unknown partition')\n".to_string(),
        };
        assert!(!output.success());
        assert_eq!(output.message(), "FAILED (remote: 'unknown partition')");

        let output = CommandOutput {
            code: Some(0),
            stdout: b"OKAY\n".to_vec(),
            stderr: String::new(),
        };
        assert_eq!(output.message(), "OKAY");
    }

    #[test]
    fn test_combined_joins_streams() {
        let output = CommandOutput {
            code: Some(0),
            stdout: b"serial\tfastboot".to_vec(),
            stderr: "unlocked: yes\n".to_string(),
        };
        assert_eq!(output.combined(), "serial\tfastboot\nunlocked: yes\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_captures_output() {
        let spec = CommandSpec::new("sh").args(["-c", "echo out; echo err 1>&2; exit 3"]);
        let output = SystemRunner
            .run(&spec, Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(output.code, Some(3));
        assert_eq!(output.stdout_text(), "out\n");
        assert_eq!(output.stderr, "err\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_times_out() {
        let spec = CommandSpec::new("sh").args(["-c", "sleep 5"]);
        let err = SystemRunner
            .run(&spec, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_system_runner_reports_spawn_failure() {
        let spec = CommandSpec::new("/nonexistent/romflash-test-tool");
        let err = SystemRunner
            .run(&spec, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }));
    }
}
