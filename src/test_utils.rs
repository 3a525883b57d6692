//! Test utilities
//!
//! Proptest generators, on-disk fixtures and a scripted command runner that
//! stands in for adb, fastboot and heimdall.

#[cfg(test)]
pub mod generators {
    use proptest::prelude::*;

    use crate::core::partition::PartitionRole;

    /// Generate a subset of partition roles in canonical order, possibly empty
    pub fn role_subset() -> impl Strategy<Value = Vec<PartitionRole>> {
        proptest::collection::vec(any::<bool>(), PartitionRole::ALL.len()).prop_map(|mask| {
            PartitionRole::ALL
                .iter()
                .zip(mask)
                .filter_map(|(role, keep)| keep.then_some(*role))
                .collect()
        })
    }
}

#[cfg(test)]
pub mod fixtures {
    use std::fs::File;
    use std::io::Write;
    use std::path::Path;

    use zip::write::FileOptions;
    use zip::{CompressionMethod, ZipWriter};

    use crate::core::partition::PartitionRole;
    use crate::core::registry::{BootloaderMode, DeviceProfile, PartitionEntry, Protocol};

    /// Write a zip archive with the given `(name, content)` entries
    pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        let options = FileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, content) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content).unwrap();
        }
        zip.finish().unwrap();
    }

    /// Write a tar archive with the given `(name, content)` entries
    pub fn write_tar(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut builder = tar::Builder::new(file);
        for (name, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *content).unwrap();
        }
        builder.finish().unwrap();
    }

    /// A direct-flash profile with the given partition table
    pub fn profile(
        codename: &str,
        partitions: &[(&str, PartitionRole)],
        supports_ab: bool,
    ) -> DeviceProfile {
        DeviceProfile {
            codename: codename.to_string(),
            manufacturer: "acme".to_string(),
            model: format!("Test {codename}"),
            protocol: Protocol::DirectFlash,
            bootloader_mode: BootloaderMode::Fastboot,
            key_combination: None,
            partitions: partitions
                .iter()
                .map(|(name, role)| PartitionEntry {
                    name: (*name).to_string(),
                    role: *role,
                })
                .collect(),
            supports_ab,
            requires_unlock: false,
            special_instructions: Vec::new(),
        }
    }
}

#[cfg(test)]
pub mod runner {
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::error::CommandError;
    use crate::infra::process::{CommandOutput, CommandRunner, CommandSpec};

    /// Canned result for a scripted command
    #[derive(Debug, Clone)]
    pub enum Reply {
        /// The command ran and produced this output
        Output(CommandOutput),
        /// The command exceeded its timeout
        Timeout,
        /// The runner failed with this error
        Error(CommandError),
    }

    impl Reply {
        /// Exit 0 with `stdout`
        pub fn ok(stdout: &str) -> Self {
            Self::bytes(stdout.as_bytes())
        }

        /// Exit 0 with raw `stdout`
        pub fn bytes(stdout: &[u8]) -> Self {
            Self::Output(CommandOutput {
                code: Some(0),
                stdout: stdout.to_vec(),
                stderr: String::new(),
            })
        }

        /// Exit `code` with `stderr` and empty stdout
        pub fn with_stderr(code: i32, stderr: &str) -> Self {
            Self::Output(CommandOutput {
                code: Some(code),
                stdout: Vec::new(),
                stderr: stderr.to_string(),
            })
        }

        /// Exit 1 with `stderr`
        pub fn fail(stderr: &str) -> Self {
            Self::with_stderr(1, stderr)
        }

        /// Time out
        pub fn timeout() -> Self {
            Self::Timeout
        }
    }

    /// Command runner answering from a script
    ///
    /// Commands are matched by the program's file name followed by the
    /// arguments, e.g. `fastboot -s ABC flash boot_a`. A rule matches when
    /// its words are a prefix of the command's words, so image paths can be
    /// left out. The first matching rule wins; unscripted commands fail with
    /// exit code 1. Every call is recorded.
    #[derive(Debug, Default)]
    pub struct ScriptedRunner {
        rules: Vec<(Vec<String>, Reply)>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedRunner {
        /// Empty script
        pub fn new() -> Self {
            Self::default()
        }

        /// Answer commands starting with `pattern` with `reply`
        #[must_use]
        pub fn on(mut self, pattern: &str, reply: Reply) -> Self {
            self.rules.push((words(pattern), reply));
            self
        }

        /// Recorded command lines, in call order
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        /// Whether any recorded call starts with `pattern`
        pub fn was_called(&self, pattern: &str) -> bool {
            let pattern = words(pattern);
            self.calls()
                .iter()
                .any(|call| is_prefix(&pattern, &words(call)))
        }

        /// Number of recorded calls starting with `pattern`
        pub fn count(&self, pattern: &str) -> usize {
            let pattern = words(pattern);
            self.calls()
                .iter()
                .filter(|call| is_prefix(&pattern, &words(call)))
                .count()
        }
    }

    impl CommandRunner for ScriptedRunner {
        async fn run(
            &self,
            spec: &CommandSpec,
            timeout: Duration,
        ) -> Result<CommandOutput, CommandError> {
            let mut line = vec![spec.program_name()];
            line.extend(spec.args.iter().cloned());
            self.calls.lock().unwrap().push(line.join(" "));

            let reply = self
                .rules
                .iter()
                .find(|(pattern, _)| is_prefix(pattern, &line))
                .map(|(_, reply)| reply.clone());

            match reply {
                Some(Reply::Output(output)) => Ok(output),
                Some(Reply::Timeout) => Err(CommandError::Timeout {
                    command: spec.to_string(),
                    seconds: timeout.as_secs(),
                }),
                Some(Reply::Error(e)) => Err(e),
                None => Ok(CommandOutput {
                    code: Some(1),
                    stdout: Vec::new(),
                    stderr: format!("unscripted command: {}", line.join(" ")),
                }),
            }
        }
    }

    fn words(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    fn is_prefix(pattern: &[String], line: &[String]) -> bool {
        pattern.len() <= line.len() && pattern.iter().zip(line).all(|(p, l)| p == l)
    }
}

#[cfg(test)]
mod tests {
    use super::generators::*;
    use super::runner::{Reply, ScriptedRunner};
    use crate::config::defaults::MIN_PROPTEST_ITERATIONS;
    use crate::infra::process::{CommandRunner, CommandSpec};
    use proptest::prelude::*;
    use std::time::Duration;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(MIN_PROPTEST_ITERATIONS))]

        #[test]
        fn test_role_subset_is_unique_and_ordered(roles in role_subset()) {
            let mut sorted = roles.clone();
            sorted.sort();
            sorted.dedup();
            prop_assert_eq!(sorted, roles);
        }
    }

    #[tokio::test]
    async fn test_scripted_runner_prefix_match() {
        let runner = ScriptedRunner::new()
            .on("fastboot flash boot", Reply::ok("OKAY"))
            .on("fastboot", Reply::fail("catch-all"));

        let flash = CommandSpec::new("/usr/bin/fastboot").args(["flash", "boot", "/tmp/boot.img"]);
        let out = runner.run(&flash, Duration::from_secs(1)).await.unwrap();
        assert!(out.success());

        let reboot = CommandSpec::new("/usr/bin/fastboot").arg("reboot");
        let out = runner.run(&reboot, Duration::from_secs(1)).await.unwrap();
        assert_eq!(out.stderr, "catch-all");

        assert!(runner.was_called("fastboot flash boot"));
        assert_eq!(runner.count("fastboot"), 2);
    }

    #[tokio::test]
    async fn test_scripted_runner_unscripted_fails() {
        let runner = ScriptedRunner::new();
        let spec = CommandSpec::new("heimdall").arg("detect");
        let out = runner.run(&spec, Duration::from_secs(1)).await.unwrap();
        assert!(!out.success());
        assert_eq!(runner.calls(), vec!["heimdall detect"]);
    }
}
