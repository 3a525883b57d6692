//! Device detection
//!
//! Identifies an attached device by asking adb first and fastboot second.
//! Every probe has its own short timeout; an absent tool, a failing command
//! or a timeout just moves on to the next strategy. Detection never changes
//! device state.

use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use super::backend::parse_device_list;
use crate::infra::locator::{Tool, Toolset};
use crate::infra::process::{CommandRunner, CommandSpec};

/// Transport that answered the detection probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Booted Android, reachable over adb
    Adb,
    /// Bootloader mode, reachable over fastboot
    Fastboot,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Adb => "adb",
            Self::Fastboot => "fastboot",
        })
    }
}

/// Identity of a detected device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectedDevice {
    /// Product codename reported by the device
    pub codename: String,
    /// Transport serial number
    pub serial: String,
    /// Transport that reported it
    pub transport: Transport,
}

/// Probes attached transports for a device identity
pub struct DeviceDetector<'a, R> {
    runner: &'a R,
    tools: &'a Toolset,
    timeout: Duration,
}

impl<'a, R: CommandRunner> DeviceDetector<'a, R> {
    /// Create a detector with the given probe timeout
    pub fn new(runner: &'a R, tools: &'a Toolset, timeout: Duration) -> Self {
        Self {
            runner,
            tools,
            timeout,
        }
    }

    /// Identify the first attached device, if any
    pub async fn detect(&self) -> Option<DetectedDevice> {
        self.detect_where(|_| true).await
    }

    /// Identify the first attached device whose codename satisfies `accept`
    ///
    /// A rejected identity does not end detection; the next strategy is tried.
    pub async fn detect_where(&self, accept: impl Fn(&str) -> bool) -> Option<DetectedDevice> {
        tracing::info!("Detecting connected device...");

        if let Some(adb) = self.tools.get(Tool::Adb) {
            if let Some(device) = self.detect_adb(adb).await.filter(|d| accepted(d, &accept)) {
                tracing::info!("Detected device: {} ({})", device.codename, device.serial);
                return Some(device);
            }
        }

        if let Some(fastboot) = self.tools.get(Tool::Fastboot) {
            if let Some(device) = self
                .detect_fastboot(fastboot)
                .await
                .filter(|d| accepted(d, &accept))
            {
                tracing::info!(
                    "Detected device in fastboot: {} ({})",
                    device.codename,
                    device.serial
                );
                return Some(device);
            }
        }

        tracing::warn!("Could not detect device automatically");
        None
    }

    async fn detect_adb(&self, adb: &Path) -> Option<DetectedDevice> {
        let devices = self.probe(CommandSpec::new(adb).arg("devices")).await?;
        let serial = parse_device_list(&devices, "device").into_iter().next()?;

        let prop = self
            .probe(
                CommandSpec::new(adb)
                    .args(["-s", serial.as_str()])
                    .args(["shell", "getprop", "ro.product.device"]),
            )
            .await?;
        let codename = prop.trim();
        if codename.is_empty() {
            return None;
        }

        Some(DetectedDevice {
            codename: codename.to_string(),
            serial,
            transport: Transport::Adb,
        })
    }

    async fn detect_fastboot(&self, fastboot: &Path) -> Option<DetectedDevice> {
        let devices = self.probe(CommandSpec::new(fastboot).arg("devices")).await?;
        let serial = parse_device_list(&devices, "fastboot").into_iter().next()?;

        let vars = self
            .probe(
                CommandSpec::new(fastboot)
                    .args(["-s", serial.as_str()])
                    .args(["getvar", "product"]),
            )
            .await?;
        let codename = parse_product(&vars)?;

        Some(DetectedDevice {
            codename,
            serial,
            transport: Transport::Fastboot,
        })
    }

    /// Run a read-only probe; any failure is logged and becomes `None`
    async fn probe(&self, spec: CommandSpec) -> Option<String> {
        match self.runner.run(&spec, self.timeout).await {
            Ok(output) if output.success() => Some(output.combined()),
            Ok(output) => {
                tracing::debug!("Probe '{spec}' failed: {}", output.message());
                None
            }
            Err(e) => {
                tracing::debug!("Probe failed: {e}");
                None
            }
        }
    }
}

fn accepted(device: &DetectedDevice, accept: &impl Fn(&str) -> bool) -> bool {
    let ok = accept(&device.codename);
    if !ok {
        tracing::debug!(
            "Ignoring {} ({} via {})",
            device.codename,
            device.serial,
            device.transport
        );
    }
    ok
}

/// Extract `product: <name>` from fastboot getvar output
fn parse_product(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let (_, value) = line.split_once("product:")?;
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CommandError;
    use crate::test_utils::runner::{Reply, ScriptedRunner};
    use std::path::PathBuf;

    fn tools(with: &[Tool]) -> Toolset {
        Toolset::from_paths(
            with.iter()
                .map(|t| (*t, PathBuf::from(format!("/tools/{t}")))),
        )
    }

    #[test]
    fn test_parse_product() {
        assert_eq!(
            parse_product("product: sailfish\nFinished. Total time: 0.002s\n"),
            Some("sailfish".to_string())
        );
        assert_eq!(
            parse_product("(bootloader) product: walleye\n"),
            Some("walleye".to_string())
        );
        assert_eq!(parse_product("product:\n"), None);
        assert_eq!(parse_product("nothing here"), None);
    }

    #[tokio::test]
    async fn test_detect_over_adb() {
        let runner = ScriptedRunner::new()
            .on("adb devices", Reply::ok("List of devices attached\nABC123\tdevice\n"))
            .on(
                "adb -s ABC123 shell getprop ro.product.device",
                Reply::ok("sailfish\n"),
            );
        let tools = tools(&[Tool::Adb, Tool::Fastboot]);

        let detected = DeviceDetector::new(&runner, &tools, Duration::from_secs(1))
            .detect()
            .await
            .unwrap();
        assert_eq!(detected.codename, "sailfish");
        assert_eq!(detected.serial, "ABC123");
        assert_eq!(detected.transport, Transport::Adb);
        assert!(!runner.was_called("fastboot devices"));
    }

    #[tokio::test]
    async fn test_unauthorized_adb_falls_back_to_fastboot() {
        let runner = ScriptedRunner::new()
            .on("adb devices", Reply::ok("List of devices attached\nABC123\tunauthorized\n"))
            .on("fastboot devices", Reply::ok("FA77\tfastboot\n"))
            .on(
                "fastboot -s FA77 getvar product",
                Reply::with_stderr(0, "product: sailfish\nFinished. Total time: 0.001s\n"),
            );
        let tools = tools(&[Tool::Adb, Tool::Fastboot]);

        let detected = DeviceDetector::new(&runner, &tools, Duration::from_secs(1))
            .detect()
            .await
            .unwrap();
        assert_eq!(detected.codename, "sailfish");
        assert_eq!(detected.transport, Transport::Fastboot);
        assert!(!runner.was_called("adb -s ABC123 shell getprop ro.product.device"));
    }

    #[tokio::test]
    async fn test_hung_adb_does_not_block_fastboot() {
        let runner = ScriptedRunner::new()
            .on("adb devices", Reply::timeout())
            .on("fastboot devices", Reply::ok("FA77\tfastboot\n"))
            .on("fastboot -s FA77 getvar product", Reply::ok("product: gsi\n"));
        let tools = tools(&[Tool::Adb, Tool::Fastboot]);

        let detected = DeviceDetector::new(&runner, &tools, Duration::from_secs(1))
            .detect()
            .await
            .unwrap();
        assert_eq!(detected.codename, "gsi");
    }

    #[tokio::test]
    async fn test_unknown_adb_identity_falls_through_to_fastboot() {
        let runner = ScriptedRunner::new()
            .on("adb devices", Reply::ok("List of devices attached\nHT1\tdevice\n"))
            .on("adb -s HT1 shell getprop ro.product.device", Reply::ok("walleye\n"))
            .on("fastboot devices", Reply::ok("FA77\tfastboot\n"))
            .on("fastboot -s FA77 getvar product", Reply::ok("product: gsi\n"));
        let tools = tools(&[Tool::Adb, Tool::Fastboot]);
        let detector = DeviceDetector::new(&runner, &tools, Duration::from_secs(1));

        let detected = detector.detect_where(|c| c == "gsi").await.unwrap();
        assert_eq!(detected.codename, "gsi");
        assert_eq!(detected.transport, Transport::Fastboot);

        // Unfiltered detection reports the first identity as is
        let detected = detector.detect().await.unwrap();
        assert_eq!(detected.codename, "walleye");
    }

    #[tokio::test]
    async fn test_rejected_everywhere_is_none() {
        let runner = ScriptedRunner::new()
            .on("fastboot devices", Reply::ok("FA77\tfastboot\n"))
            .on("fastboot -s FA77 getvar product", Reply::ok("product: walleye\n"));
        let tools = tools(&[Tool::Fastboot]);

        let detected = DeviceDetector::new(&runner, &tools, Duration::from_secs(1))
            .detect_where(|_| false)
            .await;
        assert!(detected.is_none());
    }

    #[tokio::test]
    async fn test_nothing_attached() {
        let runner = ScriptedRunner::new()
            .on("adb devices", Reply::ok("List of devices attached\n\n"))
            .on("fastboot devices", Reply::ok(""));
        let tools = tools(&[Tool::Adb, Tool::Fastboot]);

        let detector = DeviceDetector::new(&runner, &tools, Duration::from_secs(1));
        assert!(detector.detect().await.is_none());
        // Idempotent: a second call issues the same probes and gives the same answer
        assert!(detector.detect().await.is_none());
        assert_eq!(runner.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_no_tools_no_probes() {
        let runner = ScriptedRunner::new();
        let tools = Toolset::default();

        let detected = DeviceDetector::new(&runner, &tools, Duration::from_secs(1))
            .detect()
            .await;
        assert!(detected.is_none());
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_spawn_failure_is_skipped() {
        let runner = ScriptedRunner::new().on(
            "adb devices",
            Reply::Error(CommandError::Spawn {
                command: "adb devices".to_string(),
                error: "permission denied".to_string(),
            }),
        );
        let tools = tools(&[Tool::Adb]);

        let detected = DeviceDetector::new(&runner, &tools, Duration::from_secs(1))
            .detect()
            .await;
        assert!(detected.is_none());
    }
}
