//! `romflash <firmware>`
//!
//! Runs the orchestrator with a console observer that shows progress, prints
//! the device's instructions and asks for confirmation unless `--yes`.

use anyhow::{Context as _, Result};
use indicatif::ProgressBar;
use std::io::{self, IsTerminal, Write};
use std::path::Path;

use crate::cli::output::{create_spinner, format_instructions, format_report, status};
use crate::cli::{Cli, Context};
use crate::core::orchestrator::{DeviceTarget, FlashObserver, FlashOptions, FlashOrchestrator};
use crate::core::plan::{FlashPlan, PlanOptions};
use crate::core::registry::DeviceProfile;
use crate::core::report::FlashState;
use crate::core::settings::RunConfig;
use crate::infra::process::SystemRunner;

/// Flash `firmware`; returns whether the run succeeded
pub async fn execute(context: &Context, cli: &Cli, firmware: &Path) -> Result<bool> {
    let report_dir = cli
        .report_dir
        .clone()
        .unwrap_or_else(|| context.settings.report_dir(&context.dirs));
    let mut config = RunConfig::from_settings(&context.settings, &context.dirs);
    // Backups go wherever the report goes
    config.backup_dir.clone_from(&report_dir);
    for (tool, path) in config.tools.iter() {
        tracing::debug!("Using {tool}: {}", path.display());
    }

    let target = match &cli.device {
        Some(codename) => DeviceTarget::Codename(codename.clone()),
        None => DeviceTarget::Auto,
    };
    let options = FlashOptions {
        plan: PlanOptions {
            slots: cli.slot.into(),
            wipe_data: cli.wipe_data,
        },
        serial: cli.serial.clone(),
        backup: !cli.no_backup,
    };

    let observer = ConsoleObserver::new(cli.yes, cli.json);
    let runner = SystemRunner;
    let mut orchestrator = FlashOrchestrator::new(&context.registry, &config, &runner, &observer);
    let report = orchestrator.flash(&target, firmware, &options).await;
    observer.finish();

    let report_path = match report.write_to_dir(&report_dir) {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::warn!("Could not write report: {e}");
            None
        }
    };

    if cli.json {
        let text = report.to_json().context("Failed to serialize report")?;
        println!("{text}");
    } else {
        eprint!("{}", format_report(&report, report_path.as_deref()));
    }

    Ok(report.succeeded())
}

/// Console front end for the orchestrator
struct ConsoleObserver {
    spinner: ProgressBar,
    yes: bool,
    quiet: bool,
}

impl ConsoleObserver {
    fn new(yes: bool, json: bool) -> Self {
        let spinner = if json {
            ProgressBar::hidden()
        } else {
            create_spinner("Checking prerequisites...")
        };
        Self {
            spinner,
            yes,
            quiet: json,
        }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }

    fn ask(&self, profile: &DeviceProfile, plan: &FlashPlan) -> io::Result<bool> {
        eprintln!();
        eprintln!(
            "{}  WARNING: This will overwrite {} partition(s) on {}!",
            status::WARNING,
            plan.len(),
            profile.display_name()
        );
        eprintln!("   This operation may cause data loss!");
        eprintln!();
        eprint!("   Are you sure you want to continue? [y/N] ");
        io::stderr().flush()?;

        // No TTY means nobody can answer
        if !io::stdin().is_terminal() {
            eprintln!();
            eprintln!(
                "{} Cannot prompt for confirmation in non-interactive mode. Use --yes to skip confirmation.",
                status::ERROR
            );
            return Ok(false);
        }

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim().to_lowercase();
        Ok(input == "y" || input == "yes")
    }
}

impl FlashObserver for ConsoleObserver {
    fn state_changed(&self, state: FlashState) {
        let message = match state {
            FlashState::PrerequisitesChecked => "Preparing firmware package...",
            FlashState::PackagePrepared => "Building flash plan...",
            FlashState::PlanBuilt => "Waiting for confirmation...",
            FlashState::Executing => "Flashing...",
            FlashState::Idle | FlashState::Succeeded | FlashState::Failed => return,
        };
        self.spinner.set_message(message);
    }

    fn show_instructions(&self, profile: &DeviceProfile) {
        // Whoever answers the prompt must see them, JSON or not
        if self.quiet && self.yes {
            return;
        }
        self.spinner
            .suspend(|| eprint!("{}", format_instructions(profile)));
    }

    fn confirm(&self, profile: &DeviceProfile, plan: &FlashPlan) -> bool {
        if self.yes {
            return true;
        }
        self.spinner
            .suspend(|| self.ask(profile, plan))
            .unwrap_or_else(|e| {
                tracing::error!("Failed to read confirmation: {e}");
                false
            })
    }

    fn step_started(&self, partitions: &[String]) {
        self.spinner
            .set_message(format!("Flashing {}...", partitions.join(", ")));
    }
}
