//! romflash CLI
//!
//! Entry point for the romflash command-line application.

use clap::Parser;
use std::process::ExitCode;

use romflash::cli::output::display_error;
use romflash::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            display_error(&e);
            ExitCode::FAILURE
        }
    }
}
