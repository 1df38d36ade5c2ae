//! CLI entry point.
//!
//! Thin composition root: parse arguments, initialize logging, capture the
//! environment snapshot and hand everything to the orchestrator. The exit
//! code propagates the wrapped tool's failure code when there is one.

mod parser;

use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use sonarboot_core::{EnvMap, ScanOptions};
use sonarboot_runtime::{bootstrap, BootstrapError};

use crate::parser::Cli;

fn init_tracing(debug: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(if debug { "debug" } else { "info" }));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let start_timestamp_ms = chrono::Utc::now().timestamp_millis();
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let scan_options = ScanOptions {
        verbose: cli.debug.then_some(true),
        local_scanner_cli: cli.local_scanner_cli,
        jvm_options: cli.jvm_option.clone(),
        ..ScanOptions::default()
    };

    let env: EnvMap = std::env::vars().collect();
    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(e) => {
            error!("Cannot determine the working directory: {e}");
            return ExitCode::FAILURE;
        }
    };

    match bootstrap(
        &scan_options,
        &cli.defines(),
        start_timestamp_ms,
        &env,
        &cwd,
    )
    .await
    {
        Ok(()) => ExitCode::SUCCESS,
        Err(BootstrapError::Execution { code, .. }) => {
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
        Err(_) => ExitCode::FAILURE,
    }
}
