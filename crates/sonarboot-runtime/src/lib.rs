//! Bootstrap orchestrator.
//!
//! One bootstrap run is a linear state machine: resolve properties, build
//! the HTTP layer, check whether the server can provision a runtime and
//! engine, then drive either the provisioned path or the legacy CLI path
//! and supervise the resulting child process. Any step's failure aborts
//! the whole run; there are no internal retries.

pub mod engine;
pub mod error;
pub mod scanner_cli;
pub mod version;

use std::path::Path;

use tracing::{debug, error, info};

use sonarboot_core::{EnvMap, Platform, PropertyMap, ScanOptions, ScannerProperty};
use sonarboot_http::{fetch_server_version, HttpClient};

pub use error::BootstrapError;

/// Run one full bootstrap: property resolution through child-process exit.
///
/// `start_timestamp_ms` is the caller-captured wall clock stamped into the
/// properties; `env` and `cwd` are snapshots so resolution stays
/// deterministic.
pub async fn bootstrap(
    scan_options: &ScanOptions,
    cli_args: &[String],
    start_timestamp_ms: i64,
    env: &EnvMap,
    cwd: &Path,
) -> Result<(), BootstrapError> {
    let platform = Platform::current();
    let mut properties = sonarboot_core::resolve(
        scan_options,
        cli_args,
        start_timestamp_ms,
        env,
        cwd,
        &platform,
    )?;

    let result = run(&mut properties, scan_options, &platform).await;
    if let Err(ref e) = result {
        error!("Bootstrap failed: {e}");
    }
    result
}

async fn run(
    properties: &mut PropertyMap,
    scan_options: &ScanOptions,
    platform: &Platform,
) -> Result<(), BootstrapError> {
    let client = HttpClient::from_properties(properties)?;

    if server_supports_provisioning(&client, properties).await? {
        let java = engine::resolve_java(&client, properties).await?;
        let engine_jar = sonarboot_cache::fetch_engine(&client, properties).await?;
        engine::run_engine(&java, &engine_jar, properties, &scan_options.jvm_options).await
    } else {
        info!("Server does not support provisioning, using the SonarScanner CLI");
        let bin_path = if scan_options.local_scanner_cli {
            scanner_cli::find_local_scanner()?
        } else {
            scanner_cli::provision_scanner_cli(properties, platform).await?
        };
        scanner_cli::run_scanner_cli(&bin_path, properties, &scan_options.jvm_options).await
    }
}

/// Capability check: the cloud service always provisions; a self-managed
/// server must report a version at or above the provisioning threshold.
async fn server_supports_provisioning(
    client: &HttpClient,
    properties: &PropertyMap,
) -> Result<bool, BootstrapError> {
    if properties.is_true(ScannerProperty::SonarScannerInternalIsSonarCloud) {
        debug!("Cloud target, provisioning always supported");
        return Ok(true);
    }
    let raw = fetch_server_version(client).await?;
    info!("Server version: {raw}");
    version::supports_provisioning(&raw)
}
