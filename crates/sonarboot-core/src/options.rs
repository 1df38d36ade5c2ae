//! Caller-facing scan options.
//!
//! This is the programmatic surface: embedders build a [`ScanOptions`] and
//! hand it to the orchestrator; the CLI binary constructs one from argv.

use std::collections::BTreeMap;

/// Options supplied by the embedding application or CLI.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Server URL (`sonar.host.url`).
    pub server_url: Option<String>,
    /// Authentication token (`sonar.token`).
    pub token: Option<String>,
    /// Verbose analysis output (`sonar.verbose`).
    pub verbose: Option<bool>,
    /// Explicit property overrides, merged above environment-derived ones.
    pub options: BTreeMap<String, String>,
    /// Use a locally installed scanner CLI instead of downloading one.
    pub local_scanner_cli: bool,
    /// Extra JVM options passed to the spawned scanner process.
    pub jvm_options: Vec<String>,
}
