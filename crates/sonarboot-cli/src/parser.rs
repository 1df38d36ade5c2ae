//! Command-line argument definition.

use clap::Parser;

/// Bootstrap and run a SonarQube analysis.
#[derive(Debug, Parser)]
#[command(name = "sonarboot")]
#[command(about = "Bootstraps the SonarQube scanner and runs an analysis")]
#[command(version)]
pub struct Cli {
    /// Analysis property, repeatable (`-Dsonar.projectKey=my-project`)
    #[arg(short = 'D', long = "define", value_name = "KEY=VALUE")]
    pub define: Vec<String>,

    /// Enable debug output
    #[arg(short = 'X', long = "debug")]
    pub debug: bool,

    /// Use a locally installed SonarScanner CLI instead of downloading one
    /// (only relevant for servers without engine provisioning)
    #[arg(long = "local-scanner-cli")]
    pub local_scanner_cli: bool,

    /// Extra JVM option for the spawned scanner, repeatable
    #[arg(long = "jvm-option", value_name = "OPTION", allow_hyphen_values = true)]
    pub jvm_option: Vec<String>,
}

impl Cli {
    /// The `-D` defines in the `-Dkey=value` shape property resolution
    /// expects.
    pub fn defines(&self) -> Vec<String> {
        self.define.iter().map(|d| format!("-D{d}")).collect()
    }
}
