//! Legacy scanner-CLI path.
//!
//! Used when the server cannot provision an engine: either find a scanner
//! already on the search path, or download the CLI distribution from the
//! public mirror and install it under the user's sonar directory.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use semver::Version;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, error, info};
use url::Url;

use sonarboot_core::{
    is_scanner_env_key, Platform, PropertyMap, ScannerProperty, LEGACY_SCANNER_PARAMS_ENV,
};
use sonarboot_http::proxy::proxy_java_options;
use sonarboot_http::{HttpClient, HttpError};

use crate::error::BootstrapError;
use crate::version::coerce_version;

/// Mirror used when `sonar.scanner.mirror` is not configured.
const SCANNER_CLI_MIRROR_DEFAULT: &str =
    "https://binaries.sonarsource.com/Distribution/sonar-scanner-cli/";

/// Install subdirectory under `sonar.userHome`.
const SCANNER_CLI_INSTALL_DIR: &str = "native-sonar-scanner";

/// First CLI version whose distribution filenames carry an arch suffix.
const ARCH_SUFFIX_MIN_VERSION: Version = Version::new(6, 1, 0);

const CLI_TOOL_NAME: &str = "SonarScanner CLI";

/// Filenames and paths of one CLI distribution install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliLayout {
    /// Distribution archive name on the mirror.
    pub archive_name: String,
    /// Top-level directory inside the archive.
    pub dir_name: String,
    /// Installed launcher script, relative to the install root.
    pub bin_path: PathBuf,
}

/// Compute the distribution layout for a CLI version on this platform.
pub fn cli_layout(version: &str, platform: &Platform) -> Result<CliLayout, BootstrapError> {
    if version.is_empty() || !version.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return Err(BootstrapError::InvalidCliVersion(version.to_string()));
    }
    let platform_name = platform.os.cli_platform_name();
    let suffix = match coerce_version(version) {
        Some(v) if v >= ARCH_SUFFIX_MIN_VERSION => format!("-{}", platform.arch),
        _ => String::new(),
    };
    let bin_ext = if platform_name == "windows" { ".bat" } else { "" };
    let dir_name = format!("sonar-scanner-{version}-{platform_name}{suffix}");
    Ok(CliLayout {
        archive_name: format!("sonar-scanner-cli-{version}-{platform_name}{suffix}.zip"),
        bin_path: Path::new(&dir_name)
            .join("bin")
            .join(format!("sonar-scanner{bin_ext}")),
        dir_name,
    })
}

/// Find a locally installed scanner on the search path. Absence is fatal.
pub fn find_local_scanner() -> Result<PathBuf, BootstrapError> {
    info!("Trying to find a local install of the SonarScanner CLI");
    which::which("sonar-scanner").map_err(|source| BootstrapError::ExecutableNotFound {
        executable: "sonar-scanner".to_string(),
        source,
    })
}

/// Ensure the CLI distribution is installed under
/// `<sonar.userHome>/native-sonar-scanner` and return the launcher path.
/// An already-installed launcher short-circuits the download.
pub async fn provision_scanner_cli(
    properties: &PropertyMap,
    platform: &Platform,
) -> Result<PathBuf, BootstrapError> {
    let version = properties
        .get_prop(ScannerProperty::SonarScannerCliVersion)
        .unwrap_or_default();
    let layout = cli_layout(version, platform)?;

    let user_home = properties
        .get_prop(ScannerProperty::SonarUserHome)
        .unwrap_or_default();
    let install_root = Path::new(user_home).join(SCANNER_CLI_INSTALL_DIR);
    let bin_path = install_root.join(&layout.bin_path);
    if bin_path.exists() {
        info!("SonarScanner CLI already installed at {}", bin_path.display());
        return Ok(bin_path);
    }

    let mirror = properties
        .get_prop(ScannerProperty::SonarScannerCliMirror)
        .filter(|m| !m.is_empty())
        .unwrap_or(SCANNER_CLI_MIRROR_DEFAULT);
    let url = mirror_url(mirror, &layout.archive_name)?;

    std::fs::create_dir_all(&install_root)?;
    let archive_path = install_root.join(&layout.archive_name);
    info!("Downloading SonarScanner CLI from {url}");
    let client = mirror_client(properties, mirror)?;
    client.download(&url, &archive_path).await.map_err(BootstrapError::Http)?;

    info!("Extracting SonarScanner CLI archive");
    sonarboot_cache::archive::extract(&archive_path, &install_root)?;
    std::fs::remove_file(&archive_path)?;

    #[cfg(unix)]
    if bin_path.exists() {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&bin_path, std::fs::Permissions::from_mode(0o755))?;
    }

    Ok(bin_path)
}

fn mirror_url(mirror: &str, archive_name: &str) -> Result<Url, BootstrapError> {
    let base = Url::parse(&format!("{}/", mirror.trim_end_matches('/')))
        .map_err(|e| BootstrapError::Http(HttpError::InvalidUrl(e)))?;
    base.join(archive_name)
        .map_err(|e| BootstrapError::Http(HttpError::InvalidUrl(e)))
}

/// HTTP client for the public mirror: keeps the proxy, timeout and TLS
/// trust configuration but never the server token.
fn mirror_client(properties: &PropertyMap, mirror: &str) -> Result<HttpClient, BootstrapError> {
    let mut mirror_props = PropertyMap::new();
    mirror_props.set_prop(ScannerProperty::SonarHostUrl, mirror);
    mirror_props.set_prop(ScannerProperty::SonarScannerApiBaseUrl, mirror);
    for prop in [
        ScannerProperty::SonarScannerProxyHost,
        ScannerProperty::SonarScannerProxyPort,
        ScannerProperty::SonarScannerProxyUser,
        ScannerProperty::SonarScannerProxyPassword,
        ScannerProperty::SonarScannerResponseTimeout,
        ScannerProperty::SonarScannerTruststorePath,
        ScannerProperty::SonarScannerTruststorePassword,
    ] {
        if let Some(value) = properties.get_prop(prop) {
            mirror_props.set_prop(prop, value.to_string());
        }
    }
    HttpClient::from_properties(&mirror_props).map_err(BootstrapError::Http)
}

/// Run the legacy CLI and supervise it to completion.
///
/// The child gets a filtered environment: every variable the bootstrapper
/// itself consumes is dropped, and the resolved properties travel as one
/// serialized JSON variable instead.
pub async fn run_scanner_cli(
    bin_path: &Path,
    properties: &PropertyMap,
    jvm_options: &[String],
) -> Result<(), BootstrapError> {
    info!("Starting analysis");
    let mut args: Vec<String> = jvm_options.to_vec();
    args.extend(proxy_java_options(properties));
    debug!(
        "Running {} {}",
        bin_path.display(),
        args.join(" ")
    );

    let mut cmd = Command::new(bin_path);
    cmd.args(&args);
    for (name, _) in std::env::vars() {
        if is_scanner_env_key(&name) {
            cmd.env_remove(&name);
        }
    }
    cmd.env(LEGACY_SCANNER_PARAMS_ENV, properties.to_json_object());
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    let mut child = cmd.spawn()?;
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let forward_stdout = async {
        if let Some(out) = stdout {
            let mut lines = BufReader::new(out).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                info!("{line}");
            }
        }
    };
    let forward_stderr = async {
        if let Some(err) = stderr {
            let mut lines = BufReader::new(err).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                error!("{line}");
            }
        }
    };

    let (status, (), ()) = tokio::join!(child.wait(), forward_stdout, forward_stderr);
    let status = status?;
    match status.code() {
        Some(0) => {
            info!("SonarScanner CLI finished successfully");
            Ok(())
        }
        Some(code) => Err(BootstrapError::Execution {
            tool: CLI_TOOL_NAME.to_string(),
            code,
        }),
        None => Err(BootstrapError::Interrupted {
            tool: CLI_TOOL_NAME.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonarboot_core::OsFamily;

    fn linux_x64() -> Platform {
        Platform {
            os: OsFamily::Linux,
            arch: "x64".to_string(),
        }
    }

    #[test]
    fn modern_versions_carry_the_arch_suffix() {
        let layout = cli_layout("6.1.0.4477", &linux_x64()).unwrap();
        assert_eq!(layout.archive_name, "sonar-scanner-cli-6.1.0.4477-linux-x64.zip");
        assert_eq!(layout.dir_name, "sonar-scanner-6.1.0.4477-linux-x64");
        assert_eq!(
            layout.bin_path,
            Path::new("sonar-scanner-6.1.0.4477-linux-x64/bin/sonar-scanner")
        );
    }

    #[test]
    fn older_versions_have_no_arch_suffix() {
        let layout = cli_layout("5.0.1.3006", &linux_x64()).unwrap();
        assert_eq!(layout.archive_name, "sonar-scanner-cli-5.0.1.3006-linux.zip");
    }

    #[test]
    fn windows_launcher_uses_bat_extension() {
        let platform = Platform {
            os: OsFamily::Windows,
            arch: "x64".to_string(),
        };
        let layout = cli_layout("6.2.0.1", &platform).unwrap();
        assert!(layout.bin_path.ends_with("bin/sonar-scanner.bat"));
        assert!(layout.archive_name.contains("-windows-x64"));
    }

    #[test]
    fn alpine_maps_to_the_linux_distribution() {
        let platform = Platform {
            os: OsFamily::Alpine,
            arch: "x64".to_string(),
        };
        let layout = cli_layout("6.1.0.4477", &platform).unwrap();
        assert!(layout.archive_name.contains("-linux-x64"));
    }

    #[test]
    fn non_numeric_version_is_rejected() {
        let err = cli_layout("6.1.0-beta", &linux_x64()).unwrap_err();
        assert!(matches!(err, BootstrapError::InvalidCliVersion(_)));
        let err = cli_layout("", &linux_x64()).unwrap_err();
        assert!(matches!(err, BootstrapError::InvalidCliVersion(_)));
    }

    #[test]
    fn mirror_url_joins_with_or_without_trailing_slash() {
        let a = mirror_url("https://mirror.example.com/dist", "file.zip").unwrap();
        let b = mirror_url("https://mirror.example.com/dist/", "file.zip").unwrap();
        assert_eq!(a.as_str(), "https://mirror.example.com/dist/file.zip");
        assert_eq!(a, b);
    }
}
