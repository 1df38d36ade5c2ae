//! Operating system and CPU architecture probe.
//!
//! The probe is a pure function of the injected os-release reader, so tests
//! can simulate any distribution. Alpine is detected separately because the
//! provisioned JRE builds for musl differ from glibc Linux builds.

use std::fs;
use std::path::Path;

/// Operating system family as the provisioning endpoints understand it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Linux,
    /// Linux on musl libc, served a dedicated JRE build.
    Alpine,
    Windows,
    Macos,
}

impl OsFamily {
    /// Value used for `sonar.scanner.os` and the JRE metadata query.
    pub fn as_str(self) -> &'static str {
        match self {
            OsFamily::Linux => "linux",
            OsFamily::Alpine => "alpine",
            OsFamily::Windows => "windows",
            OsFamily::Macos => "macos",
        }
    }

    /// Platform token used in legacy scanner-CLI archive filenames.
    pub fn cli_platform_name(self) -> &'static str {
        match self {
            OsFamily::Windows => "windows",
            OsFamily::Linux | OsFamily::Alpine => "linux",
            OsFamily::Macos => "macosx",
        }
    }
}

/// Detected OS family and normalized CPU architecture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: OsFamily,
    pub arch: String,
}

impl Platform {
    /// Probe the running system.
    pub fn current() -> Self {
        Self {
            os: detect_os(read_os_release),
            arch: normalize_arch(std::env::consts::ARCH),
        }
    }
}

/// Map Rust's architecture names onto the values the server endpoints use.
pub fn normalize_arch(arch: &str) -> String {
    match arch {
        "x86_64" => "x64".to_string(),
        "aarch64" => "arm64".to_string(),
        other => other.to_string(),
    }
}

/// Detect the OS family, distinguishing Alpine from other Linux distributions.
///
/// `read_release` is handed the candidate os-release paths in order and
/// returns the file content of the first one it can read.
pub fn detect_os(read_release: impl Fn(&Path) -> Option<String>) -> OsFamily {
    if cfg!(target_os = "windows") {
        OsFamily::Windows
    } else if cfg!(target_os = "macos") {
        OsFamily::Macos
    } else if is_alpine(read_release) {
        OsFamily::Alpine
    } else {
        OsFamily::Linux
    }
}

fn read_os_release(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok()
}

fn is_alpine(read_release: impl Fn(&Path) -> Option<String>) -> bool {
    let content = read_release(Path::new("/etc/os-release"))
        .or_else(|| read_release(Path::new("/usr/lib/os-release")));
    let Some(content) = content else {
        tracing::warn!("Failed to read /etc/os-release or /usr/lib/os-release");
        return false;
    };
    content
        .lines()
        .filter_map(|line| line.strip_prefix("ID="))
        .any(|id| id.trim().trim_matches('"') == "alpine")
}
