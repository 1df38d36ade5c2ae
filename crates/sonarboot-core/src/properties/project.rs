//! Project metadata inference.
//!
//! A project-local `sonar-project.properties` file is authoritative when it
//! exists: none of the package.json-derived defaults are applied on top of
//! it. Otherwise project key, links, coverage report paths and exclusions
//! are inferred from `package.json`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::{info, warn};

/// Filename of the authoritative project configuration file.
pub const SONAR_PROJECT_FILENAME: &str = "sonar-project.properties";

/// Characters stripped from a package name when deriving the project key.
const PROJECT_KEY_INVALID_CHARS: &[char] = &[
    '?', '$', '*', '+', '~', '.', '(', ')', '\'', '"', '!', ':', '@', '/',
];

/// Infer project-level properties from the project base directory.
pub(super) fn infer_project_properties(
    base_dir: &Path,
    base_exclusions: &str,
) -> BTreeMap<String, String> {
    if let Some(props) = sonar_file_properties(base_dir) {
        return props;
    }

    let mut props = BTreeMap::from([
        (
            "sonar.projectDescription".to_string(),
            "No description.".to_string(),
        ),
        ("sonar.sources".to_string(), ".".to_string()),
    ]);
    props.extend(package_json_properties(base_dir, base_exclusions));
    props
}

/// Parse `sonar-project.properties` (INI-like `key=value`, `#` comments),
/// or `None` if the file is absent or unreadable.
fn sonar_file_properties(base_dir: &Path) -> Option<BTreeMap<String, String>> {
    let path = base_dir.join(SONAR_PROJECT_FILENAME);
    let data = match fs::read_to_string(&path) {
        Ok(data) => data,
        Err(e) => {
            if path.exists() {
                warn!("Failed to read {SONAR_PROJECT_FILENAME} file: {e}");
            }
            return None;
        }
    };

    let mut props = BTreeMap::new();
    for line in data.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            props.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    Some(props)
}

/// Derive properties from `package.json`: project identity, links, coverage
/// report paths and the exclusion list.
fn package_json_properties(base_dir: &Path, base_exclusions: &str) -> BTreeMap<String, String> {
    let package_file = base_dir.join("package.json");
    let data = match fs::read_to_string(&package_file) {
        Ok(data) => data,
        Err(_) => {
            info!("Unable to read \"package.json\" file");
            return BTreeMap::from([(
                "sonar.exclusions".to_string(),
                base_exclusions.to_string(),
            )]);
        }
    };
    let pkg: serde_json::Value = match serde_json::from_str(&data) {
        Ok(pkg) => pkg,
        Err(e) => {
            warn!("Failed to parse \"package.json\" file: {e}");
            return BTreeMap::from([(
                "sonar.exclusions".to_string(),
                base_exclusions.to_string(),
            )]);
        }
    };
    info!("Retrieving info from \"package.json\" file");

    let mut props = BTreeMap::new();
    if let Some(name) = pkg["name"].as_str() {
        props.insert("sonar.projectKey".to_string(), slugify_project_key(name));
        props.insert("sonar.projectName".to_string(), name.to_string());
    }
    if let Some(version) = pkg["version"].as_str() {
        props.insert("sonar.projectVersion".to_string(), version.to_string());
    }
    if let Some(description) = pkg["description"].as_str() {
        props.insert("sonar.projectDescription".to_string(), description.to_string());
    }
    if let Some(homepage) = pkg["homepage"].as_str() {
        props.insert("sonar.links.homepage".to_string(), homepage.to_string());
    }
    if let Some(bugs) = pkg["bugs"]["url"].as_str() {
        props.insert("sonar.links.issue".to_string(), bugs.to_string());
    }
    if let Some(scm) = pkg["repository"]["url"].as_str() {
        props.insert("sonar.links.scm".to_string(), scm.to_string());
    }

    let mut exclusions = base_exclusions.to_string();
    let mut lcov_report_path: Option<String> = None;
    for dir in coverage_directories(&pkg) {
        let report_path = format!("{dir}/lcov.info");
        if base_dir.join(&report_path).exists() {
            if !exclusions.is_empty() {
                exclusions.push(',');
            }
            exclusions.push_str(&format!("{dir}/**"));
            if lcov_report_path.is_none() {
                lcov_report_path = Some(report_path);
            }
        }
    }
    props.insert("sonar.exclusions".to_string(), exclusions);
    if let Some(report_path) = lcov_report_path {
        props.insert("sonar.javascript.lcov.reportPaths".to_string(), report_path);
    }

    if dependency_exists(&pkg, "mocha-sonarqube-reporter") && base_dir.join("xunit.xml").exists() {
        props.insert(
            "sonar.testExecutionReportPaths".to_string(),
            "xunit.xml".to_string(),
        );
    }

    props
}

/// Candidate coverage output directories: configured nyc and jest
/// directories first, then the conventional `coverage` default,
/// de-duplicated preserving order.
fn coverage_directories(pkg: &serde_json::Value) -> Vec<String> {
    let mut dirs = Vec::new();
    for candidate in [
        pkg["nyc"]["report-dir"].as_str(),
        pkg["jest"]["coverageDirectory"].as_str(),
        Some("coverage"),
    ]
    .into_iter()
    .flatten()
    {
        if !dirs.iter().any(|existing| existing == candidate) {
            dirs.push(candidate.to_string());
        }
    }
    dirs
}

fn dependency_exists(pkg: &serde_json::Value, name: &str) -> bool {
    ["devDependencies", "dependencies", "peerDependencies"]
        .iter()
        .any(|section| pkg[section].get(name).is_some())
}

/// Slugified project key: shell-unsafe characters stripped, whitespace
/// collapsed to dashes.
fn slugify_project_key(name: &str) -> String {
    name.trim()
        .chars()
        .filter(|c| !PROJECT_KEY_INVALID_CHARS.contains(c))
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .collect()
}
