//! End-to-end property resolution over a real project directory.
//!
//! Exercises the full precedence chain through the public API: defaults,
//! inferred project metadata, environment variables, scan options and CLI
//! defines, plus host resolution and the bootstrap stamps.

use std::fs;

use sonarboot_core::{resolve, EnvMap, OsFamily, Platform, PropertyMap, ScanOptions, ScannerProperty};

fn platform() -> Platform {
    Platform {
        os: OsFamily::Linux,
        arch: "x64".to_string(),
    }
}

fn base_env() -> EnvMap {
    EnvMap::from([("HOME".to_string(), "/home/dev".to_string())])
}

#[test]
fn full_chain_respects_precedence() {
    let project = tempfile::tempdir().unwrap();
    fs::write(
        project.path().join("package.json"),
        r#"{"name": "my-service", "version": "2.0.0"}"#,
    )
    .unwrap();

    let mut env = base_env();
    env.insert(
        "SONAR_SCANNER_JSON_PARAMS".to_string(),
        r#"{"sonar.token":"from-blob","sonar.projectVersion":"from-blob"}"#.to_string(),
    );
    env.insert("SONAR_TOKEN".to_string(), "from-env-var".to_string());
    env.insert("SONAR_HOST_URL".to_string(), "https://sq.example.com".to_string());

    let scan_options = ScanOptions {
        token: Some("from-options".to_string()),
        ..ScanOptions::default()
    };
    let cli = vec!["-Dsonar.projectVersion=from-cli".to_string()];

    let props = resolve(&scan_options, &cli, 42, &env, project.path(), &platform()).unwrap();

    // package.json inference loses to every explicit source
    assert_eq!(props.get("sonar.projectKey"), Some("my-service"));
    assert_eq!(props.get("sonar.projectVersion"), Some("from-cli"));
    // env var beats blob, options beat env
    assert_eq!(props.get_prop(ScannerProperty::SonarToken), Some("from-options"));
    // host resolution ran on the final host URL
    assert_eq!(
        props.get_prop(ScannerProperty::SonarScannerApiBaseUrl),
        Some("https://sq.example.com/api/v2")
    );
    assert_eq!(
        props.get_prop(ScannerProperty::SonarScannerInternalIsSonarCloud),
        Some("false")
    );
}

#[test]
fn bootstrap_stamps_are_not_user_overridable() {
    let project = tempfile::tempdir().unwrap();
    let cli = vec![
        "-Dsonar.scanner.app=evil".to_string(),
        "-Dsonar.scanner.wasJreCacheHit=true".to_string(),
    ];
    let props = resolve(
        &ScanOptions::default(),
        &cli,
        1234,
        &base_env(),
        project.path(),
        &platform(),
    )
    .unwrap();

    assert_eq!(props.get_prop(ScannerProperty::SonarScannerApp), Some("sonarboot"));
    assert_eq!(
        props.get_prop(ScannerProperty::SonarScannerWasJreCacheHit),
        Some("disabled")
    );
    assert_eq!(
        props.get_prop(ScannerProperty::SonarScannerBootstrapStartTime),
        Some("1234")
    );
    assert_eq!(props.get_prop(ScannerProperty::SonarScannerOs), Some("linux"));
    assert_eq!(props.get_prop(ScannerProperty::SonarScannerArch), Some("x64"));
}

#[test]
fn resolution_is_deterministic() {
    let project = tempfile::tempdir().unwrap();
    fs::write(
        project.path().join("sonar-project.properties"),
        "sonar.projectKey=pinned\nsonar.sources=src\n",
    )
    .unwrap();
    let mut env = base_env();
    env.insert("SONAR_ORGANIZATION".to_string(), "acme".to_string());

    let run = || {
        resolve(
            &ScanOptions::default(),
            &["-Dsonar.verbose=true".to_string()],
            7,
            &env,
            project.path(),
            &platform(),
        )
        .unwrap()
    };
    let first: PropertyMap = run();
    let second: PropertyMap = run();
    assert_eq!(first, second);
    assert_eq!(first.to_engine_envelope(), second.to_engine_envelope());
    assert_eq!(first.get("sonar.projectKey"), Some("pinned"));
}

#[test]
fn deprecated_login_is_reconciled_with_token() {
    let project = tempfile::tempdir().unwrap();
    let cli = vec!["-Dsonar.login=legacy-secret".to_string()];
    let props = resolve(
        &ScanOptions::default(),
        &cli,
        0,
        &base_env(),
        project.path(),
        &platform(),
    )
    .unwrap();
    assert_eq!(props.get("sonar.token"), Some("legacy-secret"));
    assert_eq!(props.get("sonar.login"), Some("legacy-secret"));
}

#[test]
fn absent_host_defaults_to_cloud() {
    let project = tempfile::tempdir().unwrap();
    let props = resolve(
        &ScanOptions::default(),
        &[],
        0,
        &base_env(),
        project.path(),
        &platform(),
    )
    .unwrap();
    assert_eq!(
        props.get_prop(ScannerProperty::SonarHostUrl),
        Some("https://sonarcloud.io")
    );
    assert_eq!(
        props.get_prop(ScannerProperty::SonarScannerInternalIsSonarCloud),
        Some("true")
    );
    assert_eq!(
        props.get_prop(ScannerProperty::SonarUserHome),
        Some("/home/dev/.sonar")
    );
}
