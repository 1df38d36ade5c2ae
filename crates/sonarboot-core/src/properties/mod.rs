//! Scanner property model and resolution engine.
//!
//! Properties are dot-namespaced string keys merged from many overlapping
//! sources under a strict precedence law: defaults < inferred project
//! metadata < proxy environment inference < environment variables <
//! scan options < CLI `-D` arguments < bootstrap-only properties.
//!
//! Resolution is deterministic: the same inputs always produce the same
//! map, and all environment access goes through an immutable snapshot.

mod env;
mod project;

pub use env::{is_scanner_env_key, LEGACY_SCANNER_PARAMS_ENV};

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tracing::warn;

use crate::error::PropertyError;
use crate::host::get_host_properties;
use crate::options::ScanOptions;
use crate::platform::Platform;
use crate::{BOOTSTRAPPER_APP_NAME, BOOTSTRAPPER_APP_VERSION, SONAR_DIR_DEFAULT};

/// Immutable snapshot of the process environment.
pub type EnvMap = BTreeMap<String, String>;

/// Exclusion globs applied when the project has no explicit configuration.
pub const DEFAULT_SONAR_EXCLUSIONS: &str =
    "node_modules/**,bower_components/**,jspm_packages/**,typings/**,lib-cov/**";

/// Scanner CLI version downloaded when the server cannot provision an engine.
pub const SCANNER_CLI_DEFAULT_VERSION: &str = "6.1.0.4477";

/// Deprecated property aliases, `(old, new)`. When both are set the new key
/// wins and is copied back onto the old one so the pair stays consistent.
const DEPRECATED_PROPERTY_PAIRS: &[(&str, &str)] = &[("sonar.login", "sonar.token")];

/// Value of the cache-hit telemetry properties until the acquisition
/// pipeline runs (it may never run, e.g. on the legacy CLI path).
pub const CACHE_STATUS_DISABLED: &str = "disabled";

/// Closed enumeration of the property keys the bootstrapper itself reads or
/// writes. Unknown keys pass through opaquely to the analysis engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannerProperty {
    SonarVerbose,
    SonarToken,
    SonarRegion,
    SonarExclusions,
    SonarHostUrl,
    SonarUserHome,
    SonarOrganization,
    SonarProjectBaseDir,
    SonarScannerApiBaseUrl,
    SonarScannerOs,
    SonarScannerArch,
    SonarScannerSonarCloudUrl,
    SonarScannerJavaExePath,
    SonarScannerJavaOpts,
    SonarScannerWasJreCacheHit,
    SonarScannerWasEngineCacheHit,
    SonarScannerProxyHost,
    SonarScannerProxyPort,
    SonarScannerProxyUser,
    SonarScannerProxyPassword,
    SonarScannerResponseTimeout,
    SonarScannerSkipJreProvisioning,
    SonarScannerInternalDumpToFile,
    SonarScannerTruststorePath,
    SonarScannerTruststorePassword,
    SonarScannerKeystorePath,
    SonarScannerKeystorePassword,
    SonarScannerInternalIsSonarCloud,
    SonarScannerCliVersion,
    SonarScannerCliMirror,
    SonarScannerApp,
    SonarScannerAppVersion,
    SonarScannerBootstrapStartTime,
}

impl ScannerProperty {
    /// The dot-namespaced key as the analysis engine expects it.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SonarVerbose => "sonar.verbose",
            Self::SonarToken => "sonar.token",
            Self::SonarRegion => "sonar.region",
            Self::SonarExclusions => "sonar.exclusions",
            Self::SonarHostUrl => "sonar.host.url",
            Self::SonarUserHome => "sonar.userHome",
            Self::SonarOrganization => "sonar.organization",
            Self::SonarProjectBaseDir => "sonar.projectBaseDir",
            Self::SonarScannerApiBaseUrl => "sonar.scanner.apiBaseUrl",
            Self::SonarScannerOs => "sonar.scanner.os",
            Self::SonarScannerArch => "sonar.scanner.arch",
            Self::SonarScannerSonarCloudUrl => "sonar.scanner.sonarcloudUrl",
            Self::SonarScannerJavaExePath => "sonar.scanner.javaExePath",
            Self::SonarScannerJavaOpts => "sonar.scanner.javaOpts",
            Self::SonarScannerWasJreCacheHit => "sonar.scanner.wasJreCacheHit",
            Self::SonarScannerWasEngineCacheHit => "sonar.scanner.wasEngineCacheHit",
            Self::SonarScannerProxyHost => "sonar.scanner.proxyHost",
            Self::SonarScannerProxyPort => "sonar.scanner.proxyPort",
            Self::SonarScannerProxyUser => "sonar.scanner.proxyUser",
            Self::SonarScannerProxyPassword => "sonar.scanner.proxyPassword",
            Self::SonarScannerResponseTimeout => "sonar.scanner.responseTimeout",
            Self::SonarScannerSkipJreProvisioning => "sonar.scanner.skipJreProvisioning",
            Self::SonarScannerInternalDumpToFile => "sonar.scanner.internal.dumpToFile",
            Self::SonarScannerTruststorePath => "sonar.scanner.truststorePath",
            Self::SonarScannerTruststorePassword => "sonar.scanner.truststorePassword",
            Self::SonarScannerKeystorePath => "sonar.scanner.keystorePath",
            Self::SonarScannerKeystorePassword => "sonar.scanner.keystorePassword",
            Self::SonarScannerInternalIsSonarCloud => "sonar.scanner.internal.isSonarCloud",
            Self::SonarScannerCliVersion => "sonar.scanner.version",
            Self::SonarScannerCliMirror => "sonar.scanner.mirror",
            Self::SonarScannerApp => "sonar.scanner.app",
            Self::SonarScannerAppVersion => "sonar.scanner.appVersion",
            Self::SonarScannerBootstrapStartTime => "sonar.scanner.bootstrapStartTime",
        }
    }
}

/// Entry of the JSON envelope written to the engine's stdin.
#[derive(Debug, Serialize)]
struct PropertyEntry<'a> {
    key: &'a str,
    value: &'a str,
}

/// Resolved scanner properties.
///
/// Backed by an ordered map so iteration (and therefore every serialized
/// form) is deterministic for identical inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyMap {
    inner: BTreeMap<String, String>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner.get(key).map(String::as_str)
    }

    pub fn get_prop(&self, prop: ScannerProperty) -> Option<&str> {
        self.get(prop.as_str())
    }

    /// Value of a boolean-ish property; anything but `"true"` is false.
    pub fn is_true(&self, prop: ScannerProperty) -> bool {
        self.get_prop(prop) == Some("true")
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.inner.insert(key.into(), value.into());
    }

    pub fn set_prop(&mut self, prop: ScannerProperty, value: impl Into<String>) {
        self.set(prop.as_str(), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Merge `other` on top of `self`; colliding keys take `other`'s value.
    fn merge(&mut self, other: BTreeMap<String, String>) {
        self.inner.extend(other);
    }

    /// Properties as a flat JSON object, the shape the legacy scanner CLI
    /// reads from `SONARQUBE_SCANNER_PARAMS`.
    pub fn to_json_object(&self) -> String {
        serde_json::to_string(&self.inner).unwrap_or_else(|_| "{}".to_string())
    }

    /// The `{"scannerProperties": [{key, value}...]}` envelope written to
    /// the provisioned engine's stdin.
    pub fn to_engine_envelope(&self) -> String {
        #[derive(Serialize)]
        struct Envelope<'a> {
            #[serde(rename = "scannerProperties")]
            scanner_properties: Vec<PropertyEntry<'a>>,
        }
        let envelope = Envelope {
            scanner_properties: self
                .inner
                .iter()
                .map(|(key, value)| PropertyEntry { key, value })
                .collect(),
        };
        serde_json::to_string(&envelope).unwrap_or_else(|_| "{\"scannerProperties\":[]}".to_string())
    }
}

impl FromIterator<(String, String)> for PropertyMap {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

/// Resolve the full property map for one bootstrap invocation.
///
/// Pure given its inputs: `env` is a snapshot, `cwd` the fallback project
/// base dir, `platform` the probed OS/arch. File reads are confined to the
/// resolved project base dir (and the os-release probe done by the caller).
pub fn resolve(
    scan_options: &ScanOptions,
    cli_args: &[String],
    start_timestamp_ms: i64,
    env: &EnvMap,
    cwd: &Path,
    platform: &Platform,
) -> Result<PropertyMap, PropertyError> {
    let cli_props = cli_properties(cli_args)?;
    let option_props = scan_options_properties(scan_options);
    let env_props = env::environment_properties(env);

    // The project base dir follows the same precedence as the final merge.
    let base_dir_key = ScannerProperty::SonarProjectBaseDir.as_str();
    let project_base_dir = cli_props
        .get(base_dir_key)
        .or_else(|| option_props.get(base_dir_key))
        .or_else(|| env_props.get(base_dir_key))
        .cloned()
        .unwrap_or_else(|| cwd.to_string_lossy().into_owned());

    let exclusions_key = ScannerProperty::SonarExclusions.as_str();
    let base_exclusions = cli_props
        .get(exclusions_key)
        .or_else(|| option_props.get(exclusions_key))
        .or_else(|| env_props.get(exclusions_key))
        .cloned()
        .unwrap_or_else(|| DEFAULT_SONAR_EXCLUSIONS.to_string());

    let inferred = project::infer_project_properties(Path::new(&project_base_dir), &base_exclusions);

    let mut properties = PropertyMap::new();
    properties.merge(default_properties(env, platform));
    properties.merge(inferred);
    properties.merge(env_props);
    properties.merge(option_props);
    properties.merge(cli_props);

    // Proxy environment variables only ever fill gaps left by explicit
    // configuration.
    let host_url = properties
        .get_prop(ScannerProperty::SonarHostUrl)
        .unwrap_or("")
        .to_string();
    for (key, value) in env::proxy_environment_defaults(env, &host_url) {
        if properties.get(&key).is_none() {
            properties.set(key, value);
        }
    }

    hotfix_deprecated_properties(&mut properties);

    // Bootstrap-only properties are stamped last and win over every source.
    properties.set_prop(ScannerProperty::SonarScannerApp, BOOTSTRAPPER_APP_NAME);
    properties.set_prop(
        ScannerProperty::SonarScannerAppVersion,
        BOOTSTRAPPER_APP_VERSION,
    );
    properties.set_prop(
        ScannerProperty::SonarScannerBootstrapStartTime,
        start_timestamp_ms.to_string(),
    );
    properties.set_prop(
        ScannerProperty::SonarScannerWasJreCacheHit,
        CACHE_STATUS_DISABLED,
    );
    properties.set_prop(
        ScannerProperty::SonarScannerWasEngineCacheHit,
        CACHE_STATUS_DISABLED,
    );
    properties.set_prop(ScannerProperty::SonarProjectBaseDir, project_base_dir);

    let host_props = get_host_properties(&properties)?;
    properties.merge(host_props);

    Ok(normalize(properties))
}

/// Lowest-precedence defaults derived from the environment snapshot and the
/// platform probe.
fn default_properties(env: &EnvMap, platform: &Platform) -> BTreeMap<String, String> {
    let home = env
        .get("HOME")
        .or_else(|| env.get("USERPROFILE"))
        .cloned()
        .unwrap_or_default();
    let user_home = Path::new(&home)
        .join(SONAR_DIR_DEFAULT)
        .to_string_lossy()
        .into_owned();

    BTreeMap::from([
        (
            ScannerProperty::SonarUserHome.as_str().to_string(),
            user_home,
        ),
        (
            ScannerProperty::SonarScannerOs.as_str().to_string(),
            platform.os.as_str().to_string(),
        ),
        (
            ScannerProperty::SonarScannerArch.as_str().to_string(),
            platform.arch.clone(),
        ),
        (
            ScannerProperty::SonarScannerCliVersion.as_str().to_string(),
            SCANNER_CLI_DEFAULT_VERSION.to_string(),
        ),
    ])
}

/// Properties from the JS-API style options struct.
fn scan_options_properties(scan_options: &ScanOptions) -> BTreeMap<String, String> {
    let mut props = scan_options.options.clone();
    if let Some(ref url) = scan_options.server_url {
        props.insert(ScannerProperty::SonarHostUrl.as_str().to_string(), url.clone());
    }
    if let Some(ref token) = scan_options.token {
        props.insert(ScannerProperty::SonarToken.as_str().to_string(), token.clone());
    }
    if let Some(verbose) = scan_options.verbose {
        props.insert(
            ScannerProperty::SonarVerbose.as_str().to_string(),
            verbose.to_string(),
        );
    }
    props
}

/// Properties from raw CLI arguments (`-Dkey=value`). Only the first `=`
/// splits, so values may themselves contain `=`.
fn cli_properties(cli_args: &[String]) -> Result<BTreeMap<String, String>, PropertyError> {
    let mut props = BTreeMap::new();
    for arg in cli_args {
        let Some(define) = arg.strip_prefix("-D") else {
            continue;
        };
        let Some((key, value)) = define.split_once('=') else {
            return Err(PropertyError::MalformedDefine(arg.clone()));
        };
        props.insert(key.to_string(), value.to_string());
    }
    Ok(props)
}

/// Reconcile deprecated property aliases after user precedence is resolved.
///
/// Runs once per resolution and is idempotent: re-applying it to an already
/// fixed map changes nothing.
pub fn hotfix_deprecated_properties(properties: &mut PropertyMap) {
    for &(old_key, new_key) in DEPRECATED_PROPERTY_PAIRS {
        let old = properties.get(old_key).map(str::to_string);
        let new = properties.get(new_key).map(str::to_string);
        match (old, new) {
            (Some(old_value), None) => {
                warn!("Property '{old_key}' is deprecated, please use '{new_key}' instead");
                properties.set(new_key, old_value);
            }
            (Some(old_value), Some(new_value)) => {
                if old_value != new_value {
                    warn!(
                        "Both '{old_key}' and '{new_key}' are set; \
                         the value of '{new_key}' takes precedence"
                    );
                }
                properties.set(old_key, new_value);
            }
            _ => {}
        }
    }
}

/// Final pass: trim every value. This is the only place values are coerced.
fn normalize(properties: PropertyMap) -> PropertyMap {
    properties
        .inner
        .into_iter()
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key, value.trim().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::OsFamily;

    fn test_platform() -> Platform {
        Platform {
            os: OsFamily::Linux,
            arch: "x64".to_string(),
        }
    }

    fn empty_env() -> EnvMap {
        EnvMap::from([("HOME".to_string(), "/home/tester".to_string())])
    }

    fn resolve_simple(scan_options: &ScanOptions, cli: &[String], env: &EnvMap) -> PropertyMap {
        let dir = tempfile::tempdir().unwrap();
        resolve(scan_options, cli, 1_000, env, dir.path(), &test_platform()).unwrap()
    }

    #[test]
    fn defaults_are_applied() {
        let props = resolve_simple(&ScanOptions::default(), &[], &empty_env());
        assert_eq!(
            props.get_prop(ScannerProperty::SonarUserHome),
            Some("/home/tester/.sonar")
        );
        assert_eq!(props.get_prop(ScannerProperty::SonarScannerOs), Some("linux"));
        assert_eq!(props.get_prop(ScannerProperty::SonarScannerArch), Some("x64"));
    }

    #[test]
    fn home_resolution_reads_only_the_env_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let props = resolve(
            &ScanOptions::default(),
            &[],
            0,
            &EnvMap::new(),
            dir.path(),
            &test_platform(),
        )
        .unwrap();
        // no HOME/USERPROFILE in the snapshot, regardless of the ambient
        // process environment
        assert_eq!(props.get_prop(ScannerProperty::SonarUserHome), Some(".sonar"));
    }

    #[test]
    fn resolution_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let env = empty_env();
        let opts = ScanOptions {
            token: Some("squ_123".to_string()),
            ..ScanOptions::default()
        };
        let first = resolve(&opts, &[], 42, &env, dir.path(), &test_platform()).unwrap();
        let second = resolve(&opts, &[], 42, &env, dir.path(), &test_platform()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn cli_defines_override_scan_options_and_env() {
        let mut env = empty_env();
        env.insert("SONAR_TOKEN".to_string(), "from-env".to_string());
        let opts = ScanOptions {
            token: Some("from-options".to_string()),
            ..ScanOptions::default()
        };
        let cli = vec!["-Dsonar.token=from-cli".to_string()];
        let props = resolve_simple(&opts, &cli, &env);
        assert_eq!(props.get_prop(ScannerProperty::SonarToken), Some("from-cli"));
    }

    #[test]
    fn scan_options_override_env() {
        let mut env = empty_env();
        env.insert("SONAR_TOKEN".to_string(), "from-env".to_string());
        let opts = ScanOptions {
            token: Some("from-options".to_string()),
            ..ScanOptions::default()
        };
        let props = resolve_simple(&opts, &[], &env);
        assert_eq!(
            props.get_prop(ScannerProperty::SonarToken),
            Some("from-options")
        );
    }

    #[test]
    fn define_value_may_contain_equals() {
        let cli = vec!["-Dsonar.exclusions=a=b,c".to_string()];
        let props = resolve_simple(&ScanOptions::default(), &cli, &empty_env());
        assert_eq!(props.get_prop(ScannerProperty::SonarExclusions), Some("a=b,c"));
    }

    #[test]
    fn malformed_define_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let cli = vec!["-Dsonar.token".to_string()];
        let err = resolve(
            &ScanOptions::default(),
            &cli,
            0,
            &empty_env(),
            dir.path(),
            &test_platform(),
        )
        .unwrap_err();
        assert!(matches!(err, PropertyError::MalformedDefine(_)));
    }

    #[test]
    fn bootstrap_properties_cannot_be_overridden() {
        let mut env = empty_env();
        env.insert(
            "SONAR_SCANNER_JSON_PARAMS".to_string(),
            r#"{"sonar.scanner.app":"evil"}"#.to_string(),
        );
        let opts = ScanOptions {
            options: BTreeMap::from([(
                "sonar.scanner.wasJreCacheHit".to_string(),
                "hit".to_string(),
            )]),
            ..ScanOptions::default()
        };
        let cli = vec!["-Dsonar.scanner.appVersion=0.0.0".to_string()];
        let props = resolve_simple(&opts, &cli, &env);
        assert_eq!(
            props.get_prop(ScannerProperty::SonarScannerApp),
            Some(BOOTSTRAPPER_APP_NAME)
        );
        assert_eq!(
            props.get_prop(ScannerProperty::SonarScannerAppVersion),
            Some(BOOTSTRAPPER_APP_VERSION)
        );
        assert_eq!(
            props.get_prop(ScannerProperty::SonarScannerWasJreCacheHit),
            Some("disabled")
        );
    }

    #[test]
    fn deprecated_login_is_copied_to_token() {
        let cli = vec!["-Dsonar.login=old-secret".to_string()];
        let props = resolve_simple(&ScanOptions::default(), &cli, &empty_env());
        assert_eq!(props.get("sonar.login"), Some("old-secret"));
        assert_eq!(props.get_prop(ScannerProperty::SonarToken), Some("old-secret"));
    }

    #[test]
    fn new_key_wins_when_both_deprecated_and_new_are_set() {
        let cli = vec![
            "-Dsonar.login=old-secret".to_string(),
            "-Dsonar.token=new-secret".to_string(),
        ];
        let props = resolve_simple(&ScanOptions::default(), &cli, &empty_env());
        assert_eq!(props.get("sonar.login"), Some("new-secret"));
        assert_eq!(props.get_prop(ScannerProperty::SonarToken), Some("new-secret"));
    }

    #[test]
    fn hotfix_is_idempotent() {
        let mut props = PropertyMap::new();
        props.set("sonar.login", "secret");
        hotfix_deprecated_properties(&mut props);
        let once = props.clone();
        hotfix_deprecated_properties(&mut props);
        assert_eq!(once, props);
    }

    #[test]
    fn values_are_trimmed_in_final_pass() {
        let cli = vec!["-Dsonar.projectName=  spaced out  ".to_string()];
        let props = resolve_simple(&ScanOptions::default(), &cli, &empty_env());
        assert_eq!(props.get("sonar.projectName"), Some("spaced out"));
    }

    #[test]
    fn engine_envelope_lists_all_properties() {
        let mut props = PropertyMap::new();
        props.set("sonar.token", "abc");
        let envelope = props.to_engine_envelope();
        assert_eq!(
            envelope,
            r#"{"scannerProperties":[{"key":"sonar.token","value":"abc"}]}"#
        );
    }
}
