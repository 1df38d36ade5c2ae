//! Environment-derived properties.
//!
//! Three sources, in increasing priority: the JSON property blob
//! (`SONAR_SCANNER_JSON_PARAMS`, with a deprecated fallback), the table of
//! well-known variables, and the generic prefixed-variable convention
//! (`SONAR_SCANNER_FOO_BAR` -> `sonar.scanner.fooBar`).

use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::EnvMap;
use crate::properties::ScannerProperty;

/// Current JSON property blob variable.
const JSON_PARAMS_ENV: &str = "SONAR_SCANNER_JSON_PARAMS";
/// Deprecated JSON property blob variable; still honored with a warning.
const DEPRECATED_JSON_PARAMS_ENV: &str = "SONARQUBE_SCANNER_PARAMS";

/// Generic prefixes converted to `sonar.scanner.*` properties. Both
/// historical spellings convert identically.
const GENERIC_ENV_PREFIXES: &[&str] = &["SONAR_SCANNER_", "SONARQUBE_SCANNER_"];

/// Well-known variables mapped 1:1 to property names.
const WELL_KNOWN_ENV: &[(&str, ScannerProperty)] = &[
    ("SONAR_HOST_URL", ScannerProperty::SonarHostUrl),
    ("SONAR_TOKEN", ScannerProperty::SonarToken),
    ("SONAR_ORGANIZATION", ScannerProperty::SonarOrganization),
    ("SONAR_REGION", ScannerProperty::SonarRegion),
    ("SONAR_USER_HOME", ScannerProperty::SonarUserHome),
    ("SONAR_VERBOSE", ScannerProperty::SonarVerbose),
];

/// Whether `name` is an environment variable the bootstrapper itself
/// consumes. Used to strip the child scanner's environment so
/// configuration is never specified twice.
pub fn is_scanner_env_key(name: &str) -> bool {
    name == JSON_PARAMS_ENV
        || name == DEPRECATED_JSON_PARAMS_ENV
        || WELL_KNOWN_ENV.iter().any(|&(env_name, _)| env_name == name)
        || GENERIC_ENV_PREFIXES
            .iter()
            .any(|prefix| name.strip_prefix(prefix).is_some_and(|s| !s.is_empty()))
}

/// Name of the variable carrying the serialized properties for the legacy
/// scanner CLI.
pub const LEGACY_SCANNER_PARAMS_ENV: &str = DEPRECATED_JSON_PARAMS_ENV;

/// Parse properties from the environment snapshot.
///
/// A malformed JSON blob degrades gracefully: it logs a warning and
/// contributes nothing, while the discrete variables still apply. This is
/// the single documented graceful-degradation case in resolution.
pub(super) fn environment_properties(env: &EnvMap) -> BTreeMap<String, String> {
    let mut props = BTreeMap::new();

    // JSON blob first so discrete variables override it.
    let json_blob = env
        .get(JSON_PARAMS_ENV)
        .or_else(|| env.get(DEPRECATED_JSON_PARAMS_ENV));
    if !env.contains_key(JSON_PARAMS_ENV) && env.contains_key(DEPRECATED_JSON_PARAMS_ENV) {
        warn!(
            "{DEPRECATED_JSON_PARAMS_ENV} is deprecated, \
             please use {JSON_PARAMS_ENV} instead"
        );
    }
    if let Some(raw) = json_blob {
        match serde_json::from_str::<BTreeMap<String, serde_json::Value>>(raw) {
            Ok(parsed) => {
                for (key, value) in parsed {
                    props.insert(key, json_value_to_string(value));
                }
            }
            Err(e) => warn!("Failed to parse JSON parameters from environment: {e}"),
        }
    }

    for &(env_name, property) in WELL_KNOWN_ENV {
        if let Some(value) = env.get(env_name) {
            props.insert(property.as_str().to_string(), value.clone());
        }
    }

    for (name, value) in env {
        if name == JSON_PARAMS_ENV || name == DEPRECATED_JSON_PARAMS_ENV {
            continue;
        }
        for prefix in GENERIC_ENV_PREFIXES {
            if let Some(suffix) = name.strip_prefix(prefix) {
                if !suffix.is_empty() {
                    props.insert(generic_env_to_property_name(suffix), value.clone());
                }
                break;
            }
        }
    }

    props
}

/// `FOO_BAR` -> `sonar.scanner.fooBar`.
fn generic_env_to_property_name(suffix: &str) -> String {
    let mut name = String::from("sonar.scanner.");
    let mut uppercase_next = false;
    for c in suffix.chars() {
        if c == '_' {
            uppercase_next = true;
            continue;
        }
        let lowered = c.to_ascii_lowercase();
        if uppercase_next {
            name.push(lowered.to_ascii_uppercase());
            uppercase_next = false;
        } else {
            name.push(lowered);
        }
    }
    name
}

/// Stringify a JSON blob value: strings pass through, null becomes empty.
fn json_value_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Last-resort proxy defaults from the standard proxy environment
/// variables, applicable only when they cover the resolved host URL.
pub(super) fn proxy_environment_defaults(
    env: &EnvMap,
    host_url: &str,
) -> BTreeMap<String, String> {
    let mut props = BTreeMap::new();

    let uses_https = !host_url.starts_with("http://");
    let proxy_var = if uses_https { "https_proxy" } else { "http_proxy" };
    let raw = env
        .get(proxy_var)
        .or_else(|| env.get(&proxy_var.to_uppercase()));
    let Some(raw) = raw.filter(|v| !v.trim().is_empty()) else {
        return props;
    };

    if host_excluded_by_no_proxy(env, host_url) {
        debug!("Host is covered by no_proxy, ignoring {proxy_var}");
        return props;
    }

    let Some(proxy) = parse_proxy_url(raw) else {
        warn!("Ignoring unparsable proxy URL in {proxy_var}");
        return props;
    };

    props.insert(
        ScannerProperty::SonarScannerProxyHost.as_str().to_string(),
        proxy.host,
    );
    if let Some(port) = proxy.port {
        props.insert(
            ScannerProperty::SonarScannerProxyPort.as_str().to_string(),
            port,
        );
    }
    if let Some(user) = proxy.user {
        props.insert(
            ScannerProperty::SonarScannerProxyUser.as_str().to_string(),
            user,
        );
    }
    if let Some(password) = proxy.password {
        props.insert(
            ScannerProperty::SonarScannerProxyPassword
                .as_str()
                .to_string(),
            password,
        );
    }
    props
}

struct ProxyParts {
    host: String,
    port: Option<String>,
    user: Option<String>,
    password: Option<String>,
}

/// Minimal proxy URL split; the scheme is irrelevant here since only the
/// authority parts become properties.
fn parse_proxy_url(raw: &str) -> Option<ProxyParts> {
    let rest = raw
        .trim()
        .split_once("://")
        .map_or(raw.trim(), |(_, rest)| rest);
    let rest = rest.trim_end_matches('/');
    let (credentials, authority) = match rest.rsplit_once('@') {
        Some((creds, authority)) => (Some(creds), authority),
        None => (None, rest),
    };
    let (host, port) = match authority.split_once(':') {
        Some((host, port)) => (host, Some(port.to_string())),
        None => (authority, None),
    };
    if host.is_empty() {
        return None;
    }
    let (user, password) = match credentials {
        Some(creds) => match creds.split_once(':') {
            Some((user, password)) => (Some(user.to_string()), Some(password.to_string())),
            None => (Some(creds.to_string()), None),
        },
        None => (None, None),
    };
    Some(ProxyParts {
        host: host.to_string(),
        port,
        user,
        password,
    })
}

/// Whether the host URL's domain is listed in `no_proxy`/`NO_PROXY`.
fn host_excluded_by_no_proxy(env: &EnvMap, host_url: &str) -> bool {
    let Some(no_proxy) = env.get("no_proxy").or_else(|| env.get("NO_PROXY")) else {
        return false;
    };
    let host = host_url
        .split_once("://")
        .map_or(host_url, |(_, rest)| rest);
    let host = host.split(['/', ':']).next().unwrap_or(host);
    no_proxy
        .split(',')
        .map(|entry| entry.trim().trim_start_matches('.'))
        .filter(|entry| !entry.is_empty())
        .any(|entry| host == entry || host.ends_with(&format!(".{entry}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_variables_map_to_properties() {
        let env = EnvMap::from([
            ("SONAR_HOST_URL".to_string(), "https://sq.example.com".to_string()),
            ("SONAR_TOKEN".to_string(), "squ_abc".to_string()),
        ]);
        let props = environment_properties(&env);
        assert_eq!(props.get("sonar.host.url").unwrap(), "https://sq.example.com");
        assert_eq!(props.get("sonar.token").unwrap(), "squ_abc");
    }

    #[test]
    fn generic_prefix_converts_to_camel_case() {
        let env = EnvMap::from([(
            "SONAR_SCANNER_RESPONSE_TIMEOUT".to_string(),
            "42".to_string(),
        )]);
        let props = environment_properties(&env);
        assert_eq!(props.get("sonar.scanner.responseTimeout").unwrap(), "42");
    }

    #[test]
    fn historical_prefix_converts_identically() {
        let env = EnvMap::from([(
            "SONARQUBE_SCANNER_PROXY_HOST".to_string(),
            "proxy.local".to_string(),
        )]);
        let props = environment_properties(&env);
        assert_eq!(props.get("sonar.scanner.proxyHost").unwrap(), "proxy.local");
    }

    #[test]
    fn json_blob_loses_to_discrete_variables() {
        let env = EnvMap::from([
            (
                "SONAR_SCANNER_JSON_PARAMS".to_string(),
                r#"{"sonar.token":"from-blob","sonar.organization":"acme"}"#.to_string(),
            ),
            ("SONAR_TOKEN".to_string(), "from-var".to_string()),
        ]);
        let props = environment_properties(&env);
        assert_eq!(props.get("sonar.token").unwrap(), "from-var");
        assert_eq!(props.get("sonar.organization").unwrap(), "acme");
    }

    #[test]
    fn malformed_json_blob_is_ignored() {
        let env = EnvMap::from([
            ("SONAR_SCANNER_JSON_PARAMS".to_string(), "{not json".to_string()),
            ("SONAR_TOKEN".to_string(), "still-works".to_string()),
        ]);
        let props = environment_properties(&env);
        assert_eq!(props.get("sonar.token").unwrap(), "still-works");
        assert_eq!(props.len(), 1);
    }

    #[test]
    fn deprecated_blob_variable_still_works() {
        let env = EnvMap::from([(
            "SONARQUBE_SCANNER_PARAMS".to_string(),
            r#"{"sonar.projectKey":"legacy"}"#.to_string(),
        )]);
        let props = environment_properties(&env);
        assert_eq!(props.get("sonar.projectKey").unwrap(), "legacy");
    }

    #[test]
    fn null_blob_values_become_empty_strings() {
        let env = EnvMap::from([(
            "SONAR_SCANNER_JSON_PARAMS".to_string(),
            r#"{"sonar.projectName":null,"sonar.verbose":true}"#.to_string(),
        )]);
        let props = environment_properties(&env);
        assert_eq!(props.get("sonar.projectName").unwrap(), "");
        assert_eq!(props.get("sonar.verbose").unwrap(), "true");
    }

    #[test]
    fn blob_variables_are_not_treated_as_generic_prefix() {
        let env = EnvMap::from([(
            "SONAR_SCANNER_JSON_PARAMS".to_string(),
            r#"{"sonar.projectKey":"k"}"#.to_string(),
        )]);
        let props = environment_properties(&env);
        assert!(!props.contains_key("sonar.scanner.jsonParams"));
    }

    #[test]
    fn scanner_env_keys_are_recognized() {
        assert!(is_scanner_env_key("SONAR_TOKEN"));
        assert!(is_scanner_env_key("SONAR_SCANNER_JSON_PARAMS"));
        assert!(is_scanner_env_key("SONARQUBE_SCANNER_PARAMS"));
        assert!(is_scanner_env_key("SONAR_SCANNER_RESPONSE_TIMEOUT"));
        assert!(!is_scanner_env_key("PATH"));
        assert!(!is_scanner_env_key("SONAR_SCANNER_"));
    }

    #[test]
    fn https_proxy_applies_to_https_host() {
        let env = EnvMap::from([(
            "https_proxy".to_string(),
            "http://user:pw@proxy.corp:3128".to_string(),
        )]);
        let props = proxy_environment_defaults(&env, "https://sq.example.com");
        assert_eq!(props.get("sonar.scanner.proxyHost").unwrap(), "proxy.corp");
        assert_eq!(props.get("sonar.scanner.proxyPort").unwrap(), "3128");
        assert_eq!(props.get("sonar.scanner.proxyUser").unwrap(), "user");
        assert_eq!(props.get("sonar.scanner.proxyPassword").unwrap(), "pw");
    }

    #[test]
    fn http_proxy_is_used_for_plain_http_host() {
        let env = EnvMap::from([
            ("http_proxy".to_string(), "http://plain.proxy:8080".to_string()),
            ("https_proxy".to_string(), "http://secure.proxy:8443".to_string()),
        ]);
        let props = proxy_environment_defaults(&env, "http://sq.internal");
        assert_eq!(props.get("sonar.scanner.proxyHost").unwrap(), "plain.proxy");
    }

    #[test]
    fn no_proxy_suppresses_inference() {
        let env = EnvMap::from([
            ("https_proxy".to_string(), "http://proxy.corp:3128".to_string()),
            ("no_proxy".to_string(), "example.com,other.host".to_string()),
        ]);
        let props = proxy_environment_defaults(&env, "https://sq.example.com");
        assert!(props.is_empty());
    }
}
