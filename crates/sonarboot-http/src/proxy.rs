//! Proxy resolution from scanner properties.
//!
//! The proxy protocol is assumed to match the server endpoint's protocol.
//! Property-level inference from proxy environment variables has already
//! happened during property resolution, so this module only reads the
//! `sonar.scanner.proxy*` properties.

use tracing::{debug, warn};
use url::Url;

use sonarboot_core::{PropertyMap, ScannerProperty};

/// Build the proxy URL from explicit proxy properties, if any.
pub fn proxy_url_from_properties(properties: &PropertyMap) -> Option<Url> {
    let host_url = properties
        .get_prop(ScannerProperty::SonarHostUrl)
        .unwrap_or("");
    let server_uses_https = !host_url.starts_with("http://");

    let proxy_host = properties
        .get_prop(ScannerProperty::SonarScannerProxyHost)
        .filter(|h| !h.is_empty());
    let Some(proxy_host) = proxy_host else {
        if properties
            .get_prop(ScannerProperty::SonarScannerProxyPort)
            .is_some()
            || properties
                .get_prop(ScannerProperty::SonarScannerProxyUser)
                .is_some()
            || properties
                .get_prop(ScannerProperty::SonarScannerProxyPassword)
                .is_some()
        {
            warn!("Detecting proxy: incomplete proxy configuration, proxy host is missing");
        }
        debug!("Detecting proxy: no proxy detected");
        return None;
    };

    let protocol = if server_uses_https { "https" } else { "http" };
    let default_port = if server_uses_https { "443" } else { "80" };
    let port = properties
        .get_prop(ScannerProperty::SonarScannerProxyPort)
        .filter(|p| !p.is_empty())
        .unwrap_or(default_port);
    let user = properties
        .get_prop(ScannerProperty::SonarScannerProxyUser)
        .unwrap_or("");
    let password = properties
        .get_prop(ScannerProperty::SonarScannerProxyPassword)
        .unwrap_or("");

    let raw = format!("{protocol}://{user}:{password}@{proxy_host}:{port}");
    match Url::parse(&raw) {
        Ok(url) => Some(url),
        Err(e) => {
            warn!("Detecting proxy: ignoring unparsable proxy configuration: {e}");
            None
        }
    }
}

/// JVM `-D` system properties equivalent to the configured proxy, appended
/// to the spawned scanner's arguments.
pub fn proxy_java_options(properties: &PropertyMap) -> Vec<String> {
    let Some(proxy_url) = proxy_url_from_properties(properties) else {
        return Vec::new();
    };
    let host_url = properties
        .get_prop(ScannerProperty::SonarHostUrl)
        .unwrap_or("");
    let protocol = if host_url.starts_with("http://") {
        "http"
    } else {
        "https"
    };
    vec![
        format!("-D{protocol}.proxyHost={}", proxy_url.host_str().unwrap_or("")),
        format!(
            "-D{protocol}.proxyPort={}",
            proxy_url
                .port()
                .map(|p| p.to_string())
                .unwrap_or_default()
        ),
        format!("-D{protocol}.proxyUser={}", proxy_url.username()),
        format!(
            "-D{protocol}.proxyPassword={}",
            proxy_url.password().unwrap_or("")
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props_with(entries: &[(ScannerProperty, &str)]) -> PropertyMap {
        let mut props = PropertyMap::new();
        for &(key, value) in entries {
            props.set_prop(key, value);
        }
        props
    }

    #[test]
    fn no_proxy_host_means_no_proxy() {
        let props = props_with(&[(ScannerProperty::SonarHostUrl, "https://sq.example.com")]);
        assert!(proxy_url_from_properties(&props).is_none());
        assert!(proxy_java_options(&props).is_empty());
    }

    #[test]
    fn proxy_defaults_to_https_port() {
        let props = props_with(&[
            (ScannerProperty::SonarHostUrl, "https://sq.example.com"),
            (ScannerProperty::SonarScannerProxyHost, "proxy.corp"),
        ]);
        let url = proxy_url_from_properties(&props).unwrap();
        assert_eq!(url.host_str(), Some("proxy.corp"));
        assert_eq!(url.port(), Some(443));
        assert_eq!(url.scheme(), "https");
    }

    #[test]
    fn http_host_selects_http_proxy_protocol() {
        let props = props_with(&[
            (ScannerProperty::SonarHostUrl, "http://sq.internal"),
            (ScannerProperty::SonarScannerProxyHost, "proxy.corp"),
            (ScannerProperty::SonarScannerProxyPort, "8080"),
        ]);
        let url = proxy_url_from_properties(&props).unwrap();
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.port(), Some(8080));
    }

    #[test]
    fn java_options_carry_credentials() {
        let props = props_with(&[
            (ScannerProperty::SonarHostUrl, "https://sq.example.com"),
            (ScannerProperty::SonarScannerProxyHost, "proxy.corp"),
            (ScannerProperty::SonarScannerProxyPort, "3128"),
            (ScannerProperty::SonarScannerProxyUser, "jane"),
            (ScannerProperty::SonarScannerProxyPassword, "secret"),
        ]);
        let options = proxy_java_options(&props);
        assert_eq!(
            options,
            vec![
                "-Dhttps.proxyHost=proxy.corp".to_string(),
                "-Dhttps.proxyPort=3128".to_string(),
                "-Dhttps.proxyUser=jane".to_string(),
                "-Dhttps.proxyPassword=secret".to_string(),
            ]
        );
    }
}
