//! Host and region resolution.
//!
//! Decides whether the target is the cloud service (and which region) or a
//! self-managed server, and derives the REST API base URL accordingly. The
//! function is idempotent: re-applying it to an already-resolved map yields
//! the same result.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::PropertyError;
use crate::properties::{PropertyMap, ScannerProperty};

const SONARCLOUD_EU_URL: &str = "https://sonarcloud.io";
const SONARCLOUD_EU_API_URL: &str = "https://api.sonarcloud.io";
const SONARCLOUD_US_URL: &str = "https://sonarqube.us";
const SONARCLOUD_US_API_URL: &str = "https://api.sonarqube.us";

fn eu_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(https?://)?(www\.)?(sc-dev\.io|sc-staging\.io|sonarcloud\.io)")
            .unwrap_or_else(|_| unreachable!("hardcoded regex"))
    })
}

fn us_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(https?://)?(www\.)?(us-sc-staging\.io|sonarqube\.us)")
            .unwrap_or_else(|_| unreachable!("hardcoded regex"))
    })
}

/// Cloud region, used to pick default host and API URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Eu,
    Us,
}

impl Region {
    const SUPPORTED: &'static str = "'us'";

    /// Only `us` may be named explicitly; the EU region is the unnamed
    /// default and any other value is a configuration error.
    fn from_property(value: &str) -> Result<Self, PropertyError> {
        match value.to_lowercase().as_str() {
            "" => Ok(Region::Eu),
            "us" => Ok(Region::Us),
            other => Err(PropertyError::UnsupportedRegion {
                region: other.to_string(),
                supported: Region::SUPPORTED.to_string(),
            }),
        }
    }

    fn default_host_url(self) -> &'static str {
        match self {
            Region::Eu => SONARCLOUD_EU_URL,
            Region::Us => SONARCLOUD_US_URL,
        }
    }

    fn default_api_url(self) -> &'static str {
        match self {
            Region::Eu => SONARCLOUD_EU_API_URL,
            Region::Us => SONARCLOUD_US_API_URL,
        }
    }
}

/// Derive host, API base URL and the cloud flag from the current properties.
pub fn get_host_properties(
    properties: &PropertyMap,
) -> Result<BTreeMap<String, String>, PropertyError> {
    let host_url = properties
        .get_prop(ScannerProperty::SonarHostUrl)
        .unwrap_or("")
        .trim()
        .trim_end_matches('/');
    let cloud_override = properties
        .get_prop(ScannerProperty::SonarScannerSonarCloudUrl)
        .map(|url| url.trim().trim_end_matches('/'))
        .filter(|url| !url.is_empty());
    let explicit_api_url = properties
        .get_prop(ScannerProperty::SonarScannerApiBaseUrl)
        .map(str::trim)
        .filter(|url| !url.is_empty());

    let is_cloud = host_url.is_empty()
        || cloud_override == Some(host_url)
        || eu_url_regex().is_match(host_url)
        || us_url_regex().is_match(host_url);

    let mut props = BTreeMap::new();
    if is_cloud {
        let region = match properties
            .get_prop(ScannerProperty::SonarRegion)
            .map(str::trim)
            .filter(|region| !region.is_empty())
        {
            Some(region) => Region::from_property(region)?,
            None if us_url_regex().is_match(host_url) => Region::Us,
            None => Region::Eu,
        };
        props.insert(
            ScannerProperty::SonarScannerInternalIsSonarCloud
                .as_str()
                .to_string(),
            "true".to_string(),
        );
        props.insert(
            ScannerProperty::SonarHostUrl.as_str().to_string(),
            cloud_override
                .unwrap_or_else(|| region.default_host_url())
                .to_string(),
        );
        props.insert(
            ScannerProperty::SonarScannerApiBaseUrl.as_str().to_string(),
            explicit_api_url
                .unwrap_or_else(|| region.default_api_url())
                .to_string(),
        );
    } else {
        props.insert(
            ScannerProperty::SonarScannerInternalIsSonarCloud
                .as_str()
                .to_string(),
            "false".to_string(),
        );
        props.insert(
            ScannerProperty::SonarHostUrl.as_str().to_string(),
            host_url.to_string(),
        );
        props.insert(
            ScannerProperty::SonarScannerApiBaseUrl.as_str().to_string(),
            explicit_api_url
                .map(str::to_string)
                .unwrap_or_else(|| format!("{host_url}/api/v2")),
        );
    }
    Ok(props)
}
