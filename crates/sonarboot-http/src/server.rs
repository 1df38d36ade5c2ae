//! Server collaborator endpoints.
//!
//! Version lookup is an ordered list of strategies (modern REST endpoint
//! first, legacy endpoint second); the first success wins and all failures
//! are collected for the diagnostic message when none succeeds.

use serde::Deserialize;
use tracing::debug;

use crate::client::HttpClient;
use crate::error::HttpError;

/// Metadata for one provisioned JRE flavour, as served by the JRE endpoint.
/// Untrusted until the downloaded archive passes checksum verification.
#[derive(Debug, Clone, Deserialize)]
pub struct JreMetadata {
    pub id: String,
    pub filename: String,
    pub sha256: String,
    /// Relative path of the java executable inside the unpacked archive.
    #[serde(rename = "javaPath")]
    pub java_path: String,
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub arch: Option<String>,
    #[serde(default, rename = "downloadUrl")]
    pub download_url: Option<String>,
}

/// Metadata for the analysis engine archive.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineMetadata {
    pub filename: String,
    pub sha256: String,
    #[serde(default, rename = "downloadUrl")]
    pub download_url: Option<String>,
}

/// Query the server version, modern endpoint first, legacy second.
///
/// Returns the raw version string; parsing happens at the caller where the
/// provisioning threshold lives.
pub async fn fetch_server_version(client: &HttpClient) -> Result<String, HttpError> {
    let mut attempts = Vec::new();

    for url in [
        client.api_url("analysis/version")?,
        client.host_url("api/server/version")?,
    ] {
        debug!("Fetching server version from {url}");
        match client.get_text(&url).await {
            Ok(version) => return Ok(version.trim().to_string()),
            Err(e) => attempts.push(format!("{url}: {e}")),
        }
    }

    Err(HttpError::VersionUnavailable {
        attempts: attempts.join("; "),
    })
}

/// Fetch the JRE catalogue filtered by OS and architecture.
pub async fn fetch_jre_metadata(
    client: &HttpClient,
    os: &str,
    arch: &str,
) -> Result<Vec<JreMetadata>, HttpError> {
    let mut url = client.api_url("analysis/jres")?;
    url.query_pairs_mut()
        .append_pair("os", os)
        .append_pair("arch", arch);
    client.get_json(&url).await
}

/// Fetch the engine archive metadata (no OS/arch filter).
pub async fn fetch_engine_metadata(client: &HttpClient) -> Result<EngineMetadata, HttpError> {
    let url = client.api_url("analysis/engine")?;
    client.get_json(&url).await
}
