//! Configure-once HTTP client.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

use sonarboot_core::{PropertyMap, ScannerProperty};

use crate::error::HttpError;
use crate::proxy::proxy_url_from_properties;

/// HTTP client carrying the per-run configuration: bearer token, response
/// timeout, proxy and TLS trust material resolved from the property map.
#[derive(Debug)]
pub struct HttpClient {
    client: reqwest::Client,
    api_base_url: Url,
    host_url: Url,
}

impl HttpClient {
    /// Build the client from resolved properties.
    pub fn from_properties(properties: &PropertyMap) -> Result<Self, HttpError> {
        let api_base_url = parse_base_url(
            properties
                .get_prop(ScannerProperty::SonarScannerApiBaseUrl)
                .unwrap_or(""),
        )?;
        let host_url = parse_base_url(
            properties
                .get_prop(ScannerProperty::SonarHostUrl)
                .unwrap_or(""),
        )?;

        let mut builder = reqwest::Client::builder();

        if let Some(token) = properties
            .get_prop(ScannerProperty::SonarToken)
            .filter(|t| !t.is_empty())
        {
            let mut headers = reqwest::header::HeaderMap::new();
            let mut value = reqwest::header::HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| HttpError::InvalidToken)?;
            value.set_sensitive(true);
            headers.insert(reqwest::header::AUTHORIZATION, value);
            builder = builder.default_headers(headers);
        }

        let timeout_secs = properties
            .get_prop(ScannerProperty::SonarScannerResponseTimeout)
            .and_then(|t| t.parse::<u64>().ok())
            .unwrap_or(0);
        if timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(timeout_secs));
        }

        if let Some(proxy_url) = proxy_url_from_properties(properties) {
            debug!("Detecting proxy: {proxy_url}");
            builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
        }

        if let Some(truststore) = properties
            .get_prop(ScannerProperty::SonarScannerTruststorePath)
            .filter(|p| !p.is_empty())
        {
            let pem = std::fs::read(truststore).map_err(|e| HttpError::TlsMaterial {
                path: truststore.to_string(),
                reason: e.to_string(),
            })?;
            let cert =
                reqwest::Certificate::from_pem(&pem).map_err(|e| HttpError::TlsMaterial {
                    path: truststore.to_string(),
                    reason: e.to_string(),
                })?;
            builder = builder.add_root_certificate(cert);
        }

        if let Some(keystore) = properties
            .get_prop(ScannerProperty::SonarScannerKeystorePath)
            .filter(|p| !p.is_empty())
        {
            let pem = std::fs::read(keystore).map_err(|e| HttpError::TlsMaterial {
                path: keystore.to_string(),
                reason: e.to_string(),
            })?;
            let identity =
                reqwest::Identity::from_pem(&pem).map_err(|e| HttpError::TlsMaterial {
                    path: keystore.to_string(),
                    reason: e.to_string(),
                })?;
            builder = builder.identity(identity);
        }

        Ok(Self {
            client: builder.build()?,
            api_base_url,
            host_url,
        })
    }

    /// Absolute URL under the REST API base.
    pub fn api_url(&self, path: &str) -> Result<Url, HttpError> {
        join_url(&self.api_base_url, path)
    }

    /// Absolute URL under the server host.
    pub fn host_url(&self, path: &str) -> Result<Url, HttpError> {
        join_url(&self.host_url, path)
    }

    /// GET a URL and return the response body as text.
    pub async fn get_text(&self, url: &Url) -> Result<String, HttpError> {
        let response = self.client.get(url.as_str()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.text().await?)
    }

    /// GET a URL and deserialize the JSON response body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, HttpError> {
        let response = self
            .client
            .get(url.as_str())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.json().await?)
    }

    /// Stream a GET response body to `dest`. Network errors propagate
    /// uncaught; the caller decides what to do with a partial file.
    pub async fn download(&self, url: &Url, dest: &Path) -> Result<(), HttpError> {
        debug!("Downloading {url} to {}", dest.display());
        let response = self
            .client
            .get(url.as_str())
            .header(reqwest::header::ACCEPT, "application/octet-stream")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        debug!("Download of {url} complete");
        Ok(())
    }
}

fn parse_base_url(raw: &str) -> Result<Url, HttpError> {
    // A trailing slash matters for Url::join; normalize to exactly one.
    let trimmed = raw.trim_end_matches('/');
    Ok(Url::parse(&format!("{trimmed}/"))?)
}

fn join_url(base: &Url, path: &str) -> Result<Url, HttpError> {
    Ok(base.join(path.trim_start_matches('/'))?)
}
