//! Verified content-addressed cache and artifact acquisition pipeline.
//!
//! Artifacts (JRE, analysis engine) live under
//! `<sonar.userHome>/cache/<sha256>/<filename>`, with unpacked archives in a
//! sibling directory suffixed `_extracted`. Every artifact is verified
//! against its expected SHA-256 before use; a mismatch is always an error,
//! never silently re-downloaded or ignored.

pub mod archive;
pub mod checksum;
pub mod error;

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use url::Url;

use sonarboot_core::{PropertyMap, ScannerProperty, SONAR_CACHE_DIR_NAME, UNARCHIVE_SUFFIX};
use sonarboot_http::{
    fetch_engine_metadata, fetch_jre_metadata, EngineMetadata, HttpClient, JreMetadata,
};

pub use error::CacheError;

/// Identity of one cached artifact. The checksum is the canonical
/// identity; filename and alias are presentational.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheFileDescriptor {
    pub checksum: String,
    pub filename: String,
    /// Human label used in log lines ("JRE", "scanner engine").
    pub alias: String,
}

/// Outcome of a cache probe, reported in bootstrap telemetry properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Hit => "hit",
            CacheStatus::Miss => "miss",
        }
    }
}

/// The on-disk locations reserved for one artifact.
#[derive(Debug, Clone)]
pub struct CacheDestination {
    /// Where the verified archive (or jar) lives.
    pub archive_path: PathBuf,
    /// Sibling directory where the archive unpacks.
    pub extracted_path: PathBuf,
}

/// Root of the content-addressed cache: `<sonar.userHome>/cache`.
pub fn cache_root(properties: &PropertyMap) -> PathBuf {
    let user_home = properties
        .get_prop(ScannerProperty::SonarUserHome)
        .unwrap_or_default();
    Path::new(user_home).join(SONAR_CACHE_DIR_NAME)
}

/// Probe the cache for a verified copy of the artifact.
///
/// Returns `Ok(None)` when the entry is absent. When a file is present but
/// fails verification, the stale entry is deleted and the mismatch raised:
/// a corrupt cache is a reportable failure, not a silent miss.
pub fn locate(
    properties: &PropertyMap,
    descriptor: &CacheFileDescriptor,
) -> Result<Option<PathBuf>, CacheError> {
    let path = cache_root(properties)
        .join(&descriptor.checksum)
        .join(&descriptor.filename);
    if !path.exists() {
        return Ok(None);
    }
    debug!("Found cached file {}", path.display());
    if let Err(e) = checksum::validate(&path, &descriptor.checksum) {
        if matches!(e, CacheError::ChecksumMismatch { .. }) {
            std::fs::remove_file(&path)?;
        }
        return Err(e);
    }
    Ok(Some(path))
}

/// Reserve the archive and extraction paths for an artifact, creating the
/// checksum directory. Idempotent.
pub fn prepare_destination(
    properties: &PropertyMap,
    descriptor: &CacheFileDescriptor,
) -> Result<CacheDestination, CacheError> {
    let dir = cache_root(properties).join(&descriptor.checksum);
    std::fs::create_dir_all(&dir)?;
    let archive_path = dir.join(&descriptor.filename);
    let extracted_path = dir.join(format!("{}{}", descriptor.filename, UNARCHIVE_SUFFIX));
    Ok(CacheDestination {
        archive_path,
        extracted_path,
    })
}

/// Download to `dest` and verify. On mismatch the partial/corrupt file is
/// deleted before the error propagates.
pub async fn download_and_validate(
    client: &HttpClient,
    url: &Url,
    dest: &Path,
    expected_checksum: &str,
) -> Result<(), CacheError> {
    client.download(url, dest).await?;
    if let Err(e) = checksum::validate(dest, expected_checksum) {
        if matches!(e, CacheError::ChecksumMismatch { .. }) {
            std::fs::remove_file(dest)?;
        }
        return Err(e);
    }
    Ok(())
}

/// Resolve the download URL for an artifact: the absolute URL from its
/// metadata when present, otherwise the given API endpoint.
fn resolve_download_url(
    client: &HttpClient,
    metadata_url: Option<&str>,
    api_path: &str,
) -> Result<Url, CacheError> {
    match metadata_url.filter(|u| !u.is_empty()) {
        Some(raw) => Url::parse(raw).map_err(|e| CacheError::InvalidDownloadUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(client.api_url(api_path)?),
    }
}

/// Ensure the cached archive is unpacked next to itself, then return the
/// path of the executable inside it.
///
/// The archive unpacks into a staging sibling that is renamed into place
/// only once extraction completes, so an interrupted run never leaves a
/// partial tree under the final path.
fn ensure_extracted(destination: &CacheDestination, inner_path: &str) -> Result<PathBuf, CacheError> {
    if !destination.extracted_path.exists() {
        let mut staging = destination.extracted_path.as_os_str().to_owned();
        staging.push(".part");
        let staging = PathBuf::from(staging);
        if staging.exists() {
            std::fs::remove_dir_all(&staging)?;
        }
        archive::extract(&destination.archive_path, &staging)?;
        std::fs::rename(&staging, &destination.extracted_path)?;
    }
    let exe = destination.extracted_path.join(inner_path);
    #[cfg(unix)]
    if exe.exists() {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755))?;
    }
    Ok(exe)
}

/// Provision the server-recommended JRE for this platform.
///
/// Returns the absolute path of the `java` executable and stamps the
/// cache-hit telemetry property exactly once.
pub async fn fetch_jre(
    client: &HttpClient,
    properties: &mut PropertyMap,
) -> Result<PathBuf, CacheError> {
    let os = properties
        .get_prop(ScannerProperty::SonarScannerOs)
        .unwrap_or_default()
        .to_string();
    let arch = properties
        .get_prop(ScannerProperty::SonarScannerArch)
        .unwrap_or_default()
        .to_string();

    let jres = fetch_jre_metadata(client, &os, &arch).await?;
    let jre: JreMetadata = jres
        .into_iter()
        .next()
        .ok_or(CacheError::NoMatchingJre { os, arch })?;
    debug!("Server recommended JRE: {}", jre.filename);

    let descriptor = CacheFileDescriptor {
        checksum: jre.sha256.clone(),
        filename: jre.filename.clone(),
        alias: "JRE".to_string(),
    };
    let destination = prepare_destination(properties, &descriptor)?;

    let status = match locate(properties, &descriptor)? {
        Some(_) => CacheStatus::Hit,
        None => {
            let url = resolve_download_url(
                client,
                jre.download_url.as_deref(),
                &format!("analysis/jres/{}", jre.id),
            )?;
            info!("Downloading JRE from {url}");
            download_and_validate(client, &url, &destination.archive_path, &jre.sha256).await?;
            CacheStatus::Miss
        }
    };
    properties.set_prop(ScannerProperty::SonarScannerWasJreCacheHit, status.as_str());
    info!("{} cache {}", descriptor.alias, status.as_str());

    ensure_extracted(&destination, &jre.java_path)
}

/// Provision the analysis engine jar. The jar is cached verified but never
/// unpacked.
pub async fn fetch_engine(
    client: &HttpClient,
    properties: &mut PropertyMap,
) -> Result<PathBuf, CacheError> {
    let engine: EngineMetadata = fetch_engine_metadata(client).await?;
    debug!("Server engine: {}", engine.filename);

    let descriptor = CacheFileDescriptor {
        checksum: engine.sha256.clone(),
        filename: engine.filename.clone(),
        alias: "scanner engine".to_string(),
    };
    let destination = prepare_destination(properties, &descriptor)?;

    let status = match locate(properties, &descriptor)? {
        Some(_) => CacheStatus::Hit,
        None => {
            let url =
                resolve_download_url(client, engine.download_url.as_deref(), "analysis/engine")?;
            info!("Downloading scanner engine from {url}");
            download_and_validate(client, &url, &destination.archive_path, &engine.sha256).await?;
            CacheStatus::Miss
        }
    };
    properties.set_prop(ScannerProperty::SonarScannerWasEngineCacheHit, status.as_str());
    info!("{} cache {}", descriptor.alias, status.as_str());

    Ok(destination.archive_path)
}
