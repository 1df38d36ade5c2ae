//! Cache and acquisition error types.
//!
//! Verification failures are never downgraded to "treat as absent": a
//! corrupt cache entry or download is a reportable failure.

use std::path::PathBuf;

use thiserror::Error;

use sonarboot_http::HttpError;

/// Errors from the verified cache and acquisition pipeline.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The file's digest does not match the expected one.
    #[error("Checksum verification failed for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        expected: String,
        actual: String,
        path: PathBuf,
    },

    /// No expected digest was provided; never treated as "skip verification".
    #[error("Checksum not provided for {0}")]
    ChecksumMissing(String),

    /// An archive entry would resolve outside the extraction directory.
    #[error("Archive entry '{entry}' escapes the extraction directory")]
    UnsafeArchivePath { entry: String },

    /// The archive extension maps to no known format.
    #[error("Unsupported archive format: {}", .0.display())]
    UnsupportedArchive(PathBuf),

    /// The server has no JRE for this platform.
    #[error("No JRE found for this OS/architecture combination: {os}/{arch}")]
    NoMatchingJre { os: String, arch: String },

    /// Artifact metadata carried an unparsable download URL.
    #[error("Invalid download URL '{url}': {reason}")]
    InvalidDownloadUrl { url: String, reason: String },

    /// Network failure during metadata fetch or download.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Filesystem failure in the cache directory.
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Structural archive failure (not a containment violation).
    #[error("Failed to read archive: {0}")]
    Zip(#[from] zip::result::ZipError),
}
