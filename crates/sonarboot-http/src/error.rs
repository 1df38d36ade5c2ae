//! HTTP-layer error types.

use thiserror::Error;

/// Errors from the HTTP layer. All of them are fatal for the bootstrap;
/// there is no retry below the orchestrator.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Network or protocol error from the underlying client.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("Request to {url} failed with status {status}")]
    Status { status: u16, url: String },

    /// A URL could not be built or parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS trust or key material could not be loaded.
    #[error("Failed to load TLS material from {path}: {reason}")]
    TlsMaterial { path: String, reason: String },

    /// The bearer token cannot be carried in an HTTP header.
    #[error("The provided token is not a valid HTTP header value")]
    InvalidToken,

    /// Filesystem error while streaming a download to disk.
    #[error("I/O error while downloading: {0}")]
    Io(#[from] std::io::Error),

    /// Every version endpoint failed.
    #[error(
        "Failed to query server version, please verify the host URL. Attempts: {attempts}"
    )]
    VersionUnavailable { attempts: String },
}
