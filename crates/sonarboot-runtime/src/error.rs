//! Orchestrator error type.
//!
//! Aggregates the lower layers' errors and adds the failures that only
//! exist at orchestration level: version parsing, executable lookup and
//! child-process exit codes.

use thiserror::Error;

use sonarboot_cache::CacheError;
use sonarboot_core::PropertyError;
use sonarboot_http::HttpError;

/// Any failure that aborts a bootstrap run.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failure during property resolution.
    #[error(transparent)]
    Property(#[from] PropertyError),

    /// Network or server failure.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Cache, verification or extraction failure.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The requested scanner CLI version is not digits-and-dots.
    #[error("Version \"{0}\" does not have a correct format")]
    InvalidCliVersion(String),

    /// The server reported a version no coercion can make sense of.
    /// Fatal: there is no safe default for the provisioning decision.
    #[error("Server version '{0}' could not be parsed")]
    UnparsableServerVersion(String),

    /// An executable the run depends on is not on the search path.
    #[error("Could not find '{executable}' in PATH")]
    ExecutableNotFound {
        executable: String,
        #[source]
        source: which::Error,
    },

    /// The supervised child process exited nonzero.
    #[error("{tool} failed with exit code {code}")]
    Execution { tool: String, code: i32 },

    /// The supervised child process was killed before exiting.
    #[error("{tool} was terminated by a signal")]
    Interrupted { tool: String },

    /// Failure serializing the dumped invocation or property envelope.
    #[error("Failed to serialize scanner invocation: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem failure outside the cache layer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
