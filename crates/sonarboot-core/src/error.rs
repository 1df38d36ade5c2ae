//! Property-resolution error types.
//!
//! Configuration problems are fatal and surfaced immediately; there is no
//! retry anywhere in property resolution.

use thiserror::Error;

/// Errors raised while resolving scanner properties.
#[derive(Debug, Error)]
pub enum PropertyError {
    /// A `-D` CLI argument did not have the `key=value` shape.
    #[error("Malformed argument '{0}': expected -Dkey=value")]
    MalformedDefine(String),

    /// `sonar.region` was set to something other than a supported region.
    #[error("Unsupported region '{region}'. List of supported regions: {supported}")]
    UnsupportedRegion {
        region: String,
        supported: String,
    },
}
