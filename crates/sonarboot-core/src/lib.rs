//! Core domain types for the scanner bootstrapper.
//!
//! This crate owns the property resolution engine: the deterministic merge
//! of defaults, inferred project metadata, environment variables, JS-API
//! style scan options and CLI arguments into a single property map, plus
//! the platform probe and host/region resolution it depends on.
//!
//! Nothing in here performs network or process I/O.

pub mod error;
pub mod host;
pub mod options;
pub mod platform;
pub mod properties;

pub use error::PropertyError;
pub use host::get_host_properties;
pub use options::ScanOptions;
pub use platform::{OsFamily, Platform};
pub use properties::{
    is_scanner_env_key, resolve, EnvMap, PropertyMap, ScannerProperty, LEGACY_SCANNER_PARAMS_ENV,
};

/// Name the bootstrapper reports about itself (`sonar.scanner.app`).
pub const BOOTSTRAPPER_APP_NAME: &str = "sonarboot";

/// Version the bootstrapper reports about itself (`sonar.scanner.appVersion`).
pub const BOOTSTRAPPER_APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Directory under the user home holding all scanner state.
pub const SONAR_DIR_DEFAULT: &str = ".sonar";

/// Subdirectory of `sonar.userHome` holding the content-addressed cache.
pub const SONAR_CACHE_DIR_NAME: &str = "cache";

/// Suffix appended to an archive filename for its unpacked sibling directory.
pub const UNARCHIVE_SUFFIX: &str = "_extracted";

/// Minimum server version that can provision a JRE and engine.
pub const JRE_PROVISIONING_MIN_VERSION: &str = "10.6";
