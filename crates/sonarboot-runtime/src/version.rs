//! Server version coercion and the provisioning threshold.
//!
//! Servers report versions in irregular shapes (`10.6`, `9.9.4.87374`,
//! `10.7-SNAPSHOT`); the comparison only cares about the first three
//! numeric dot components.

use semver::Version;

use sonarboot_core::JRE_PROVISIONING_MIN_VERSION;

use crate::error::BootstrapError;

/// Coerce an irregular version string into a semantic version.
///
/// Takes the leading numeric run of each of the first three dot
/// components; missing components default to zero. Returns `None` when the
/// first component has no leading digits at all.
pub fn coerce_version(raw: &str) -> Option<Version> {
    let mut parts = [0u64; 3];
    for (index, component) in raw.trim().split('.').take(3).enumerate() {
        let digits: String = component.chars().take_while(char::is_ascii_digit).collect();
        if digits.is_empty() {
            if index == 0 {
                return None;
            }
            break;
        }
        parts[index] = digits.parse().ok()?;
        // A trailing qualifier like "7-SNAPSHOT" ends the numeric prefix.
        if digits.len() != component.len() {
            break;
        }
    }
    Some(Version::new(parts[0], parts[1], parts[2]))
}

/// Whether a server reporting `raw` can provision a JRE and engine.
pub fn supports_provisioning(raw: &str) -> Result<bool, BootstrapError> {
    let version =
        coerce_version(raw).ok_or_else(|| BootstrapError::UnparsableServerVersion(raw.to_string()))?;
    let minimum = coerce_version(JRE_PROVISIONING_MIN_VERSION).unwrap_or_else(|| Version::new(10, 6, 0));
    Ok(version >= minimum)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_versions_coerce() {
        assert_eq!(coerce_version("10.6").unwrap(), Version::new(10, 6, 0));
        assert_eq!(coerce_version("9.9.4.87374").unwrap(), Version::new(9, 9, 4));
        assert_eq!(coerce_version("10").unwrap(), Version::new(10, 0, 0));
    }

    #[test]
    fn qualifiers_after_the_numeric_prefix_are_dropped() {
        assert_eq!(
            coerce_version("10.7-SNAPSHOT").unwrap(),
            Version::new(10, 7, 0)
        );
        assert_eq!(coerce_version(" 10.6.1 ").unwrap(), Version::new(10, 6, 1));
    }

    #[test]
    fn non_numeric_versions_do_not_coerce() {
        assert!(coerce_version("latest").is_none());
        assert!(coerce_version("").is_none());
        assert!(coerce_version("-SNAPSHOT").is_none());
    }

    #[test]
    fn threshold_comparison() {
        assert!(supports_provisioning("10.6").unwrap());
        assert!(supports_provisioning("10.7.2").unwrap());
        assert!(supports_provisioning("2025.1").unwrap());
        assert!(!supports_provisioning("10.5.1").unwrap());
        assert!(!supports_provisioning("9.9.4.87374").unwrap());
    }

    #[test]
    fn unparsable_server_version_is_fatal() {
        let err = supports_provisioning("unknown").unwrap_err();
        assert!(matches!(err, BootstrapError::UnparsableServerVersion(_)));
    }
}
