//! SHA-256 content addressing.
//!
//! `validate` is a pure check and never mutates the filesystem; callers
//! that want deletion-on-failure delete explicitly after catching the
//! verification error.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::CacheError;

/// Hex-encoded SHA-256 of the file's raw bytes, streamed in chunks.
pub fn checksum(path: &Path) -> Result<String, CacheError> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 1024 * 1024];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Verify the file at `path` against `expected` (case-sensitive hex digest).
///
/// An empty expected digest is itself an error, never "skip verification".
pub fn validate(path: &Path, expected: &str) -> Result<(), CacheError> {
    if expected.is_empty() {
        return Err(CacheError::ChecksumMissing(path.display().to_string()));
    }
    let actual = checksum(path)?;
    if actual != expected {
        return Err(CacheError::ChecksumMismatch {
            expected: expected.to_string(),
            actual,
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn checksum_matches_known_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        fs::write(&path, b"hello world").unwrap();
        // sha256 of "hello world"
        assert_eq!(
            checksum(&path).unwrap(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn validate_accepts_matching_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        fs::write(&path, b"payload").unwrap();
        let digest = checksum(&path).unwrap();
        validate(&path, &digest).unwrap();
    }

    #[test]
    fn validate_names_both_digests_on_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        fs::write(&path, b"payload").unwrap();
        let expected = "0".repeat(64);
        let err = validate(&path, &expected).unwrap_err();
        match err {
            CacheError::ChecksumMismatch {
                expected: e,
                actual,
                ..
            } => {
                assert_eq!(e, expected);
                assert_eq!(actual, checksum(&path).unwrap());
            }
            other => panic!("unexpected error: {other}"),
        }
        // validate never deletes
        assert!(path.exists());
    }

    #[test]
    fn empty_expected_digest_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        fs::write(&path, b"payload").unwrap();
        let err = validate(&path, "").unwrap_err();
        assert!(matches!(err, CacheError::ChecksumMissing(_)));
    }
}
