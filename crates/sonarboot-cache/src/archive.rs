//! Safe archive extraction.
//!
//! The format is selected once at the boundary as a tagged variant; both
//! extractors enforce the same containment invariant: every entry's
//! normalized destination must lie within the extraction directory, and a
//! violating archive fails before any byte is written.

use std::fs::File;
use std::io::BufReader;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tracing::info;

use crate::error::CacheError;

/// Supported archive formats, detected from the filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarGz,
}

impl ArchiveKind {
    /// Select the format from the archive filename, once, at the boundary.
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveKind::TarGz)
        } else if name.ends_with(".zip") {
            Some(ArchiveKind::Zip)
        } else {
            None
        }
    }
}

/// Extract `archive_path` into `dest`, refusing any entry that would
/// escape it (zip slip). The whole extraction fails with nothing written
/// if any entry violates containment.
pub fn extract(archive_path: &Path, dest: &Path) -> Result<(), CacheError> {
    let kind = ArchiveKind::detect(archive_path)
        .ok_or_else(|| CacheError::UnsupportedArchive(archive_path.to_path_buf()))?;
    info!(
        "Extracting {} to {}",
        archive_path.display(),
        dest.display()
    );
    match kind {
        ArchiveKind::Zip => extract_zip(archive_path, dest),
        ArchiveKind::TarGz => extract_tar_gz(archive_path, dest),
    }
}

/// Normalize an entry path and refuse absolute paths and `..` traversal.
fn safe_entry_path(entry: &Path) -> Result<PathBuf, CacheError> {
    let mut normalized = PathBuf::new();
    for component in entry.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(CacheError::UnsafeArchivePath {
                    entry: entry.display().to_string(),
                });
            }
        }
    }
    Ok(normalized)
}

fn extract_zip(archive_path: &Path, dest: &Path) -> Result<(), CacheError> {
    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    // Validation pass before anything touches the filesystem.
    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        let name = entry.name().to_string();
        if entry.enclosed_name().is_none() {
            return Err(CacheError::UnsafeArchivePath { entry: name });
        }
        safe_entry_path(Path::new(&name))?;
    }

    std::fs::create_dir_all(dest)?;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let relative = safe_entry_path(Path::new(&entry.name().to_string()))?;
        let out_path = dest.join(relative);
        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out_file = File::create(&out_path)?;
        std::io::copy(&mut entry, &mut out_file)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode))?;
        }
    }
    Ok(())
}

fn extract_tar_gz(archive_path: &Path, dest: &Path) -> Result<(), CacheError> {
    // First pass reads headers only, so a traversal entry anywhere in the
    // stream fails the operation before a single byte lands on disk.
    {
        let file = File::open(archive_path)?;
        let decoder = GzDecoder::new(BufReader::new(file));
        let mut archive = tar::Archive::new(decoder);
        for entry in archive.entries()? {
            let entry = entry?;
            let path = entry.path()?.into_owned();
            safe_entry_path(&path)?;
        }
    }

    std::fs::create_dir_all(dest)?;
    let file = File::open(archive_path)?;
    let decoder = GzDecoder::new(BufReader::new(file));
    let mut archive = tar::Archive::new(decoder);
    for entry in archive.entries()? {
        let mut entry = entry?;
        let relative = safe_entry_path(&entry.path()?.into_owned())?;
        let out_path = dest.join(relative);
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // unpack preserves the original file mode bits
        entry.unpack(&out_path)?;
    }
    Ok(())
}
