//! Common file system operations with unified error handling

use std::fs::{File, Metadata};
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{Result, fs};

/// Replace `path` with `contents` atomically
///
/// The data is written to a temporary file in the same directory and renamed over the
/// target, so readers never observe a half-written file. Parent directories are created.
/// An existing target keeps its permissions and, on Unix, its owner; a new file is
/// created with mode 0600.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let shown = path.display().to_string();
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| fs::write_failed(&shown, e))?;

    let mut temp = NamedTempFile::new_in(parent).map_err(|e| fs::write_failed(&shown, e))?;
    temp.write_all(contents)
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|e| fs::write_failed(&shown, e))?;

    match std::fs::metadata(path) {
        Ok(existing) => copy_metadata(&existing, temp.as_file(), &shown)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(fs::write_failed(&shown, e)),
    }

    temp.persist(path)
        .map_err(|e| fs::write_failed(&shown, e.error))?;
    Ok(())
}

fn copy_metadata(existing: &Metadata, file: &File, shown: &str) -> Result<()> {
    file.set_permissions(existing.permissions())
        .map_err(|e| fs::write_failed(shown, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;

        let current = file.metadata().map_err(|e| fs::write_failed(shown, e))?;
        if (current.uid(), current.gid()) != (existing.uid(), existing.gid()) {
            // Only root may hand a file to another user
            let owner = (Some(existing.uid()), Some(existing.gid()));
            if let Err(e) = std::os::unix::fs::fchown(file, owner.0, owner.1) {
                tracing::warn!(path = shown, error = %e, "could not keep file owner");
            }
        }
    }

    Ok(())
}

/// Read a file, returning `None` when it does not exist
pub fn read_optional(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(fs::read_failed(path.display().to_string(), e)),
    }
}
