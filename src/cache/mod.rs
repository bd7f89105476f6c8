//! Application cache directory management
//!
//! The application renders absolute links into its cache, so a base URL change makes the
//! whole cache stale. Invalidation is all-or-nothing: every entry below the cache
//! directory is removed and the directory itself is kept for the application to refill.

use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::common::display_utils::format_size;
use crate::error::{Result, cache};

/// Cache statistics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Whether the cache directory exists at all
    pub exists: bool,
    pub files: usize,
    pub directories: usize,
    /// Total size in bytes
    pub total_size: u64,
}

impl CacheStats {
    pub fn formatted_size(&self) -> String {
        format_size(self.total_size)
    }

    pub fn is_empty(&self) -> bool {
        self.files == 0 && self.directories == 0
    }
}

/// Gather statistics about `dir` without following symlinks
pub fn cache_stats(dir: &Path) -> Result<CacheStats> {
    if !dir.is_dir() {
        return Ok(CacheStats::default());
    }

    let mut stats = CacheStats {
        exists: true,
        ..CacheStats::default()
    };
    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = entry.map_err(|e| {
            cache::operation_failed(format!("Failed to walk {}: {}", dir.display(), e))
        })?;
        if entry.file_type().is_dir() {
            stats.directories += 1;
        } else {
            stats.files += 1;
            stats.total_size += entry.metadata().map(|m| m.len()).unwrap_or(0);
        }
    }
    Ok(stats)
}

/// Delete every entry below `dir`, returning how many top-level entries were removed
///
/// A missing directory counts as already empty.
pub fn clear(dir: &Path) -> Result<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => {
            return Err(cache::operation_failed(format!(
                "Failed to read cache directory {}: {}",
                dir.display(),
                e
            )));
        }
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry.map_err(|e| {
            cache::operation_failed(format!("Failed to read cache entry: {}", e))
        })?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| {
            cache::operation_failed(format!("Failed to inspect {}: {}", path.display(), e))
        })?;
        let result = if file_type.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        result.map_err(|e| {
            cache::operation_failed(format!("Failed to remove {}: {}", path.display(), e))
        })?;
        removed += 1;
    }

    tracing::debug!(cache_dir = %dir.display(), removed, "cache cleared");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn populate(dir: &Path) {
        fs::create_dir_all(dir.join("theme/boost")).unwrap();
        fs::write(dir.join("theme/boost/all.css"), "body{}").unwrap();
        fs::write(dir.join("lang.json"), "{\"a\":1}").unwrap();
        fs::create_dir_all(dir.join("empty")).unwrap();
    }

    #[test]
    fn test_clear_keeps_directory_and_empties_it() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("cache");
        populate(&dir);

        let removed = clear(&dir).unwrap();
        assert_eq!(removed, 3);
        assert!(dir.is_dir());
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
    }

    #[test]
    fn test_clear_missing_directory() {
        let temp = TempDir::new().unwrap();
        assert_eq!(clear(&temp.path().join("absent")).unwrap(), 0);
    }

    #[test]
    fn test_stats() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("cache");
        populate(&dir);

        let stats = cache_stats(&dir).unwrap();
        assert!(stats.exists);
        assert_eq!(stats.files, 2);
        assert_eq!(stats.directories, 3);
        assert_eq!(stats.total_size, 13);
        assert_eq!(stats.formatted_size(), "13 B");
    }

    #[test]
    fn test_stats_missing_directory() {
        let temp = TempDir::new().unwrap();
        let stats = cache_stats(&temp.path().join("absent")).unwrap();
        assert!(!stats.exists);
        assert!(stats.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_clear_removes_symlink_not_target() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("cache");
        let outside = temp.path().join("outside");
        fs::create_dir_all(&dir).unwrap();
        fs::create_dir_all(&outside).unwrap();
        fs::write(outside.join("keep.txt"), "keep").unwrap();
        std::os::unix::fs::symlink(&outside, dir.join("link")).unwrap();

        clear(&dir).unwrap();
        assert!(outside.join("keep.txt").is_file());
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
    }
}
