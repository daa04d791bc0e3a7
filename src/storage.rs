//! Storage directory handling
//!
//! Database files are only ever replaced whole: the bytes go to a hidden
//! temporary file in the same directory, are synced, and then renamed over
//! the canonical path. A reader that opens the canonical path sees either the
//! old file or the new one, never a partial write.

use crate::error::GeoError;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Create `dir` if needed and check it is a directory
pub fn ensure_directory(dir: &Path) -> Result<(), GeoError> {
    let unavailable = |source| GeoError::StorageUnavailable {
        path: dir.to_path_buf(),
        source,
    };

    fs::create_dir_all(dir).map_err(unavailable)?;
    let metadata = fs::metadata(dir).map_err(unavailable)?;
    if !metadata.is_dir() {
        return Err(unavailable(std::io::Error::new(
            std::io::ErrorKind::Other,
            "not a directory",
        )));
    }
    if metadata.permissions().readonly() {
        return Err(unavailable(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "directory is read-only",
        )));
    }
    Ok(())
}

/// Atomically replace `path` with `bytes`
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), GeoError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let unavailable = |source| GeoError::StorageUnavailable {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(&format!(".{}.", file_name))
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(unavailable)?;

    tmp.write_all(bytes).map_err(unavailable)?;
    tmp.as_file().sync_all().map_err(unavailable)?;
    // Dropping a failed persist removes the temporary file
    tmp.persist(path).map_err(|e| unavailable(e.error))?;

    debug!(path = %path.display(), bytes = bytes.len(), "wrote database file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_directory_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_directory(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_ensure_directory_rejects_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(
            ensure_directory(&file),
            Err(GeoError::StorageUnavailable { .. })
        ));
    }

    #[test]
    fn test_write_atomic_replaces_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("country.mmdb");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["country.mmdb".to_string()]);
    }
}
