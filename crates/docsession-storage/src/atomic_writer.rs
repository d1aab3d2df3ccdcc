//! Atomic file replacement for document snapshots

use crate::traits::StorageResult;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Temporary sibling file that is removed unless it was renamed into place
struct PendingFile {
    path: PathBuf,
    file: File,
    committed: bool,
}

impl PendingFile {
    fn create(target: &Path) -> StorageResult<Self> {
        let mut path = target.as_os_str().to_owned();
        path.push(".tmp");
        let path = PathBuf::from(path);
        let file = File::create(&path)?;

        Ok(Self {
            path,
            file,
            committed: false,
        })
    }

    fn rename_to(mut self, target: &Path) -> StorageResult<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        fs::rename(&self.path, target)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PendingFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Replace `target` with `data` so readers see either the old or the new snapshot
///
/// Missing parent directories are created.
pub(crate) fn write_atomic(target: &Path, data: &[u8]) -> StorageResult<()> {
    if let Some(parent) = target.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let mut pending = PendingFile::create(target)?;
    pending.file.write_all(data)?;
    pending.rename_to(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_creates_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("db.json");

        write_atomic(&path, b"[]").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "[]");
    }

    #[test]
    fn test_write_creates_parent_dir() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/dir/db.json");

        write_atomic(&path, b"{}").unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_write_replaces_existing_and_leaves_no_temp() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("db.json");
        fs::write(&path, b"{\"old\":true}").unwrap();

        write_atomic(&path, b"{\"new\":true}").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"new\":true}");
        assert!(!temp_dir.path().join("db.json.tmp").exists());
    }

    #[test]
    fn test_uncommitted_temp_is_removed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("db.json");

        {
            let mut pending = PendingFile::create(&path).unwrap();
            pending.file.write_all(b"partial").unwrap();
        }

        assert!(!path.exists());
        assert!(!temp_dir.path().join("db.json.tmp").exists());
    }
}
