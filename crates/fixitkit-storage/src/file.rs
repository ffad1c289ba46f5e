//! File-backed storage.
//!
//! Keeps every key in a single JSON object on disk. On unix the file is
//! created with mode 0600 and rewritten through a temp file + rename so a
//! crash never leaves a half-written session behind.

use crate::{SecureStorage, StorageError, StorageResult};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

type Entries = BTreeMap<String, String>;

/// JSON map persisted to a single owner-only file.
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> StorageResult<Entries> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(Entries::new()),
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| StorageError::Encoding(format!("{}: {}", self.path.display(), e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Entries::new()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn write_entries(&self, entries: &Entries) -> StorageResult<()> {
        if entries.is_empty() {
            return match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(StorageError::Io(e)),
            };
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| StorageError::Encoding(e.to_string()))?;

        let tmp_path = self.path.with_extension("tmp");
        {
            let mut file = open_private(&tmp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        debug!(path = %self.path.display(), keys = entries.len(), "wrote storage file");
        Ok(())
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
}

impl SecureStorage for FileStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let _guard = self.lock.lock();
        let mut entries = self.read_entries()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_entries(&entries)
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let _guard = self.lock.lock();
        Ok(self.read_entries()?.remove(key))
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let _guard = self.lock.lock();
        let mut entries = self.read_entries()?;
        if entries.remove(key).is_none() {
            return Ok(false);
        }
        self.write_entries(&entries)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_storage_persists_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");

        FileStorage::new(&path).set("k", "v").unwrap();

        let reopened = FileStorage::new(&path);
        assert_eq!(reopened.get("k").unwrap(), Some("v".to_string()));
        assert!(reopened.has("k").unwrap());
    }

    #[test]
    fn test_missing_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nope.json"));

        assert_eq!(storage.get("anything").unwrap(), None);
        assert!(!storage.delete("anything").unwrap());
    }

    #[test]
    fn test_deleting_last_key_removes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        let storage = FileStorage::new(&path);

        storage.set("a", "1").unwrap();
        storage.set("b", "2").unwrap();
        assert!(storage.delete("a").unwrap());
        assert!(path.exists());
        assert!(storage.delete("b").unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn test_corrupt_file_is_encoding_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").unwrap();

        let storage = FileStorage::new(&path);
        assert!(matches!(storage.get("k"), Err(StorageError::Encoding(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");
        let storage = FileStorage::new(&path);
        storage.set("k", "v").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
