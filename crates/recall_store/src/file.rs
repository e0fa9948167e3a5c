//! File-backed key-value storage.

use crate::backend::KeyValueBackend;
use crate::error::{StoreError, StoreResult};
use fs2::FileExt;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// A key-value backend persisted to a single JSON file.
///
/// Writes go to a temporary sibling file which is fsynced and then
/// renamed over the store, so a crash mid-write leaves either the old
/// or the new state, never a torn file. An fs2 advisory lock on a
/// sibling `.lock` file keeps two processes from sharing one store.
pub struct FileBackend {
    path: PathBuf,
    // Held for the lifetime of the backend; dropping releases the lock.
    _lock: File,
    entries: HashMap<String, String>,
}

impl FileBackend {
    /// Opens (or creates) the store at `path`.
    ///
    /// Fails with [`StoreError::Locked`] if another process holds the
    /// store open.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(lock_path(&path))?;
        lock.try_lock_exclusive().map_err(|_| StoreError::Locked {
            path: path.display().to_string(),
        })?;

        let entries = match fs::read_to_string(&path) {
            Ok(contents) if !contents.is_empty() => serde_json::from_str(&contents)?,
            Ok(_) => HashMap::new(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => return Err(err.into()),
        };

        Ok(Self {
            path,
            _lock: lock,
            entries,
        })
    }

    /// Returns the store path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> StoreResult<()> {
        let tmp = tmp_path(&self.path);
        let contents = serde_json::to_string(&self.entries)?;

        let mut file = File::create(&tmp)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut p = path.as_os_str().to_os_string();
    p.push(".lock");
    PathBuf::from(p)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut p = path.as_os_str().to_os_string();
    p.push(".tmp");
    PathBuf::from(p)
}

impl KeyValueBackend for FileBackend {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: String) -> StoreResult<()> {
        self.entries.insert(key.to_string(), value);
        self.persist()
    }

    fn remove(&mut self, key: &str) -> StoreResult<()> {
        if self.entries.remove(key).is_some() {
            self.persist()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> StoreResult<()> {
        self.persist()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        {
            let mut backend = FileBackend::open(&path).unwrap();
            backend.put("sync/decks", "[]".into()).unwrap();
            backend.put("sync/watermark", "null".into()).unwrap();
        }

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.get("sync/decks").unwrap().as_deref(), Some("[]"));
        assert_eq!(
            backend.get("sync/watermark").unwrap().as_deref(),
            Some("null")
        );
    }

    #[test]
    fn second_open_is_rejected_while_locked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let _first = FileBackend::open(&path).unwrap();
        let second = FileBackend::open(&path);
        assert!(matches!(second, Err(StoreError::Locked { .. })));
    }

    #[test]
    fn lock_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        drop(FileBackend::open(&path).unwrap());
        assert!(FileBackend::open(&path).is_ok());
    }

    #[test]
    fn remove_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        {
            let mut backend = FileBackend::open(&path).unwrap();
            backend.put("a", "1".into()).unwrap();
            backend.remove("a").unwrap();
        }

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.get("a").unwrap(), None);
    }

    #[test]
    fn no_temp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let mut backend = FileBackend::open(&path).unwrap();
        backend.put("a", "1".into()).unwrap();
        assert!(!tmp_path(&path).exists());
    }
}
