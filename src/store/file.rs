//! JSON-file backed key→string store

use irblaster_shared::{KvStore, StoreError};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Namespace persisted as one JSON object; writes land on commit
///
/// Commits are synchronous file writes. Callers reach this through
/// `StoreGuard`, which runs them on the blocking pool.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
    staged: BTreeMap<String, String>,
}

impl FileStore {
    /// Load the namespace at `path`, starting empty if the file is missing
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| StoreError::Backend(format!("{}: {}", path.display(), e)))?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(StoreError::Backend(format!("{}: {}", path.display(), e))),
        };

        info!("[STORE] Opened {} ({} keys)", path.display(), entries.len());
        Ok(Self {
            path,
            entries,
            staged: BTreeMap::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_file(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let raw = serde_json::to_string_pretty(entries).map_err(|e| StoreError::Backend(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, raw).map_err(|e| StoreError::Backend(format!("{}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &self.path).map_err(|e| StoreError::Backend(format!("{}: {}", self.path.display(), e)))
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.staged.get(key).or_else(|| self.entries.get(key)).cloned())
    }

    fn put(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.staged.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        if self.staged.is_empty() {
            return Ok(());
        }

        let mut merged = self.entries.clone();
        merged.append(&mut self.staged);
        if let Err(e) = self.write_file(&merged) {
            warn!("[STORE] Commit failed, staged writes dropped: {}", e);
            return Err(e);
        }

        self.entries = merged;
        debug!("[STORE] Committed {} keys", self.entries.len());
        Ok(())
    }

    fn rollback(&mut self) {
        if !self.staged.is_empty() {
            debug!("[STORE] Rolled back {} staged keys", self.staged.len());
            self.staged.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use irblaster_shared::{SavedCommand, SavedCommands, SavedError};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn scratch_path() -> PathBuf {
        static SEQ: AtomicU32 = AtomicU32::new(0);
        std::env::temp_dir().join(format!(
            "irblaster-store-{}-{}.json",
            std::process::id(),
            SEQ.fetch_add(1, Ordering::SeqCst)
        ))
    }

    #[test]
    fn test_missing_file_starts_empty() {
        let path = scratch_path();
        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get("n").unwrap(), None);
        assert!(!path.exists());
    }

    #[test]
    fn test_commit_persists_across_reopen() {
        let path = scratch_path();
        {
            let mut store = FileStore::open(&path).unwrap();
            let mut saved = SavedCommands::new(&mut store);
            saved.append(&SavedCommand::new("Power", "NEC", "FF827D", 32)).unwrap();
        }

        let mut reopened = FileStore::open(&path).unwrap();
        let saved = SavedCommands::new(&mut reopened);
        assert_eq!(saved.count().unwrap(), 1);
        assert_eq!(saved.get(0).unwrap().name, "Power");

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_uncommitted_writes_are_not_persisted() {
        let path = scratch_path();
        {
            let mut store = FileStore::open(&path).unwrap();
            store.put("n", "3").unwrap();
        }
        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get("n").unwrap(), None);
    }

    #[test]
    fn test_failed_commit_leaves_no_visible_write() {
        let dir = scratch_path().with_extension("d");
        let path = dir.join("codes.json");
        let mut store = FileStore::open(&path).unwrap();

        let mut saved = SavedCommands::new(&mut store);
        let result = saved.append(&SavedCommand::new("Power", "NEC", "FF827D", 32));
        assert!(matches!(result, Err(SavedError::Store(StoreError::Backend(_)))));
        assert_eq!(saved.count().unwrap(), 0);
        assert!(matches!(saved.get(0), Err(SavedError::IndexOutOfRange { .. })));

        // A later successful commit must not carry the failed write along
        fs::create_dir_all(&dir).unwrap();
        store.put("other", "1").unwrap();
        store.commit().unwrap();
        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get("0").unwrap(), None);
        assert_eq!(reopened.get("other").unwrap().as_deref(), Some("1"));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_rollback_discards_staged_writes() {
        let path = scratch_path();
        let mut store = FileStore::open(&path).unwrap();
        store.put("n", "3").unwrap();
        assert_eq!(store.get("n").unwrap().as_deref(), Some("3"));

        store.rollback();
        assert_eq!(store.get("n").unwrap(), None);
        store.commit().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_corrupt_file_is_a_backend_error() {
        let path = scratch_path();
        fs::write(&path, "not json").unwrap();
        assert!(matches!(FileStore::open(&path), Err(StoreError::Backend(_))));
        fs::remove_file(&path).unwrap();
    }
}
