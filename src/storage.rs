use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{LimiterError, Result};

/// Record holding the selection to shield
pub const DISCOURAGE_KEY: &str = "selectionToDiscourage";

/// Record holding the selection to monitor
pub const ENCOURAGE_KEY: &str = "selectionToEncourage";

/// Record holding the last requested enforcement intent
pub const BLOCKING_KEY: &str = "Blocking";

/// Key-value persistence area scoped to the application
pub trait KeyValueStore: Send + Sync {
    /// Read a record, `None` if it was never written
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a record, replacing any previous value
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a record if present
    fn remove(&self, key: &str) -> Result<()>;
}

/// Read and decode a JSON record
pub fn read_record<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        Some(content) => serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| LimiterError::persistence(key, format!("corrupt record: {}", e))),
        None => Ok(None),
    }
}

/// Encode and write a JSON record
pub fn write_record<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value).map_err(|e| LimiterError::persistence(key, e))?;
    store.set(key, &content)
}

/// Stores each record as `<dir>/<key>.json`
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.record_path(key);
        if !path.exists() {
            return Ok(None);
        }

        tracing::debug!("Reading record {} from {}", key, path.display());
        std::fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| LimiterError::persistence(key, format!("{}: {}", path.display(), e)))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.record_path(key);
        tracing::debug!("Writing record {} to {}", key, path.display());
        atomic_write(&path, value.as_bytes())
            .map_err(|e| LimiterError::persistence(key, format!("{}: {}", path.display(), e)))
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.record_path(key);
        if path.exists() {
            std::fs::remove_file(&path)
                .map_err(|e| LimiterError::persistence(key, format!("{}: {}", path.display(), e)))?;
        }
        Ok(())
    }
}

/// Atomically write content to a file
///
/// Writes to a temporary file next to the target, syncs it and renames it
/// over the target path.
pub fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&temp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
    }

    std::fs::rename(&temp_path, path)
}

/// In-process store for tests and ephemeral embedding
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, String>>,
    fail_writes: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail until turned off again
    pub fn fail_writes(&self, fail: bool) {
        if let Ok(mut flag) = self.fail_writes.lock() {
            *flag = fail;
        }
    }

    /// Store a raw value, bypassing fault injection
    pub fn insert_raw(&self, key: &str, value: &str) {
        if let Ok(mut records) = self.records.lock() {
            records.insert(key.to_string(), value.to_string());
        }
    }

    fn writes_failing(&self) -> bool {
        self.fail_writes.lock().map(|f| *f).unwrap_or(false)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let records = self
            .records
            .lock()
            .map_err(|e| LimiterError::persistence(key, e))?;
        Ok(records.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.writes_failing() {
            return Err(LimiterError::persistence(key, "write rejected"));
        }
        let mut records = self
            .records
            .lock()
            .map_err(|e| LimiterError::persistence(key, e))?;
        records.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        if self.writes_failing() {
            return Err(LimiterError::persistence(key, "write rejected"));
        }
        let mut records = self
            .records
            .lock()
            .map_err(|e| LimiterError::persistence(key, e))?;
        records.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::Selection;
    use assert_fs::prelude::*;
    use predicates::prelude::*;

    #[test]
    fn file_store_roundtrip() {
        let temp = assert_fs::TempDir::new().unwrap();
        let store = FileStore::new(temp.path());

        let selection = Selection::from_ids(["com.x"], ["games"]);
        write_record(&store, DISCOURAGE_KEY, &selection).unwrap();

        temp.child("selectionToDiscourage.json")
            .assert(predicate::str::contains("com.x"));
        temp.child("selectionToDiscourage.tmp")
            .assert(predicate::path::missing());

        let loaded: Option<Selection> = read_record(&store, DISCOURAGE_KEY).unwrap();
        assert_eq!(loaded, Some(selection));
    }

    #[test]
    fn file_store_missing_record_is_none() {
        let temp = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp.path());

        let loaded: Option<Selection> = read_record(&store, ENCOURAGE_KEY).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn file_store_creates_missing_directory() {
        let temp = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp.path().join("nested").join("records"));

        write_record(&store, BLOCKING_KEY, &true).unwrap();
        let loaded: Option<bool> = read_record(&store, BLOCKING_KEY).unwrap();
        assert_eq!(loaded, Some(true));
    }

    #[test]
    fn file_store_remove_is_idempotent() {
        let temp = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp.path());

        write_record(&store, BLOCKING_KEY, &false).unwrap();
        store.remove(BLOCKING_KEY).unwrap();
        store.remove(BLOCKING_KEY).unwrap();
        assert!(store.get(BLOCKING_KEY).unwrap().is_none());
    }

    #[test]
    fn corrupt_record_is_persistence_error() {
        let store = MemoryStore::new();
        store.insert_raw(ENCOURAGE_KEY, "{not json");

        let err = read_record::<Selection>(&store, ENCOURAGE_KEY).unwrap_err();
        assert!(matches!(err, LimiterError::Persistence { ref key, .. } if key == ENCOURAGE_KEY));
    }

    #[test]
    fn memory_store_fault_injection() {
        let store = MemoryStore::new();
        store.fail_writes(true);
        assert!(store.set(BLOCKING_KEY, "true").is_err());

        store.fail_writes(false);
        store.set(BLOCKING_KEY, "true").unwrap();
        assert_eq!(store.get(BLOCKING_KEY).unwrap().as_deref(), Some("true"));
    }
}
