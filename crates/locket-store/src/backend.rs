//! Key-value backends for envelope strings.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::Context;
use locket_core::{LocketError, LocketResult};

/// A durable string-to-string store. Holds envelopes only, never plaintext.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> LocketResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> LocketResult<()>;
    fn remove(&self, key: &str) -> LocketResult<()>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> LocketResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> LocketResult<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> LocketResult<()> {
        (**self).remove(key)
    }
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> LocketResult<Option<String>> {
        let map = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> LocketResult<()> {
        let mut map = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> LocketResult<()> {
        let mut map = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        map.remove(key);
        Ok(())
    }
}

/// JSON-object file store, loaded into memory on open and written through on
/// every mutation.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl JsonFileStore {
    /// Load or create a store at the given path.
    /// If the file doesn't exist, starts empty; nothing is written until the first `set`.
    pub fn open(path: &Path) -> LocketResult<Self> {
        let entries = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading store: {}", path.display()))?;
            serde_json::from_str(&content).map_err(|e| {
                LocketError::Storage(format!("parsing store {}: {e}", path.display()))
            })?
        } else {
            HashMap::new()
        };

        tracing::debug!(path = %path.display(), "opened JSON store");
        Ok(Self {
            path: path.to_path_buf(),
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomic write: write to temp file, then rename
    fn flush(&self, entries: &HashMap<String, String>) -> LocketResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating store dir: {}", parent.display()))?;
            }
        }

        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| LocketError::Storage(format!("serializing store: {e}")))?;

        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, json)
            .with_context(|| format!("writing store temp: {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("renaming store: {}", self.path.display()))?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> LocketResult<Option<String>> {
        let map = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> LocketResult<()> {
        let mut map = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = map.insert(key.to_string(), value.to_string());
        if let Err(e) = self.flush(&map) {
            // Keep memory consistent with disk.
            match previous {
                Some(v) => map.insert(key.to_string(), v),
                None => map.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> LocketResult<()> {
        let mut map = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(previous) = map.remove(key) else {
            return Ok(());
        };
        if let Err(e) = self.flush(&map) {
            map.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_store_get_set_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "v1").unwrap();
        store.set("k", "v2").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v2"));
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn test_json_store_persists_across_open() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/dir/store.json");

        {
            let store = JsonFileStore::open(&path).unwrap();
            assert!(!path.exists(), "open must not create the file");
            store.set("ids", "envelope-1").unwrap();
            store.set("memo:a", "envelope-2").unwrap();
        }

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get("ids").unwrap().as_deref(), Some("envelope-1"));
        assert_eq!(reopened.get("memo:a").unwrap().as_deref(), Some("envelope-2"));

        reopened.remove("memo:a").unwrap();
        let again = JsonFileStore::open(&path).unwrap();
        assert_eq!(again.get("memo:a").unwrap(), None);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_json_store_rejects_garbage_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            JsonFileStore::open(&path),
            Err(LocketError::Storage(_))
        ));
    }

    #[test]
    fn test_remove_missing_key_is_noop() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.json");
        let store = JsonFileStore::open(&path).unwrap();
        store.remove("absent").unwrap();
        assert!(!path.exists());
    }
}
