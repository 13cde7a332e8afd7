//! Durable key/value storage for session persistence
//!
//! Mirrors browser local storage: string keys, string values, scoped to one
//! store. `FileStore` keeps a JSON object on disk; `MemoryStore` is process-local.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Key holding the serialized session
pub const SESSION_KEY: &str = "wc_session";

/// Key holding the chain identifier the session was established for
pub const CHAIN_KEY: &str = "wc_chain";

/// String key/value store
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` if absent
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value; deleting an absent key is not an error
    async fn remove(&self, key: &str) -> Result<()>;
}

/// JSON-file backed store
///
/// Writes go through a temp file and rename so a crash never leaves a torn file.
/// Other processes sharing the file see last-writer-wins.
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_raw(&self) -> Result<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Storage(format!(
                "Failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn parse(&self, content: &str) -> Result<BTreeMap<String, String>> {
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(content).map_err(|e| {
            Error::Storage(format!("Failed to parse {}: {}", self.path.display(), e))
        })
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>> {
        match self.read_raw().await? {
            Some(content) => self.parse(&content),
            None => Ok(BTreeMap::new()),
        }
    }

    /// Entries to modify. An unparseable file is treated as empty and flagged
    /// so the next write replaces it.
    async fn read_for_update(&self) -> Result<(BTreeMap<String, String>, bool)> {
        let Some(content) = self.read_raw().await? else {
            return Ok((BTreeMap::new(), false));
        };

        match self.parse(&content) {
            Ok(entries) => Ok((entries, false)),
            Err(e) => {
                warn!("{} - replacing it", e);
                Ok((BTreeMap::new(), true))
            }
        }
    }

    async fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    Error::Storage(format!("Failed to create {}: {}", parent.display(), e))
                })?;
            }
        }

        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");

        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| Error::Storage(format!("Failed to write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            Error::Storage(format!("Failed to replace {}: {}", self.path.display(), e))
        })?;

        debug!("Saved {} storage entries to {}", entries.len(), self.path.display());
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.read_all().await?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let (mut entries, _) = self.read_for_update().await?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let (mut entries, corrupt) = self.read_for_update().await?;
        if entries.remove(key).is_some() || corrupt {
            self.write_all(&entries).await?;
        }
        Ok(())
    }
}

/// In-memory store
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_store_missing_file() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("storage.json"));
        assert_eq!(store.get(SESSION_KEY).await.unwrap(), None);
        store.remove(SESSION_KEY).await.unwrap();
    }

    #[tokio::test]
    async fn test_file_store_persists_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");

        let store = FileStore::new(&path);
        store.set(CHAIN_KEY, "stacks:1").await.unwrap();
        store.set(SESSION_KEY, r#"{"topic":"t"}"#).await.unwrap();

        let reopened = FileStore::new(&path);
        assert_eq!(
            reopened.get(CHAIN_KEY).await.unwrap().as_deref(),
            Some("stacks:1")
        );
        assert_eq!(
            reopened.get(SESSION_KEY).await.unwrap().as_deref(),
            Some(r#"{"topic":"t"}"#)
        );

        reopened.remove(CHAIN_KEY).await.unwrap();
        assert_eq!(store.get(CHAIN_KEY).await.unwrap(), None);
        assert!(store.get(SESSION_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "not json").unwrap();

        let store = FileStore::new(&path);
        assert!(matches!(store.get(CHAIN_KEY).await, Err(Error::Storage(_))));
    }

    #[tokio::test]
    async fn test_file_store_write_replaces_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, r#"{"wc_session": "trunc"#).unwrap();

        let store = FileStore::new(&path);
        store.set(CHAIN_KEY, "stacks:1").await.unwrap();

        assert_eq!(store.get(CHAIN_KEY).await.unwrap().as_deref(), Some("stacks:1"));
        assert_eq!(store.get(SESSION_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_remove_replaces_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "not json").unwrap();

        let store = FileStore::new(&path);
        store.remove(SESSION_KEY).await.unwrap();

        assert_eq!(store.get(SESSION_KEY).await.unwrap(), None);
        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "{}");
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        assert!(store.is_empty());

        store.set(CHAIN_KEY, "bip122:abc").await.unwrap();
        assert_eq!(store.get(CHAIN_KEY).await.unwrap().as_deref(), Some("bip122:abc"));
        assert_eq!(store.len(), 1);

        store.remove(CHAIN_KEY).await.unwrap();
        assert!(store.is_empty());
    }
}
