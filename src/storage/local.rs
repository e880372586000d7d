//! File-backed identity store.
//!
//! The whole key set lives in memory and is written as one JSON snapshot.
//! Writes go to a sibling temp file which is synced and then renamed over the
//! target, so a crash leaves either the previous or the new snapshot.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;

use crate::error::StoreError;
use crate::models::ListingKey;
use crate::storage::{IdentityStore, StoreSnapshot};

/// Identity store persisted to a single JSON file.
#[derive(Debug)]
pub struct FileIdentityStore {
    path: PathBuf,
    entries: HashMap<ListingKey, DateTime<Utc>>,
    dirty: bool,
}

impl FileIdentityStore {
    /// Open the store at `path`, creating it when missing.
    ///
    /// The normalized snapshot is written back right away, so an unwritable
    /// location fails here rather than after the first notification.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match read_snapshot(&path).await? {
            Some(snapshot) => snapshot.into_map(),
            None => {
                log::info!("No store at {}, starting empty", path.display());
                HashMap::new()
            }
        };

        let store = Self {
            path,
            entries,
            dirty: false,
        };
        store.persist().await?;
        log::info!(
            "Loaded {} known listings from {}",
            store.entries.len(),
            store.path.display()
        );
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// When the key was first notified.
    pub fn notified_at(&self, key: &ListingKey) -> Option<DateTime<Utc>> {
        self.entries.get(key).copied()
    }

    /// Whether commits are waiting for a flush.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    async fn persist(&self) -> Result<(), StoreError> {
        let snapshot = StoreSnapshot::from_entries(&self.entries);
        let bytes = serde_json::to_vec_pretty(&snapshot)?;
        write_bytes(&self.path, &bytes).await
    }
}

#[async_trait]
impl IdentityStore for FileIdentityStore {
    fn contains(&self, key: &ListingKey) -> bool {
        self.entries.contains_key(key)
    }

    fn commit(&mut self, key: ListingKey) {
        if self.entries.contains_key(&key) {
            return;
        }
        self.entries.insert(key, Utc::now());
        self.dirty = true;
    }

    async fn flush(&mut self) -> Result<(), StoreError> {
        if !self.dirty {
            return Ok(());
        }
        self.persist().await?;
        self.dirty = false;
        log::debug!(
            "Flushed {} keys to {}",
            self.entries.len(),
            self.path.display()
        );
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Read a snapshot without opening the store. `None` when the file is missing
/// or empty.
pub async fn read_snapshot(path: &Path) -> Result<Option<StoreSnapshot>, StoreError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
}

/// Write bytes atomically (write to temp, sync, then rename).
async fn write_bytes(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::io(parent, e))?;
    }

    let tmp = path.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp)
        .await
        .map_err(|e| StoreError::io(&tmp, e))?;
    file.write_all(bytes)
        .await
        .map_err(|e| StoreError::io(&tmp, e))?;
    file.sync_all().await.map_err(|e| StoreError::io(&tmp, e))?;
    drop(file);

    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| StoreError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key(id: &str) -> ListingKey {
        ListingKey::new("gewobag", id)
    }

    #[tokio::test]
    async fn test_load_missing_creates_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state").join("notified.json");

        let store = FileIdentityStore::load(&path).await.unwrap();
        assert!(store.is_empty());
        assert!(path.exists());

        let snapshot = read_snapshot(&path).await.unwrap().unwrap();
        assert_eq!(snapshot.count, 0);
        assert_eq!(snapshot.version, 1);
    }

    #[tokio::test]
    async fn test_flush_and_reload() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notified.json");

        let mut store = FileIdentityStore::load(&path).await.unwrap();
        store.commit(key("a1"));
        store.commit(ListingKey::new("wbm", "u1"));
        assert!(store.is_dirty());
        store.flush().await.unwrap();
        assert!(!store.is_dirty());

        let reloaded = FileIdentityStore::load(&path).await.unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.contains(&key("a1")));
        assert!(reloaded.contains(&ListingKey::new("wbm", "u1")));
        assert!(!reloaded.contains(&key("a2")));
    }

    #[tokio::test]
    async fn test_double_commit_is_noop() {
        let tmp = TempDir::new().unwrap();
        let mut store = FileIdentityStore::load(tmp.path().join("n.json"))
            .await
            .unwrap();

        store.commit(key("a1"));
        let first = store.notified_at(&key("a1")).unwrap();
        store.flush().await.unwrap();

        store.commit(key("a1"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.notified_at(&key("a1")), Some(first));
        assert!(!store.is_dirty());
    }

    #[tokio::test]
    async fn test_commit_without_flush_is_lost() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notified.json");

        {
            let mut store = FileIdentityStore::load(&path).await.unwrap();
            store.commit(key("a1"));
            store.flush().await.unwrap();
            store.commit(key("a2"));
        }

        let reloaded = FileIdentityStore::load(&path).await.unwrap();
        assert!(reloaded.contains(&key("a1")));
        assert!(!reloaded.contains(&key("a2")));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notified.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let err = FileIdentityStore::load(&path).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_empty_file_is_empty_store() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notified.json");
        tokio::fs::write(&path, b"\n").await.unwrap();

        let store = FileIdentityStore::load(&path).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_unwritable_location_is_error() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        tokio::fs::write(&blocker, b"file, not a directory")
            .await
            .unwrap();

        let err = FileIdentityStore::load(blocker.join("notified.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }

    #[tokio::test]
    async fn test_flush_clean_store_does_not_write() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notified.json");
        let mut store = FileIdentityStore::load(&path).await.unwrap();

        tokio::fs::remove_file(&path).await.unwrap();
        store.flush().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_entries_written_sorted() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notified.json");
        let mut store = FileIdentityStore::load(&path).await.unwrap();
        store.commit(ListingKey::new("wbm", "u1"));
        store.commit(key("b"));
        store.commit(key("a"));
        store.flush().await.unwrap();

        let snapshot = read_snapshot(&path).await.unwrap().unwrap();
        let ids: Vec<&str> = snapshot.entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "u1"]);
        assert!(!path.with_extension("tmp").exists());
    }
}
