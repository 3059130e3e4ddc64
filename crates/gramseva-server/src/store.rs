//! JSON-file collection store.
//!
//! One file per collection under the data directory, each holding the whole
//! collection as a JSON array. Reads never fail: a missing or unparsable
//! file is an empty collection. Writes are serialized per collection and
//! land atomically (temp file, then rename), so a reader sees either the old
//! or the new array and two POSTs never interleave on disk.
//!
//! ```text
//! <data_dir>/
//! ├── accounts.json
//! ├── requests.json
//! ├── …one per Collection
//! ├── officer-keys.json
//! └── credentials.json
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use gramseva_types::{Collection, Record};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::constants::CREDENTIALS_FILE;
use crate::error::StoreError;

pub struct CollectionStore {
    dir: PathBuf,
    locks: DashMap<Collection, Arc<Mutex<()>>>,
    credentials_lock: Mutex<()>,
}

impl CollectionStore {
    /// Open (and create if needed) the data directory.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| StoreError::Io {
                path: dir.clone(),
                source,
            })?;
        Ok(Self {
            dir,
            locks: DashMap::new(),
            credentials_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, collection: Collection) -> PathBuf {
        self.dir.join(collection.file_name())
    }

    /// Write lock for one collection. Hold it across read-modify-write.
    ///
    /// Callers taking several locks take them in [`Collection`] order.
    pub async fn lock(&self, collection: Collection) -> OwnedMutexGuard<()> {
        let lock = self.locks.entry(collection).or_default().clone();
        lock.lock_owned().await
    }

    /// Write lock for the credential file.
    pub async fn lock_credentials(&self) -> MutexGuard<'_, ()> {
        self.credentials_lock.lock().await
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Whole collection as stored, or `[]`.
    pub async fn read_raw(&self, collection: Collection) -> Value {
        match self.read_file::<Value>(&collection.file_name()).await {
            Some(value @ Value::Array(_)) => value,
            Some(_) => {
                warn!(collection = %collection, "collection file is not an array; serving empty");
                Value::Array(Vec::new())
            }
            None => Value::Array(Vec::new()),
        }
    }

    /// Whole collection as typed records, or empty.
    pub async fn read<T: Record>(&self) -> Vec<T> {
        let raw = self.read_raw(T::COLLECTION).await;
        serde_json::from_value(raw).unwrap_or_else(|e| {
            warn!(collection = %T::COLLECTION, error = %e, "collection has malformed records; serving empty");
            Vec::new()
        })
    }

    /// Any JSON file under the data directory, `None` when absent or invalid.
    pub async fn read_file<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let path = self.dir.join(name);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "file absent");
                return None;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "read failed");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "parse failed");
                None
            }
        }
    }

    /// Typed records for a read-modify-write. Unlike [`CollectionStore::read`]
    /// anything unreadable is an error, so a write never replaces records it
    /// could not see. The caller holds [`CollectionStore::lock`].
    pub async fn read_for_update<T: Record>(&self) -> Result<Vec<T>, StoreError> {
        self.read_file_for_update(&T::COLLECTION.file_name()).await
    }

    /// Any JSON file for a read-modify-write: absent is `T::default()`,
    /// unreadable or unparsable is an error.
    pub async fn read_file_for_update<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T, StoreError> {
        let path = self.dir.join(name);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Malformed {
            name: name.to_string(),
            source,
        })
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Lock, then replace the collection verbatim.
    pub async fn replace(&self, collection: Collection, value: &Value) -> Result<(), StoreError> {
        let _guard = self.lock(collection).await;
        self.persist(collection, value).await
    }

    /// Replace the collection. The caller holds [`CollectionStore::lock`].
    pub async fn persist(&self, collection: Collection, value: &Value) -> Result<(), StoreError> {
        self.write_file(&collection.file_name(), value).await?;
        debug!(
            collection = %collection,
            records = value.as_array().map_or(0, Vec::len),
            "collection persisted"
        );
        Ok(())
    }

    /// Typed variant of [`CollectionStore::persist`]; returns what was written.
    pub async fn persist_records<T: Record>(&self, records: &[T]) -> Result<Value, StoreError> {
        let value = serde_json::to_value(records)
            .map_err(|e| StoreError::Serialize(T::COLLECTION.to_string(), e))?;
        self.persist(T::COLLECTION, &value).await?;
        Ok(value)
    }

    /// Atomically write any JSON file under the data directory.
    pub async fn write_file<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<(), StoreError> {
        let bytes =
            serde_json::to_vec_pretty(value).map_err(|e| StoreError::Serialize(name.to_string(), e))?;
        let path = self.dir.join(name);
        let tmp = self.dir.join(format!(".{name}.tmp"));

        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|source| StoreError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| StoreError::Io { path, source })
    }

    /// Empty every collection and forget every credential.
    pub async fn clear_all(&self) -> Result<(), StoreError> {
        let empty = Value::Array(Vec::new());
        for collection in Collection::all() {
            self.replace(collection, &empty).await?;
        }
        let _guard = self.lock_credentials().await;
        self.write_file(CREDENTIALS_FILE, &serde_json::Map::new()).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use gramseva_types::{LocationStamp, NoticeCategory, VillageNotice};
    use serde_json::json;

    async fn store() -> (tempfile::TempDir, CollectionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CollectionStore::open(dir.path()).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_absent_and_garbage_read_empty() {
        let (_dir, store) = store().await;
        assert_eq!(store.read_raw(Collection::Bills).await, json!([]));

        tokio::fs::write(store.path(Collection::Bills), b"{not json").await.unwrap();
        assert_eq!(store.read_raw(Collection::Bills).await, json!([]));

        tokio::fs::write(store.path(Collection::Bills), b"{\"a\":1}").await.unwrap();
        assert_eq!(store.read_raw(Collection::Bills).await, json!([]));
    }

    #[tokio::test]
    async fn test_replace_is_verbatim() {
        let (_dir, store) = store().await;
        let value = json!([{"id": "X", "anything": {"nested": true}}]);
        store.replace(Collection::Requests, &value).await.unwrap();
        assert_eq!(store.read_raw(Collection::Requests).await, value);
    }

    #[tokio::test]
    async fn test_typed_roundtrip_and_malformed() {
        let (_dir, store) = store().await;
        let notice = VillageNotice::new(LocationStamp::everywhere(), "Gram Sabha", "Sunday", NoticeCategory::Meeting);
        store.persist_records(std::slice::from_ref(&notice)).await.unwrap();
        let back: Vec<VillageNotice> = store.read().await;
        assert_eq!(back, vec![notice]);

        store.replace(Collection::Notices, &json!([{"id": 5}])).await.unwrap();
        assert!(store.read::<VillageNotice>().await.is_empty());
    }

    #[tokio::test]
    async fn test_update_read_refuses_unreadable_records() {
        let (_dir, store) = store().await;
        assert!(store.read_for_update::<VillageNotice>().await.unwrap().is_empty());

        store.replace(Collection::Notices, &json!([{"id": 5}])).await.unwrap();
        let err = store.read_for_update::<VillageNotice>().await.unwrap_err();
        assert!(matches!(err, StoreError::Malformed { .. }));

        tokio::fs::write(store.path(Collection::Notices), b"{not json").await.unwrap();
        assert!(store.read_for_update::<VillageNotice>().await.is_err());
    }

    #[tokio::test]
    async fn test_no_temp_files_left() {
        let (dir, store) = store().await;
        store.replace(Collection::Notices, &json!([])).await.unwrap();
        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["notices.json".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_replaces_leave_a_whole_value() {
        let (_dir, store) = store().await;
        let store = Arc::new(store);

        let mut tasks = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                let value = json!((0..i).map(|n| json!({"id": format!("R{n}")})).collect::<Vec<_>>());
                store.replace(Collection::Requests, &value).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let stored = store.read_raw(Collection::Requests).await;
        let items = stored.as_array().unwrap();
        for (n, item) in items.iter().enumerate() {
            assert_eq!(item["id"], format!("R{n}"));
        }
    }

    #[tokio::test]
    async fn test_clear_all() {
        let (_dir, store) = store().await;
        store.replace(Collection::Bills, &json!([{"id": "B"}])).await.unwrap();
        store.write_file(CREDENTIALS_FILE, &json!({"RES-1": {}})).await.unwrap();

        store.clear_all().await.unwrap();

        for c in Collection::all() {
            assert_eq!(store.read_raw(c).await, json!([]));
        }
        let creds: Value = store.read_file(CREDENTIALS_FILE).await.unwrap();
        assert_eq!(creds, json!({}));
    }
}
