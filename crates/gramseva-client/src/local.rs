//! Local persistence adapter.
//!
//! A namespaced key-value store, one file per key, standing in for the
//! browser's local storage. Collections are stored under
//! `GRAMSEVA_<UPPER NAME>`; the session snapshot and onboarding flags live
//! beside them. Used only when the server cannot be reached.
//!
//! A cached collection written while the server was away is flagged under
//! `GRAMSEVA_PENDING_<UPPER NAME>` until a push reaches the server, so the
//! flag survives a restart.
//!
//! Values are written as compact JSON from [`serde_json::Value`], whose maps
//! are key-sorted, so `save(load())` reproduces the file byte for byte.

use std::path::{Path, PathBuf};

use gramseva_types::{Collection, OFFICER_KEYS};
use serde_json::Value;
use tracing::{debug, warn};

use crate::constants::{KEY_PREFIX, ONBOARDED_PREFIX, PENDING_PREFIX};

#[derive(Debug, thiserror::Error)]
pub enum LocalStoreError {
    #[error("local storage I/O on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Clone, Debug)]
pub struct LocalStore {
    dir: PathBuf,
}

/// Local key for a logical collection name, e.g. `GRAMSEVA_OFFICER-KEYS`.
pub fn key_for(name: &str) -> String {
    format!("{KEY_PREFIX}{}", name.to_uppercase())
}

pub fn onboarded_key(resident_id: &str) -> String {
    format!("{ONBOARDED_PREFIX}{resident_id}")
}

pub fn pending_key(collection: Collection) -> String {
    format!("{PENDING_PREFIX}{}", collection.name().to_uppercase())
}

impl LocalStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, LocalStoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| LocalStoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    // ========================================================================
    // Raw keys
    // ========================================================================

    /// Value under `key`, or `None` when absent or unparsable.
    pub fn get(&self, key: &str) -> Option<Value> {
        let path = self.path(key);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(key, error = %e, "local read failed");
                return None;
            }
        };
        serde_json::from_slice(&bytes)
            .map_err(|e| warn!(key, error = %e, "local value unparsable; ignoring"))
            .ok()
    }

    pub fn set(&self, key: &str, value: &Value) -> Result<(), LocalStoreError> {
        let bytes = serde_json::to_vec(value).map_err(|source| LocalStoreError::Encode {
            key: key.to_string(),
            source,
        })?;
        let path = self.path(key);
        let tmp = self.dir.join(format!(".{key}.tmp"));
        std::fs::write(&tmp, bytes).map_err(|source| LocalStoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &path).map_err(|source| LocalStoreError::Io { path, source })?;
        debug!(key, "local value saved");
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<(), LocalStoreError> {
        let path = self.path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(LocalStoreError::Io { path, source }),
        }
    }

    // ========================================================================
    // Collections
    // ========================================================================

    /// Cached collection array, or `[]`.
    pub fn load(&self, collection: Collection) -> Value {
        match self.get(&key_for(collection.name())) {
            Some(value @ Value::Array(_)) => value,
            _ => Value::Array(Vec::new()),
        }
    }

    pub fn save(&self, collection: Collection, value: &Value) -> Result<(), LocalStoreError> {
        self.set(&key_for(collection.name()), value)
    }

    /// Whether the cached `collection` holds writes the server never got.
    pub fn is_pending(&self, collection: Collection) -> bool {
        self.get(&pending_key(collection)) == Some(Value::Bool(true))
    }

    pub fn mark_pending(&self, collection: Collection) -> Result<(), LocalStoreError> {
        self.set(&pending_key(collection), &Value::Bool(true))
    }

    pub fn clear_pending(&self, collection: Collection) -> Result<(), LocalStoreError> {
        self.remove(&pending_key(collection))
    }

    pub fn load_officer_keys(&self) -> Vec<String> {
        self.get(&key_for(OFFICER_KEYS))
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    pub fn save_officer_keys(&self, keys: &[String]) -> Result<(), LocalStoreError> {
        self.set(&key_for(OFFICER_KEYS), &Value::from(keys.to_vec()))
    }
}

// ============================================================================
// Tests
// ============================================================================
