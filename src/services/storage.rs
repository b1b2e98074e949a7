//! Versioned JSON key-value store

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::StorageError;

/// Migration hook: receives the stored version and payload, returns the
/// payload in the current format.
pub type Migration = fn(u32, Value) -> Value;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: u32,
    key: String,
    data: Value,
}

/// One persisted mapping, stored as `<dir>/<key>.json`.
///
/// Every read-modify-write goes through the store's own lock, so callers
/// never interleave partial updates of the same key.
#[derive(Debug)]
pub struct JsonStore {
    key: String,
    version: u32,
    path: PathBuf,
    migration: Option<Migration>,
    lock: Mutex<()>,
}

impl JsonStore {
    pub fn new(dir: impl AsRef<Path>, key: impl Into<String>, version: u32) -> Self {
        let key = key.into();
        let path = dir.as_ref().join(format!("{}.json", key));
        Self {
            key,
            version,
            path,
            migration: None,
            lock: Mutex::new(()),
        }
    }

    /// Attach a migration run when an older version is found on disk
    pub fn with_migration(mut self, migration: Migration) -> Self {
        self.migration = Some(migration);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load and decode the stored payload; `None` on first run
    pub async fn load<T: DeserializeOwned>(&self) -> Result<Option<T>, StorageError> {
        let _guard = self.lock.lock().await;
        self.load_unlocked().await
    }

    /// Replace the stored payload
    pub async fn save<T: Serialize>(&self, data: &T) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        self.save_unlocked(data).await
    }

    /// Read-modify-write under the store lock
    pub async fn update<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: DeserializeOwned + Serialize + Default,
        F: FnOnce(&mut T),
    {
        let _guard = self.lock.lock().await;
        let mut data = self.load_unlocked::<T>().await?.unwrap_or_default();
        f(&mut data);
        self.save_unlocked(&data).await?;
        Ok(data)
    }

    async fn load_unlocked<T: DeserializeOwned>(&self) -> Result<Option<T>, StorageError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Store {} not found, starting empty", self.key);
                return Ok(None);
            }
            Err(source) => {
                return Err(StorageError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let envelope: Envelope = serde_json::from_slice(&raw).map_err(|source| StorageError::Decode {
            path: self.path.clone(),
            source,
        })?;

        let data = if envelope.version < self.version {
            info!(
                "Migrating store {} from version {} to {}",
                self.key, envelope.version, self.version
            );
            let migrated = match self.migration {
                Some(migrate) => migrate(envelope.version, envelope.data),
                None => envelope.data,
            };
            self.write_envelope(migrated.clone()).await?;
            migrated
        } else {
            envelope.data
        };

        if data.is_null() {
            return Ok(None);
        }

        serde_json::from_value(data)
            .map(Some)
            .map_err(|source| StorageError::Decode {
                path: self.path.clone(),
                source,
            })
    }

    async fn save_unlocked<T: Serialize>(&self, data: &T) -> Result<(), StorageError> {
        let data = serde_json::to_value(data).map_err(|source| StorageError::Encode {
            key: self.key.clone(),
            source,
        })?;
        self.write_envelope(data).await
    }

    async fn write_envelope(&self, data: Value) -> Result<(), StorageError> {
        let envelope = Envelope {
            version: self.version,
            key: self.key.clone(),
            data,
        };
        let encoded = serde_json::to_vec_pretty(&envelope).map_err(|source| StorageError::Encode {
            key: self.key.clone(),
            source,
        })?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StorageError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        // Write to a sibling file first so a crash never leaves half a document
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, encoded)
            .await
            .map_err(|source| StorageError::Write {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| StorageError::Write {
                path: self.path.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct Counter {
        #[serde(default)]
        value: i64,
        #[serde(default)]
        note: Option<String>,
    }

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path(), "absent", 1);
        let loaded: Option<Counter> = store.load().await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn update_reads_modifies_and_writes() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path(), "counter", 1);

        store.update(|c: &mut Counter| c.value += 5).await.unwrap();
        let after = store.update(|c: &mut Counter| c.value += 2).await.unwrap();
        assert_eq!(after.value, 7);

        let loaded: Counter = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.value, 7);
    }

    #[tokio::test]
    async fn older_version_is_migrated_and_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.json");
        std::fs::write(
            &path,
            serde_json::to_vec(&json!({"version": 1, "key": "legacy", "data": {"value": 3}})).unwrap(),
        )
        .unwrap();

        fn annotate(_from: u32, mut data: Value) -> Value {
            data["note"] = json!("migrated");
            data
        }

        let store = JsonStore::new(dir.path(), "legacy", 2).with_migration(annotate);
        let loaded: Counter = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.note.as_deref(), Some("migrated"));

        let on_disk: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(on_disk["version"], 2);
        assert_eq!(on_disk["data"]["note"], "migrated");
    }

    #[tokio::test]
    async fn garbage_file_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), b"not json").unwrap();
        let store = JsonStore::new(dir.path(), "broken", 1);
        let result: Result<Option<Counter>, _> = store.load().await;
        assert!(matches!(result, Err(StorageError::Decode { .. })));
    }
}
