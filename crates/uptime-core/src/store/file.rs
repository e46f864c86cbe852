use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use super::{is_safe_id, Collection, RecordStore, StoreError};
use crate::crypto::random_id;

/// One JSON file per record at `<root>/<collection>/<id>.json`.
///
/// Mutations of the same record are serialized within the process, so an
/// update can never rename its temp file over a record deleted meanwhile.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    record_locks: Arc<DashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            record_locks: Arc::new(DashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the collection directories up front.
    pub async fn init(&self) -> Result<(), StoreError> {
        for collection in Collection::ALL {
            let dir = self.dir(collection);
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|source| StoreError::Io {
                    collection,
                    context: format!("creating {}", dir.display()),
                    source,
                })?;
        }
        Ok(())
    }

    fn dir(&self, collection: Collection) -> PathBuf {
        self.root.join(collection.as_str())
    }

    fn path(&self, collection: Collection, id: &str) -> Result<PathBuf, StoreError> {
        if !is_safe_id(id) {
            return Err(StoreError::InvalidId {
                collection,
                id: id.to_string(),
            });
        }
        Ok(self.dir(collection).join(format!("{id}.json")))
    }

    async fn lock_record(&self, path: &Path) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(self.record_locks.entry(path.to_path_buf()).or_default().value());
        lock.lock_owned().await
    }

    /// Write `bytes` to a hidden sibling of the record. Removed again on failure.
    async fn write_temp(
        &self,
        collection: Collection,
        id: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, StoreError> {
        let tmp = self
            .dir(collection)
            .join(format!(".{id}.{}.tmp", random_id(8)));
        if let Err(e) = tokio::fs::write(&tmp, bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_error(collection, id, e));
        }
        Ok(tmp)
    }
}

fn io_error(collection: Collection, id: &str, source: std::io::Error) -> StoreError {
    if source.kind() == ErrorKind::NotFound {
        StoreError::NotFound {
            collection,
            id: id.to_string(),
        }
    } else {
        StoreError::Io {
            collection,
            context: format!("record '{id}'"),
            source,
        }
    }
}

fn to_bytes(collection: Collection, id: &str, record: &Value) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(record).map_err(|e| StoreError::Corrupt {
        collection,
        id: id.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl RecordStore for FileStore {
    async fn create(
        &self,
        collection: Collection,
        id: &str,
        record: Value,
    ) -> Result<(), StoreError> {
        let path = self.path(collection, id)?;
        let bytes = to_bytes(collection, id, &record)?;
        tokio::fs::create_dir_all(self.dir(collection))
            .await
            .map_err(|e| io_error(collection, id, e))?;

        let _guard = self.lock_record(&path).await;
        // Publish a fully written sibling; hard_link fails if the record exists.
        let tmp = self.write_temp(collection, id, &bytes).await?;
        let linked = tokio::fs::hard_link(&tmp, &path).await;
        let _ = tokio::fs::remove_file(&tmp).await;
        match linked {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::AlreadyExists {
                    collection,
                    id: id.to_string(),
                })
            }
            Err(e) => return Err(io_error(collection, id, e)),
        }
        debug!(%collection, id, "Record created");
        Ok(())
    }

    async fn read(&self, collection: Collection, id: &str) -> Result<Value, StoreError> {
        let path = self.path(collection, id)?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| io_error(collection, id, e))?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
            collection,
            id: id.to_string(),
            reason: e.to_string(),
        })
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        record: Value,
    ) -> Result<(), StoreError> {
        let path = self.path(collection, id)?;
        let bytes = to_bytes(collection, id, &record)?;
        let _guard = self.lock_record(&path).await;
        tokio::fs::metadata(&path)
            .await
            .map_err(|e| io_error(collection, id, e))?;

        // Write a sibling and rename so readers never observe a half-written record.
        let tmp = self.write_temp(collection, id, &bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_error(collection, id, e));
        }
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        let path = self.path(collection, id)?;
        let _guard = self.lock_record(&path).await;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| io_error(collection, id, e))
    }

    async fn list(&self, collection: Collection) -> Result<Vec<String>, StoreError> {
        let dir = self.dir(collection);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    collection,
                    context: format!("listing {}", dir.display()),
                    source,
                })
            }
        };

        let mut ids = Vec::new();
        loop {
            let entry = entries.next_entry().await.map_err(|source| StoreError::Io {
                collection,
                context: format!("listing {}", dir.display()),
                source,
            })?;
            let Some(entry) = entry else { break };
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(id) = name.strip_suffix(".json") {
                if is_safe_id(id) {
                    ids.push(id.to_string());
                }
            }
        }
        Ok(ids)
    }
}
