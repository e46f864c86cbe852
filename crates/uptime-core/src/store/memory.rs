use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;

use super::{is_safe_id, Collection, RecordStore, StoreError};

/// Process-local store. Records live as JSON values keyed by collection and id.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<(Collection, String), Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create(
        &self,
        collection: Collection,
        id: &str,
        record: Value,
    ) -> Result<(), StoreError> {
        if !is_safe_id(id) {
            return Err(StoreError::InvalidId {
                collection,
                id: id.to_string(),
            });
        }
        match self.records.entry((collection, id.to_string())) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists {
                collection,
                id: id.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    async fn read(&self, collection: Collection, id: &str) -> Result<Value, StoreError> {
        self.records
            .get(&(collection, id.to_string()))
            .map(|r| r.value().clone())
            .ok_or_else(|| StoreError::NotFound {
                collection,
                id: id.to_string(),
            })
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        record: Value,
    ) -> Result<(), StoreError> {
        match self.records.get_mut(&(collection, id.to_string())) {
            Some(mut existing) => {
                *existing = record;
                Ok(())
            }
            None => Err(StoreError::NotFound {
                collection,
                id: id.to_string(),
            }),
        }
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        self.records
            .remove(&(collection, id.to_string()))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                collection,
                id: id.to_string(),
            })
    }

    async fn list(&self, collection: Collection) -> Result<Vec<String>, StoreError> {
        Ok(self
            .records
            .iter()
            .filter(|e| e.key().0 == collection)
            .map(|e| e.key().1.clone())
            .collect())
    }
}
