mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// The three persisted resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Users,
    Tokens,
    Checks,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Collection::Users, Collection::Tokens, Collection::Checks];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Tokens => "tokens",
            Self::Checks => "checks",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{collection} record '{id}' already exists")]
    AlreadyExists { collection: Collection, id: String },
    #[error("{collection} record '{id}' not found")]
    NotFound { collection: Collection, id: String },
    #[error("'{id}' is not a valid {collection} record id")]
    InvalidId { collection: Collection, id: String },
    #[error("{collection} record '{id}' is corrupt: {reason}")]
    Corrupt {
        collection: Collection,
        id: String,
        reason: String,
    },
    #[error("I/O error on {collection} ({context}): {source}")]
    Io {
        collection: Collection,
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::InvalidId { .. })
    }
}

/// Durable keyed-record storage, one namespace per [`Collection`].
///
/// Each call is atomic for the single record it touches and nothing more.
/// Keeping records that reference each other consistent is the caller's job.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new record. Fails with `AlreadyExists` if the id is taken.
    async fn create(&self, collection: Collection, id: &str, record: Value)
        -> Result<(), StoreError>;

    async fn read(&self, collection: Collection, id: &str) -> Result<Value, StoreError>;

    /// Replace an existing record. Fails with `NotFound` if absent.
    async fn update(&self, collection: Collection, id: &str, record: Value)
        -> Result<(), StoreError>;

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError>;

    /// Ids currently present in the collection, in no particular order.
    async fn list(&self, collection: Collection) -> Result<Vec<String>, StoreError>;
}

pub(crate) async fn read_record<T: DeserializeOwned>(
    store: &dyn RecordStore,
    collection: Collection,
    id: &str,
) -> Result<T, StoreError> {
    let value = store.read(collection, id).await?;
    serde_json::from_value(value).map_err(|e| StoreError::Corrupt {
        collection,
        id: id.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) async fn create_record<T: Serialize>(
    store: &dyn RecordStore,
    collection: Collection,
    id: &str,
    record: &T,
) -> Result<(), StoreError> {
    let value = encode(collection, id, record)?;
    store.create(collection, id, value).await
}

pub(crate) async fn update_record<T: Serialize>(
    store: &dyn RecordStore,
    collection: Collection,
    id: &str,
    record: &T,
) -> Result<(), StoreError> {
    let value = encode(collection, id, record)?;
    store.update(collection, id, value).await
}

fn encode<T: Serialize>(collection: Collection, id: &str, record: &T) -> Result<Value, StoreError> {
    serde_json::to_value(record).map_err(|e| StoreError::Corrupt {
        collection,
        id: id.to_string(),
        reason: e.to_string(),
    })
}

/// Ids become file names, so only plain names are accepted.
fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
