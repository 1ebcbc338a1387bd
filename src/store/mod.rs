//! Abstract keyed-document store boundary.
//!
//! The actual database is an external collaborator; the core only assumes a
//! keyed-collection store with equality queries, one ordered-field range
//! filter, merge updates, and size-bounded batch writes/deletes. The
//! in-memory implementation in [`memory`] backs the demo binary and tests.

pub mod memory;
pub mod repository;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use memory::MemoryStore;

/// Collection names used by the ingestion core.
pub mod collections {
    pub const PLAYLISTS: &str = "playlists";
    pub const CHANNELS: &str = "channels";
    pub const MOVIES: &str = "movies";
    pub const SERIES: &str = "series";
    pub const PROGRAMS: &str = "programs";
}

/// Maximum documents per batch write/delete, matching common document-store
/// transaction limits.
pub const MAX_BATCH: usize = 500;

/// A stored document: its id within the collection plus the JSON body.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("write failed: {0}")]
    Write(String),

    #[error("delete failed: {0}")]
    Delete(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("batch of {got} exceeds limit of {limit}")]
    BatchTooLarge { got: usize, limit: usize },

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The persistence collaborator. Only equality filters, a single
/// less-than-or-equal range on one field, and bounded batches are assumed.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a single document by id.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    /// Create or replace a single document.
    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<(), StoreError>;

    /// Merge the given fields into an existing document. Fails with
    /// [`StoreError::NotFound`] when the document does not exist.
    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<(), StoreError>;

    /// Documents where `field == value`, in id order, up to `limit`.
    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
        limit: Option<usize>,
    ) -> Result<Vec<Document>, StoreError>;

    /// Documents where `field <= value`, ordered by that field, up to
    /// `limit`. This is the one range filter the core needs (EPG retention).
    async fn query_lte(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
        limit: Option<usize>,
    ) -> Result<Vec<Document>, StoreError>;

    /// Write up to [`MAX_BATCH`] documents as one unit. Existing ids are
    /// overwritten, which is what makes re-imports and EPG upserts safe.
    async fn batch_write(&self, collection: &str, docs: Vec<Document>) -> Result<(), StoreError>;

    /// Delete up to [`MAX_BATCH`] documents by id as one unit. Missing ids
    /// are ignored (deletes are idempotent).
    async fn batch_delete(&self, collection: &str, ids: Vec<String>) -> Result<(), StoreError>;
}
