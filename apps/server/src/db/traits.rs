//! Storage seam for the integrity layer

use crate::db::{Filter, StoreError, UniqueIndex};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ris_models::{payload::JsonObject, StoreId};
use serde_json::Value as JsonValue;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A stored document. `body.id` always equals `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: StoreId,
    pub body: JsonValue,
    pub created_at: DateTime<Utc>,
}

/// Document store with per-collection unique indexes.
///
/// Implementations must make `insert_one` atomic with respect to every unique
/// index registered on the collection: when two inserts produce the same key,
/// exactly one succeeds and the other fails with
/// [`StoreError::UniqueViolation`]. Lookups return documents in insertion order.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// First matching document in insertion order.
    async fn find_one(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>>;

    async fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
        limit: usize,
    ) -> StoreResult<Vec<Document>>;

    async fn get(&self, collection: &str, id: StoreId) -> StoreResult<Option<Document>>;

    /// Assign an id, write it into the body, and persist the document.
    async fn insert_one(&self, collection: &str, body: JsonObject) -> StoreResult<StoreId>;

    /// Register a unique index. Idempotent; existing documents are indexed too.
    async fn ensure_unique_index(&self, collection: &str, index: &UniqueIndex)
        -> StoreResult<()>;
}
