//! In-process `DocumentStore` implementation.
//!
//! Used by tests and by `database.backend = "memory"`. Every operation runs
//! under one lock, so the unique-key check and the insert are a single atomic
//! step, matching what the PostgreSQL store gets from its transaction.

use crate::db::{Document, DocumentStore, Filter, StoreError, StoreResult, UniqueIndex};
use async_trait::async_trait;
use chrono::Utc;
use ris_models::{payload::JsonObject, StoreId};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Collection {
    documents: Vec<Document>,
    indexes: Vec<UniqueIndex>,
    /// (index name, key) -> owning document
    keys: HashMap<(String, String), StoreId>,
}

impl Collection {
    fn conflicting_index(&self, body: &JsonValue) -> Option<&str> {
        self.indexes.iter().find_map(|index| {
            index
                .keys(body)
                .into_iter()
                .any(|key| self.keys.contains_key(&(index.name.clone(), key)))
                .then_some(index.name.as_str())
        })
    }

    fn register_keys(&mut self, index: &UniqueIndex, id: StoreId, body: &JsonValue) {
        for key in index.keys(body) {
            self.keys.insert((index.name.clone(), key), id);
        }
    }
}

#[derive(Default)]
pub struct InMemoryDocumentStore {
    collections: Mutex<HashMap<String, Collection>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, HashMap<String, Collection>>> {
        self.collections
            .lock()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))
    }

    /// Number of documents in a collection.
    pub fn count(&self, collection: &str) -> StoreResult<usize> {
        Ok(self
            .lock()?
            .get(collection)
            .map(|c| c.documents.len())
            .unwrap_or(0))
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn find_one(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>> {
        Ok(self.find_many(collection, filter, 1).await?.into_iter().next())
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
        limit: usize,
    ) -> StoreResult<Vec<Document>> {
        let collections = self.lock()?;
        let Some(coll) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        Ok(coll
            .documents
            .iter()
            .filter(|doc| filter.matches(&doc.body))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get(&self, collection: &str, id: StoreId) -> StoreResult<Option<Document>> {
        let collections = self.lock()?;
        Ok(collections
            .get(collection)
            .and_then(|coll| coll.documents.iter().find(|doc| doc.id == id))
            .cloned())
    }

    async fn insert_one(&self, collection: &str, mut body: JsonObject) -> StoreResult<StoreId> {
        let id = StoreId::new();
        body.insert("id".to_string(), JsonValue::String(id.to_string()));
        let body = JsonValue::Object(body);

        let mut collections = self.lock()?;
        let coll = collections.entry(collection.to_string()).or_default();

        if let Some(index) = coll.conflicting_index(&body) {
            return Err(StoreError::UniqueViolation {
                collection: collection.to_string(),
                index: index.to_string(),
            });
        }

        let indexes = coll.indexes.clone();
        for index in &indexes {
            coll.register_keys(index, id, &body);
        }
        coll.documents.push(Document {
            id,
            body,
            created_at: Utc::now(),
        });

        Ok(id)
    }

    async fn ensure_unique_index(
        &self,
        collection: &str,
        index: &UniqueIndex,
    ) -> StoreResult<()> {
        let mut collections = self.lock()?;
        let coll = collections.entry(collection.to_string()).or_default();

        if let Some(existing) = coll.indexes.iter().find(|i| i.name == index.name) {
            if existing == index {
                return Ok(());
            }
        }

        // Build the new key set first so a duplicate leaves the old index in place.
        let mut keys = HashMap::new();
        for doc in &coll.documents {
            for key in index.keys(&doc.body) {
                if keys.insert(key, doc.id).is_some() {
                    return Err(StoreError::UniqueViolation {
                        collection: collection.to_string(),
                        index: index.name.clone(),
                    });
                }
            }
        }

        coll.keys.retain(|(name, _), _| name != &index.name);
        coll.keys.extend(
            keys.into_iter()
                .map(|(key, id)| ((index.name.clone(), key), id)),
        );
        coll.indexes.retain(|i| i.name != index.name);
        coll.indexes.push(index.clone());

        Ok(())
    }
}
