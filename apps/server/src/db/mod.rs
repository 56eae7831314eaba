//! Document storage

pub mod filter;
pub mod indexes;
pub mod memory;
pub mod store;
pub mod traits;

pub use filter::{FieldPath, Filter};
pub use indexes::{standard_indexes, UniqueIndex};
pub use memory::InMemoryDocumentStore;
pub use store::PostgresDocumentStore;
pub use traits::{Document, DocumentStore, StoreResult};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Unique index {index} on {collection} already holds this key")]
    UniqueViolation { collection: String, index: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Stored document is corrupt: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl StoreError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation { .. })
    }
}
