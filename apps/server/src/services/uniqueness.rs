//! One-to-one cardinality between a dependent resource and its predecessor

use crate::db::{DocumentStore, Filter};
use crate::Result;
use ris_models::{Reference, ResourceKind, StoreId};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardinalityCheck {
    Clear,
    /// Id of the oldest dependent already linked to the predecessor.
    Conflict(StoreId),
}

#[derive(Clone)]
pub struct UniquenessGuard {
    store: Arc<dyn DocumentStore>,
}

impl UniquenessGuard {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn check_existing(
        &self,
        dependent: ResourceKind,
        predecessor: &Reference,
    ) -> Result<CardinalityCheck> {
        let found = self
            .store
            .find_one(dependent.collection(), &based_on_filter(predecessor))
            .await?;

        Ok(match found {
            Some(doc) => CardinalityCheck::Conflict(doc.id),
            None => CardinalityCheck::Clear,
        })
    }
}

/// Matches any `basedOn` entry pointing at `predecessor`.
///
/// Besides the canonical form this accepts documents written with a bare id or
/// with an absolute URL ending in `Kind/id`.
pub(crate) fn based_on_filter(predecessor: &Reference) -> Filter {
    let canonical = predecessor.canonical();
    Filter::or(vec![
        Filter::eq("basedOn.reference", canonical.as_str()),
        Filter::eq("basedOn.reference", predecessor.id().to_string()),
        Filter::ends_with("basedOn.reference", format!("/{canonical}")),
    ])
}
