//! Patient deduplication
//!
//! A candidate Patient is a duplicate when any of its identifiers is already
//! held by a stored Patient, or when it has the same family name, first given
//! name and birth date as one. Identifier matches win over demographic ones.

use crate::db::{DocumentStore, Filter};
use crate::models::MatchType;
use crate::Result;
use ris_models::{Demographics, Identifier, PatientPayload, ResourceKind, StoreId};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityResolution {
    Unique,
    DuplicateOf { id: StoreId, match_type: MatchType },
}

impl IdentityResolution {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, IdentityResolution::DuplicateOf { .. })
    }
}

#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn DocumentStore>,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Read-only duplicate check for a candidate Patient.
    pub async fn resolve(&self, patient: &PatientPayload) -> Result<IdentityResolution> {
        for identifier in patient.identifiers() {
            if let Some(id) = self.find_by_identifier(ResourceKind::Patient, identifier).await? {
                tracing::debug!(
                    system = %identifier.system,
                    existing_id = %id,
                    "Patient identifier already registered"
                );
                return Ok(IdentityResolution::DuplicateOf {
                    id,
                    match_type: MatchType::Identifier,
                });
            }
        }

        if let Some(demographics) = patient.demographics() {
            let found = self
                .store
                .find_one(
                    ResourceKind::Patient.collection(),
                    &demographics_filter(demographics),
                )
                .await?;
            if let Some(doc) = found {
                tracing::debug!(existing_id = %doc.id, "Patient demographics already registered");
                return Ok(IdentityResolution::DuplicateOf {
                    id: doc.id,
                    match_type: MatchType::Demographics,
                });
            }
        }

        Ok(IdentityResolution::Unique)
    }

    /// Id of the first `kind` document carrying this identifier.
    pub async fn find_by_identifier(
        &self,
        kind: ResourceKind,
        identifier: &Identifier,
    ) -> Result<Option<StoreId>> {
        Ok(self
            .store
            .find_one(kind.collection(), &identifier_filter(identifier))
            .await?
            .map(|doc| doc.id))
    }
}

/// System and value must match on the same `identifier` element.
pub(crate) fn identifier_filter(identifier: &Identifier) -> Filter {
    Filter::elem_match(
        "identifier",
        Filter::and(vec![
            Filter::eq("system", identifier.system.as_str()),
            Filter::eq("value", identifier.value.as_str()),
        ]),
    )
}

fn demographics_filter(demographics: &Demographics) -> Filter {
    Filter::and(vec![
        Filter::eq("name.0.family", demographics.family.as_str()),
        Filter::eq("name.0.given.0", demographics.given.as_str()),
        Filter::eq("birthDate", demographics.birth_date.as_str()),
    ])
}
