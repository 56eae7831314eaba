//! Predecessor reference checks for dependent resources
//!
//! Checks run in a fixed order and stop at the first failure: the reference
//! must be present, carry the right `Kind/` prefix, end in a store id, point at
//! a stored predecessor and, for Appointments, point at a ServiceRequest whose
//! status allows scheduling.

use crate::db::DocumentStore;
use crate::models::ReferenceFailure;
use crate::services::IdentityResolver;
use crate::Result;
use ris_models::{Reference, ReferenceError, ReferenceInput, ResourceKind};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceCheck {
    /// The predecessor exists; the reference is in canonical form.
    Resolved(Reference),
    Failed(ReferenceFailure),
}

pub struct ReferenceValidator {
    store: Arc<dyn DocumentStore>,
    identity: IdentityResolver,
    compatible_statuses: Vec<String>,
}

impl ReferenceValidator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        identity: IdentityResolver,
        compatible_statuses: Vec<String>,
    ) -> Self {
        Self {
            store,
            identity,
            compatible_statuses,
        }
    }

    /// Check the predecessor reference of a `dependent` resource.
    ///
    /// Kinds without a predecessor always fail with `Missing`; callers only ask
    /// for kinds that have one.
    pub async fn validate(
        &self,
        dependent: ResourceKind,
        input: &ReferenceInput,
    ) -> Result<ReferenceCheck> {
        let Some(predecessor) = dependent.predecessor() else {
            return Ok(ReferenceCheck::Failed(ReferenceFailure::Missing));
        };

        let reference = match input {
            ReferenceInput::Missing => return Ok(ReferenceCheck::Failed(ReferenceFailure::Missing)),
            ReferenceInput::Literal(raw) => match Reference::parse(predecessor, raw) {
                Ok(reference) => reference,
                Err(ReferenceError::Malformed { raw, .. }) => {
                    return Ok(ReferenceCheck::Failed(ReferenceFailure::Malformed { raw }))
                }
                Err(ReferenceError::InvalidId { raw }) => {
                    return Ok(ReferenceCheck::Failed(ReferenceFailure::InvalidId { raw }))
                }
            },
            // Only Patients are addressed by business identifier.
            ReferenceInput::Identifier(identifier) if predecessor == ResourceKind::Patient => {
                match self
                    .identity
                    .find_by_identifier(predecessor, identifier)
                    .await?
                {
                    Some(id) => return Ok(ReferenceCheck::Resolved(Reference::new(predecessor, id))),
                    None => return Ok(ReferenceCheck::Failed(ReferenceFailure::NotFound)),
                }
            }
            ReferenceInput::Identifier(_) => {
                return Ok(ReferenceCheck::Failed(ReferenceFailure::Missing))
            }
        };

        let Some(doc) = self
            .store
            .get(predecessor.collection(), reference.id())
            .await?
        else {
            return Ok(ReferenceCheck::Failed(ReferenceFailure::NotFound));
        };

        if dependent == ResourceKind::Appointment {
            let status = doc.body.get("status").and_then(|v| v.as_str());
            let compatible = status.is_some_and(|s| self.compatible_statuses.iter().any(|c| c == s));
            if !compatible {
                tracing::debug!(
                    reference = %reference,
                    status = status.unwrap_or("<none>"),
                    "ServiceRequest not schedulable"
                );
                return Ok(ReferenceCheck::Failed(ReferenceFailure::NotActive {
                    status: status.map(str::to_string),
                }));
            }
        }

        Ok(ReferenceCheck::Resolved(reference))
    }
}
