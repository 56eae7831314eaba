//! Create path for all resource kinds
//!
//! `create` runs, in order: shape validation, payload ingestion, predecessor
//! reference check, duplicate check, field normalization and insert. Every
//! step before the insert is read-only, so a request that stops early leaves
//! the store untouched.
//!
//! The duplicate check is advisory. Two writers can both pass it; the store's
//! unique indexes then let exactly one insert through, and the loser re-runs the
//! duplicate lookup to report the winner's id.

use crate::db::{DocumentStore, StoreError};
use crate::models::{MatchType, Rejection, WriteOutcome};
use crate::services::{
    CardinalityCheck, IdentityResolution, IdentityResolver, ReferenceCheck, ReferenceValidator,
    UniquenessGuard,
};
use crate::{Error, Result};
use ris_models::{Reference, ResourceKind, ResourcePayload, StoreId};
use ris_validator::ShapeValidator;
use serde_json::Value as JsonValue;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;

pub struct WriteCoordinator {
    store: Arc<dyn DocumentStore>,
    validator: Arc<dyn ShapeValidator>,
    identity: IdentityResolver,
    references: ReferenceValidator,
    uniqueness: UniquenessGuard,
}

impl WriteCoordinator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        validator: Arc<dyn ShapeValidator>,
        identity: IdentityResolver,
        references: ReferenceValidator,
        uniqueness: UniquenessGuard,
    ) -> Self {
        Self {
            store,
            validator,
            identity,
            references,
            uniqueness,
        }
    }

    pub async fn create(&self, kind: ResourceKind, body: JsonValue) -> Result<WriteOutcome> {
        self.create_with_deadline(kind, body, None).await
    }

    /// Like [`create`](Self::create), giving up with `DeadlineExceeded` once
    /// `deadline` passes. The insert itself is never interrupted, and is not
    /// started after the deadline.
    pub async fn create_with_deadline(
        &self,
        kind: ResourceKind,
        body: JsonValue,
        deadline: Option<Instant>,
    ) -> Result<WriteOutcome> {
        let validation = self.validator.validate_shape(kind, &body);
        if !validation.valid {
            tracing::debug!(%kind, issues = %validation.summary(), "Shape validation failed");
            return Ok(WriteOutcome::Rejected(Rejection::Shape {
                detail: validation.summary(),
            }));
        }

        let mut payload = match ResourcePayload::from_json(kind, body) {
            Ok(payload) => payload,
            Err(err) => {
                return Ok(WriteOutcome::Rejected(Rejection::Shape {
                    detail: err.to_string(),
                }))
            }
        };

        let predecessor =
            within(deadline, "reference check", self.check_reference(&payload)).await?;
        let predecessor = match predecessor {
            Ok(reference) => reference,
            Err(rejection) => return Ok(WriteOutcome::Rejected(rejection)),
        };
        if let Some(reference) = &predecessor {
            payload.set_canonical_reference(reference);
        }

        let duplicate = within(
            deadline,
            "duplicate check",
            self.find_duplicate(&payload, predecessor.as_ref()),
        )
        .await?;
        if let Some((existing_id, match_type)) = duplicate {
            tracing::info!(%kind, %existing_id, %match_type, "Resource already exists");
            return Ok(WriteOutcome::Existing {
                kind,
                existing_id,
                match_type,
            });
        }

        if let Err(err) = payload.normalize() {
            return Ok(WriteOutcome::Rejected(Rejection::Field(err)));
        }

        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(Error::DeadlineExceeded { stage: "insert" });
        }

        match self
            .store
            .insert_one(kind.collection(), payload.body().clone())
            .await
        {
            Ok(id) => {
                tracing::info!(%kind, %id, "Resource created");
                Ok(WriteOutcome::Created { kind, id })
            }
            Err(StoreError::UniqueViolation { index, .. }) => {
                self.recover_from_race(&payload, predecessor.as_ref(), index)
                    .await
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn check_reference(
        &self,
        payload: &ResourcePayload,
    ) -> Result<std::result::Result<Option<Reference>, Rejection>> {
        let kind = payload.kind();
        let (Some(predecessor), Some(input)) = (kind.predecessor(), payload.predecessor_reference())
        else {
            return Ok(Ok(None));
        };

        Ok(match self.references.validate(kind, input).await? {
            ReferenceCheck::Resolved(reference) => Ok(Some(reference)),
            ReferenceCheck::Failed(failure) => Err(Rejection::Reference {
                predecessor,
                failure,
            }),
        })
    }

    async fn find_duplicate(
        &self,
        payload: &ResourcePayload,
        predecessor: Option<&Reference>,
    ) -> Result<Option<(StoreId, MatchType)>> {
        match payload {
            ResourcePayload::Patient(patient) => Ok(match self.identity.resolve(patient).await? {
                IdentityResolution::DuplicateOf { id, match_type } => Some((id, match_type)),
                IdentityResolution::Unique => None,
            }),
            _ if payload.kind().is_one_per_predecessor() => {
                let Some(predecessor) = predecessor else {
                    return Ok(None);
                };
                Ok(
                    match self
                        .uniqueness
                        .check_existing(payload.kind(), predecessor)
                        .await?
                    {
                        CardinalityCheck::Conflict(id) => Some((id, MatchType::Reference)),
                        CardinalityCheck::Clear => None,
                    },
                )
            }
            _ => Ok(None),
        }
    }

    async fn recover_from_race(
        &self,
        payload: &ResourcePayload,
        predecessor: Option<&Reference>,
        index: String,
    ) -> Result<WriteOutcome> {
        let kind = payload.kind();
        tracing::warn!(%kind, %index, "Concurrent insert won the unique index, re-reading");

        match self.find_duplicate(payload, predecessor).await? {
            Some((existing_id, match_type)) => Ok(WriteOutcome::Existing {
                kind,
                existing_id,
                match_type,
            }),
            None => Err(Error::RaceUnresolved { kind, index }),
        }
    }
}

async fn within<T, F>(deadline: Option<Instant>, stage: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut)
            .await
            .map_err(|_| Error::DeadlineExceeded { stage })?,
        None => fut.await,
    }
}
