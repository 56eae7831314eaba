//! Read-side lookups

use crate::db::{Document, DocumentStore, Filter};
use crate::models::LookupOutcome;
use crate::services::identity::identifier_filter;
use crate::services::uniqueness::based_on_filter;
use crate::services::{IdentityResolution, IdentityResolver};
use crate::Result;
use ris_models::{Identifier, PayloadError, Reference, ResourceKind, ResourcePayload, StoreId};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Upper bound on list lookups. Callers never page.
pub const MAX_LIST_RESULTS: usize = 1000;

/// ImagingStudy search filters. Unset or empty fields match every study.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImagingStudyCriteria {
    /// Patient id the study's `subject` points at.
    pub patient: Option<String>,
    /// Appointment id the study is based on, in any reference encoding.
    pub appointment: Option<String>,
    pub status: Option<String>,
    /// Code of any series modality.
    pub modality: Option<String>,
}

pub struct ResourceQueries {
    store: Arc<dyn DocumentStore>,
    identity: IdentityResolver,
}

impl ResourceQueries {
    pub fn new(store: Arc<dyn DocumentStore>, identity: IdentityResolver) -> Self {
        Self { store, identity }
    }

    pub async fn get_by_id(&self, kind: ResourceKind, raw_id: &str) -> Result<LookupOutcome> {
        let Ok(id) = StoreId::parse(raw_id) else {
            return Ok(LookupOutcome::InvalidId {
                raw: raw_id.to_string(),
            });
        };

        Ok(match self.store.get(kind.collection(), id).await? {
            Some(doc) => LookupOutcome::Found(doc.body),
            None => LookupOutcome::NotFound,
        })
    }

    pub async fn patient_by_identifier(&self, system: &str, value: &str) -> Result<LookupOutcome> {
        self.by_identifier(ResourceKind::Patient, system, value)
            .await
    }

    pub async fn service_request_by_identifier(
        &self,
        system: &str,
        value: &str,
    ) -> Result<LookupOutcome> {
        self.by_identifier(ResourceKind::ServiceRequest, system, value)
            .await
    }

    pub async fn imaging_study_by_identifier(
        &self,
        system: &str,
        value: &str,
    ) -> Result<LookupOutcome> {
        self.by_identifier(ResourceKind::ImagingStudy, system, value)
            .await
    }

    pub async fn diagnostic_report_by_identifier(
        &self,
        system: &str,
        value: &str,
    ) -> Result<LookupOutcome> {
        self.by_identifier(ResourceKind::DiagnosticReport, system, value)
            .await
    }

    /// All ServiceRequests whose subject is the given Patient, oldest first.
    pub async fn service_requests_by_patient(
        &self,
        raw_patient_id: &str,
    ) -> Result<LookupOutcome<Vec<JsonValue>>> {
        let Ok(id) = StoreId::parse(raw_patient_id) else {
            return Ok(LookupOutcome::InvalidId {
                raw: raw_patient_id.to_string(),
            });
        };
        let filter = subject_filter(&Reference::new(ResourceKind::Patient, id));

        self.list(ResourceKind::ServiceRequest, &filter).await
    }

    /// Same as [`service_requests_by_patient`](Self::service_requests_by_patient),
    /// with the Patient named by business identifier. An unknown identifier is
    /// `NotFound`, a known Patient without requests an empty list.
    pub async fn service_requests_by_patient_identifier(
        &self,
        system: &str,
        value: &str,
    ) -> Result<LookupOutcome<Vec<JsonValue>>> {
        let identifier = Identifier::new(system, value);
        let Some(patient) = self
            .identity
            .find_by_identifier(ResourceKind::Patient, &identifier)
            .await?
        else {
            return Ok(LookupOutcome::NotFound);
        };
        let filter = subject_filter(&Reference::new(ResourceKind::Patient, patient));

        self.list(ResourceKind::ServiceRequest, &filter).await
    }

    /// ImagingStudies matching every criterion given, oldest first.
    pub async fn imaging_studies_matching(
        &self,
        criteria: &ImagingStudyCriteria,
    ) -> Result<LookupOutcome<Vec<JsonValue>>> {
        let mut filters = Vec::new();

        if let Some(raw) = non_empty(&criteria.patient) {
            let Ok(id) = StoreId::parse(raw) else {
                return Ok(LookupOutcome::InvalidId {
                    raw: raw.to_string(),
                });
            };
            filters.push(subject_filter(&Reference::new(ResourceKind::Patient, id)));
        }
        if let Some(raw) = non_empty(&criteria.appointment) {
            let Ok(id) = StoreId::parse(raw) else {
                return Ok(LookupOutcome::InvalidId {
                    raw: raw.to_string(),
                });
            };
            filters.push(based_on_filter(&Reference::new(
                ResourceKind::Appointment,
                id,
            )));
        }
        if let Some(status) = non_empty(&criteria.status) {
            filters.push(Filter::eq("status", status));
        }
        if let Some(modality) = non_empty(&criteria.modality) {
            filters.push(Filter::eq("series.modality.code", modality));
        }

        self.list(ResourceKind::ImagingStudy, &Filter::and(filters))
            .await
    }

    /// All Appointments based on the given ServiceRequest, in any reference encoding.
    pub async fn appointments_by_service_request(
        &self,
        raw_service_request_id: &str,
    ) -> Result<LookupOutcome<Vec<JsonValue>>> {
        let Ok(id) = StoreId::parse(raw_service_request_id) else {
            return Ok(LookupOutcome::InvalidId {
                raw: raw_service_request_id.to_string(),
            });
        };
        let filter = based_on_filter(&Reference::new(ResourceKind::ServiceRequest, id));

        self.list(ResourceKind::Appointment, &filter).await
    }

    /// Run the Patient duplicate check without writing anything.
    pub async fn check_duplicate_patient(
        &self,
        body: JsonValue,
    ) -> Result<std::result::Result<IdentityResolution, PayloadError>> {
        let patient = match ResourcePayload::from_json(ResourceKind::Patient, body) {
            Ok(ResourcePayload::Patient(patient)) => patient,
            Ok(_) => return Err(crate::Error::Internal("Patient payload expected".to_string())),
            Err(err) => return Ok(Err(err)),
        };

        Ok(Ok(self.identity.resolve(&patient).await?))
    }

    async fn by_identifier(
        &self,
        kind: ResourceKind,
        system: &str,
        value: &str,
    ) -> Result<LookupOutcome> {
        let filter = identifier_filter(&Identifier::new(system, value));
        Ok(match self.store.find_one(kind.collection(), &filter).await? {
            Some(doc) => LookupOutcome::Found(doc.body),
            None => LookupOutcome::NotFound,
        })
    }

    async fn list(
        &self,
        kind: ResourceKind,
        filter: &Filter,
    ) -> Result<LookupOutcome<Vec<JsonValue>>> {
        let docs = self
            .store
            .find_many(kind.collection(), filter, MAX_LIST_RESULTS)
            .await?;
        Ok(LookupOutcome::Found(
            docs.into_iter().map(|doc: Document| doc.body).collect(),
        ))
    }
}

/// `subject` points at `patient`, canonically or as an absolute URL.
fn subject_filter(patient: &Reference) -> Filter {
    let canonical = patient.canonical();
    Filter::or(vec![
        Filter::eq("subject.reference", canonical.as_str()),
        Filter::ends_with("subject.reference", format!("/{canonical}")),
    ])
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
