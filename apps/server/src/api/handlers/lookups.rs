//! Lookups by business identifier and by predecessor

use crate::api::handlers::resources::parse_json_body;
use crate::api::responses;
use crate::services::queries::ImagingStudyCriteria;
use crate::services::IdentityResolution;
use crate::{state::AppState, Result};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ris_models::ResourceKind;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct IdentifierQuery {
    pub system: Option<String>,
    pub value: Option<String>,
}

pub async fn by_identifier(
    state: AppState,
    kind: ResourceKind,
    query: IdentifierQuery,
) -> Result<Response> {
    let system = query.system.filter(|s| !s.is_empty());
    let value = query.value.filter(|v| !v.is_empty());
    let (Some(system), Some(value)) = (system.as_deref(), value.as_deref()) else {
        let field = if system.is_none() { "system" } else { "value" };
        return Ok(responses::message(
            StatusCode::BAD_REQUEST,
            &format!("missingRequiredField:{field}"),
            "Both system and value query parameters are required",
        ));
    };

    let queries = &state.queries;
    let outcome = match kind {
        ResourceKind::Patient => queries.patient_by_identifier(system, value).await?,
        ResourceKind::ServiceRequest => queries.service_request_by_identifier(system, value).await?,
        ResourceKind::ImagingStudy => queries.imaging_study_by_identifier(system, value).await?,
        ResourceKind::DiagnosticReport => {
            queries
                .diagnostic_report_by_identifier(system, value)
                .await?
        }
        ResourceKind::Appointment => {
            return Ok(responses::message(
                StatusCode::METHOD_NOT_ALLOWED,
                "error:methodNotAllowed",
                "Appointments are looked up by ServiceRequest",
            ))
        }
    };
    Ok(responses::lookup(outcome, kind.as_str()))
}

pub async fn service_requests_by_patient_identifier(
    State(state): State<AppState>,
    Path((system, value)): Path<(String, String)>,
) -> Result<Response> {
    let outcome = state
        .queries
        .service_requests_by_patient_identifier(&system, &value)
        .await?;
    Ok(responses::lookup_list(outcome, "Patient"))
}

pub async fn search_imaging_studies(
    State(state): State<AppState>,
    Query(criteria): Query<ImagingStudyCriteria>,
) -> Result<Response> {
    let outcome = state.queries.imaging_studies_matching(&criteria).await?;
    Ok(responses::lookup_list(outcome, "ImagingStudy"))
}

pub async fn service_requests_by_patient(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> Result<Response> {
    let outcome = state.queries.service_requests_by_patient(&patient_id).await?;
    Ok(responses::lookup_list(outcome, "Patient"))
}

pub async fn appointments_by_service_request(
    State(state): State<AppState>,
    Path(service_request_id): Path<String>,
) -> Result<Response> {
    let outcome = state
        .queries
        .appointments_by_service_request(&service_request_id)
        .await?;
    Ok(responses::lookup_list(outcome, "ServiceRequest"))
}

pub async fn check_duplicate_patient(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response> {
    let body = match parse_json_body(&body) {
        Ok(body) => body,
        Err(response) => return Ok(response),
    };

    let response = match state.queries.check_duplicate_patient(body).await? {
        Ok(IdentityResolution::Unique) => Json(json!({
            "status": "success",
            "isDuplicate": false,
        }))
        .into_response(),
        Ok(IdentityResolution::DuplicateOf { id, match_type }) => Json(json!({
            "status": "exists",
            "isDuplicate": true,
            "existingId": id,
            "matchType": match_type,
        }))
        .into_response(),
        Err(err) => responses::message(
            StatusCode::BAD_REQUEST,
            &format!("errorValidating:{err}"),
            err.to_string(),
        ),
    };
    Ok(response)
}
