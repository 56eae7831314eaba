//! Outcome to HTTP response mapping
//!
//! Every body carries a `status` field holding the outcome tag, so clients can
//! branch on it without looking at the HTTP status code.

use crate::models::{LookupOutcome, ReferenceFailure, Rejection, WriteOutcome};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value as JsonValue};

pub fn write_outcome(outcome: WriteOutcome) -> Response {
    let tag = outcome.tag();
    match outcome {
        WriteOutcome::Created { id, .. } => (
            StatusCode::CREATED,
            Json(json!({ "status": tag, "id": id })),
        )
            .into_response(),
        WriteOutcome::Existing {
            existing_id,
            match_type,
            ..
        } => (
            StatusCode::OK,
            Json(json!({
                "status": tag,
                "existingId": existing_id,
                "matchType": match_type,
            })),
        )
            .into_response(),
        WriteOutcome::Rejected(rejection) => rejected(&rejection),
    }
}

pub fn rejected(rejection: &Rejection) -> Response {
    let status = match rejection {
        Rejection::Reference {
            failure: ReferenceFailure::NotFound,
            ..
        } => StatusCode::NOT_FOUND,
        Rejection::Reference {
            failure: ReferenceFailure::NotActive { .. },
            ..
        } => StatusCode::CONFLICT,
        _ => StatusCode::BAD_REQUEST,
    };
    message(status, &rejection.tag(), rejection.message())
}

/// A single resource under `resource`.
pub fn lookup(outcome: LookupOutcome, what: &str) -> Response {
    lookup_with(outcome, what, |resource| json!({ "resource": resource }))
}

/// A list of resources under `resources`. An empty list is still `success`.
pub fn lookup_list(outcome: LookupOutcome<Vec<JsonValue>>, what: &str) -> Response {
    lookup_with(outcome, what, |resources| {
        json!({ "count": resources.len(), "resources": resources })
    })
}

fn lookup_with<T>(
    outcome: LookupOutcome<T>,
    what: &str,
    found: impl FnOnce(T) -> JsonValue,
) -> Response {
    let tag = outcome.tag();
    match outcome {
        LookupOutcome::Found(value) => {
            let mut body = found(value);
            if let Some(obj) = body.as_object_mut() {
                obj.insert("status".to_string(), JsonValue::String(tag.to_string()));
            }
            (StatusCode::OK, Json(body)).into_response()
        }
        LookupOutcome::NotFound => message(StatusCode::NOT_FOUND, tag, format!("{what} not found")),
        LookupOutcome::InvalidId { raw } => message(
            StatusCode::BAD_REQUEST,
            tag,
            format!("{raw:?} is not a valid id"),
        ),
    }
}

pub fn message(status: StatusCode, tag: &str, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({ "status": tag, "message": message.into() })),
    )
        .into_response()
}
