//! Create and read handlers shared by every resource kind

use crate::api::responses;
use crate::{state::AppState, Result};
use axum::{body::Bytes, http::StatusCode, response::Response};
use ris_models::ResourceKind;
use serde_json::Value as JsonValue;
use tokio::time::Instant;

pub async fn create(state: AppState, kind: ResourceKind, body: Bytes) -> Result<Response> {
    let body = match parse_json_body(&body) {
        Ok(body) => body,
        Err(response) => return Ok(response),
    };

    let deadline = state
        .config
        .integrity
        .request_timeout()
        .map(|timeout| Instant::now() + timeout);

    let outcome = state
        .write_coordinator
        .create_with_deadline(kind, body, deadline)
        .await?;

    Ok(responses::write_outcome(outcome))
}

pub async fn read(state: AppState, kind: ResourceKind, id: String) -> Result<Response> {
    let outcome = state.queries.get_by_id(kind, &id).await?;
    Ok(responses::lookup(outcome, kind.as_str()))
}

/// Parse a request body, answering malformed JSON with an `errorValidating` outcome.
pub(crate) fn parse_json_body(body: &[u8]) -> std::result::Result<JsonValue, Response> {
    serde_json::from_slice(body).map_err(|e| {
        let detail = format!("invalid JSON body: {e}");
        responses::message(
            StatusCode::BAD_REQUEST,
            &format!("errorValidating:{detail}"),
            detail,
        )
    })
}
