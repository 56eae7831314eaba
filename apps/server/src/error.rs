//! Error types for the record store server
//!
//! Rejections, conflicts and lookups that find nothing are not errors; they are
//! returned as [`WriteOutcome`](crate::models::WriteOutcome) values. This type is
//! reserved for conditions the caller cannot act on.

use crate::db::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ris_models::ResourceKind;
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// The store rejected an insert as a duplicate but the duplicate lookup
    /// finds no winner: the unique index and the lookup query disagree.
    #[error("Unresolved race on {kind} (index {index}): store reported a duplicate but none was found")]
    RaceUnresolved { kind: ResourceKind, index: String },

    #[error("Deadline exceeded before {stage}")]
    DeadlineExceeded { stage: &'static str },

    #[error("Stored document is corrupt: {0}")]
    CorruptDocument(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(e) => Error::Database(e),
            StoreError::Unavailable(msg) => Error::StoreUnavailable(msg),
            StoreError::Corrupt(msg) => Error::CorruptDocument(msg),
            // Callers that can recover from a violation match on it before converting.
            StoreError::UniqueViolation { collection, index } => {
                Error::Internal(format!("unhandled unique violation on {collection}.{index}"))
            }
        }
    }
}

impl Error {
    /// The `error:<detail>` outcome tag reported to callers.
    pub fn tag(&self) -> String {
        let detail = match self {
            Error::RaceUnresolved { .. } => "raceUnresolved",
            Error::DeadlineExceeded { .. } => "deadlineExceeded",
            Error::StoreUnavailable(_) => "storeUnavailable",
            Error::Database(_) | Error::Migration(_) => "database",
            Error::CorruptDocument(_) | Error::Internal(_) | Error::Other(_) => "internal",
        };
        format!("error:{detail}")
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Error::DeadlineExceeded { .. } => (StatusCode::GATEWAY_TIMEOUT, self.to_string()),
            Error::StoreUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            Error::RaceUnresolved { .. } => {
                tracing::error!(error = %self, "Race recovery failed");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            Error::Database(_)
            | Error::Migration(_)
            | Error::CorruptDocument(_)
            | Error::Internal(_)
            | Error::Other(_) => {
                tracing::error!("Internal error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "status": self.tag(),
            "message": message,
        }));

        (status, body).into_response()
    }
}
