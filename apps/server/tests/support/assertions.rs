use axum::http::StatusCode;
use ris_server::models::{MatchType, WriteOutcome};
use ris_models::StoreId;

pub fn assert_status(actual: StatusCode, expected: StatusCode, context: &str) {
    assert_eq!(
        actual, expected,
        "{context}: expected status {expected}, got {actual}"
    );
}

/// Id of a `Created` outcome, panicking with the outcome otherwise
#[track_caller]
pub fn assert_created(outcome: &WriteOutcome) -> StoreId {
    match outcome {
        WriteOutcome::Created { id, .. } => *id,
        other => panic!("expected success, got {} ({other:?})", other.tag()),
    }
}

/// Existing id of an `Existing` outcome with the given tag and match type
#[track_caller]
pub fn assert_existing(outcome: &WriteOutcome, tag: &str, match_type: MatchType) -> StoreId {
    assert_eq!(outcome.tag(), tag, "unexpected outcome {outcome:?}");
    match outcome {
        WriteOutcome::Existing {
            existing_id,
            match_type: actual,
            ..
        } => {
            assert_eq!(*actual, match_type, "match type");
            *existing_id
        }
        other => panic!("expected {tag}, got {other:?}"),
    }
}

#[track_caller]
pub fn assert_rejected(outcome: &WriteOutcome, tag: &str) {
    assert!(
        matches!(outcome, WriteOutcome::Rejected(_)),
        "expected rejection {tag}, got {outcome:?}"
    );
    assert_eq!(outcome.tag(), tag);
}
