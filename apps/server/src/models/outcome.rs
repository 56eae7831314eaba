use ris_models::{FieldError, ResourceKind, StoreId};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::fmt;

/// Which duplicate check matched an existing resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    /// Same `(system, value)` identifier.
    Identifier,
    /// Same family name, first given name and birth date.
    Demographics,
    /// Same predecessor reference on a one-per-predecessor kind.
    Reference,
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchType::Identifier => f.write_str("identifier"),
            MatchType::Demographics => f.write_str("demographics"),
            MatchType::Reference => f.write_str("reference"),
        }
    }
}

/// Why a predecessor reference was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceFailure {
    /// Field absent, or not an object / list of objects.
    Missing,
    /// Wrong or missing `Kind/` prefix.
    Malformed { raw: String },
    /// Trailing segment is not a store id.
    InvalidId { raw: String },
    NotFound,
    /// Predecessor exists but its status does not allow dependents.
    NotActive { status: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The body failed shape validation or could not be read as the requested kind.
    Shape { detail: String },
    Reference {
        predecessor: ResourceKind,
        failure: ReferenceFailure,
    },
    Field(FieldError),
}

impl Rejection {
    pub fn tag(&self) -> String {
        match self {
            Rejection::Shape { detail } => format!("errorValidating:{detail}"),
            Rejection::Reference {
                predecessor,
                failure,
            } => match failure {
                ReferenceFailure::Missing | ReferenceFailure::Malformed { .. } => {
                    format!("invalid{}Reference", predecessor.as_str())
                }
                ReferenceFailure::InvalidId { .. } => "invalidReferenceId".to_string(),
                ReferenceFailure::NotFound => format!("{}NotFound", predecessor.tag_prefix()),
                ReferenceFailure::NotActive { .. } => {
                    format!("{}NotActive", predecessor.tag_prefix())
                }
            },
            Rejection::Field(err) => match err {
                FieldError::MissingRequiredField(field) => format!("missingRequiredField:{field}"),
                FieldError::InvalidDateTimeFormat { .. } => "invalidDateTimeFormat".to_string(),
                FieldError::InvalidAppointmentDuration { .. } => {
                    "invalidAppointmentDuration".to_string()
                }
                FieldError::InvalidModalityStructure => "invalidModalityStructure".to_string(),
            },
        }
    }

    pub fn message(&self) -> String {
        match self {
            Rejection::Shape { detail } => format!("Resource failed validation: {detail}"),
            Rejection::Reference {
                predecessor,
                failure,
            } => match failure {
                ReferenceFailure::Missing => {
                    format!("A reference to a {predecessor} is required")
                }
                ReferenceFailure::Malformed { raw } => {
                    format!("Reference {raw:?} must have the form {predecessor}/<id>")
                }
                ReferenceFailure::InvalidId { raw } => {
                    format!("Reference {raw:?} does not contain a valid id")
                }
                ReferenceFailure::NotFound => format!("Referenced {predecessor} does not exist"),
                ReferenceFailure::NotActive { status } => format!(
                    "Referenced {predecessor} has status {}",
                    status.as_deref().unwrap_or("<none>")
                ),
            },
            Rejection::Field(err) => err.to_string(),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

/// Result of `WriteCoordinator::create`.
///
/// `Existing` is not a failure: creating something that already exists returns
/// the id of the resource that was there first.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    Created {
        kind: ResourceKind,
        id: StoreId,
    },
    Existing {
        kind: ResourceKind,
        existing_id: StoreId,
        match_type: MatchType,
    },
    Rejected(Rejection),
}

impl WriteOutcome {
    pub fn tag(&self) -> String {
        match self {
            WriteOutcome::Created { .. } => "success".to_string(),
            WriteOutcome::Existing { kind, .. } => {
                if kind.is_one_per_predecessor() {
                    format!("{}AlreadyExists", kind.tag_prefix())
                } else {
                    "exists".to_string()
                }
            }
            WriteOutcome::Rejected(rejection) => rejection.tag(),
        }
    }

    pub fn id(&self) -> Option<StoreId> {
        match self {
            WriteOutcome::Created { id, .. } => Some(*id),
            WriteOutcome::Existing { existing_id, .. } => Some(*existing_id),
            WriteOutcome::Rejected(_) => None,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, WriteOutcome::Created { .. })
    }
}

/// Result of a read-side lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome<T = JsonValue> {
    Found(T),
    NotFound,
    /// The id in the request is not a store id.
    InvalidId { raw: String },
}

impl<T> LookupOutcome<T> {
    pub fn tag(&self) -> &'static str {
        match self {
            LookupOutcome::Found(_) => "success",
            LookupOutcome::NotFound => "notFound",
            LookupOutcome::InvalidId { .. } => "invalidReferenceId",
        }
    }

    pub fn found(self) -> Option<T> {
        match self {
            LookupOutcome::Found(value) => Some(value),
            _ => None,
        }
    }
}
