//! Canonical references between resources
//!
//! Producers encode references inconsistently (`Kind/id`, bare ids, identifier
//! objects). Everything is converted to [`Reference`] here, before the core
//! compares or stores anything.

use crate::{Identifier, ResourceKind, StoreId};
use serde_json::Value as JsonValue;
use std::fmt;

/// A resolved pointer to another resource: `<Kind>/<store id>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reference {
    kind: ResourceKind,
    id: StoreId,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceError {
    #[error("Reference {raw:?} does not start with '{expected}/'")]
    Malformed { expected: ResourceKind, raw: String },

    #[error("Reference {raw:?} does not end in a valid store id")]
    InvalidId { raw: String },
}

impl Reference {
    pub fn new(kind: ResourceKind, id: StoreId) -> Self {
        Self { kind, id }
    }

    /// Parse a literal reference string that must point at `expected`.
    ///
    /// The prefix check runs before the id check, so `Appointment/not-an-id` against an
    /// expected `ServiceRequest` is reported as malformed rather than as a bad id.
    pub fn parse(expected: ResourceKind, raw: &str) -> Result<Self, ReferenceError> {
        let trimmed = raw.trim();
        let prefix = format!("{}/", expected.as_str());
        let Some(id_segment) = trimmed.strip_prefix(prefix.as_str()) else {
            return Err(ReferenceError::Malformed {
                expected,
                raw: raw.to_string(),
            });
        };

        let id = StoreId::parse(id_segment).map_err(|_| ReferenceError::InvalidId {
            raw: raw.to_string(),
        })?;

        Ok(Self { kind: expected, id })
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn id(&self) -> StoreId {
        self.id
    }

    /// The only form ever written to the store.
    pub fn canonical(&self) -> String {
        format!("{}/{}", self.kind.as_str(), self.id)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind.as_str(), self.id)
    }
}

/// The predecessor reference exactly as the producer supplied it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceInput {
    /// Field absent, not an object/list, or an object carrying neither form.
    Missing,
    /// `{"reference": "Kind/id"}`
    Literal(String),
    /// `{"identifier": {"system": ..., "value": ...}}`
    Identifier(Identifier),
}

impl ReferenceInput {
    /// Read a single reference object (`ServiceRequest.subject`).
    pub(crate) fn from_object(value: Option<&JsonValue>) -> Self {
        let Some(obj) = value.and_then(|v| v.as_object()) else {
            return ReferenceInput::Missing;
        };

        if let Some(reference) = obj.get("reference").and_then(|v| v.as_str()) {
            return ReferenceInput::Literal(reference.to_string());
        }

        obj.get("identifier")
            .and_then(Identifier::from_json)
            .map(ReferenceInput::Identifier)
            .unwrap_or(ReferenceInput::Missing)
    }

    /// Read the first element of a reference list (`Appointment.basedOn[0]`).
    pub(crate) fn from_first_element(value: Option<&JsonValue>) -> Self {
        let first = value.and_then(|v| v.as_array()).and_then(|items| items.first());
        Self::from_object(first)
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, ReferenceInput::Missing)
    }
}
