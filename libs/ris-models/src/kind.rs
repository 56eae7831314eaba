//! Resource kinds handled by the store

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the five resource kinds persisted by the store.
///
/// Each kind lives in its own collection, named after the FHIR resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Patient,
    ServiceRequest,
    Appointment,
    ImagingStudy,
    DiagnosticReport,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Patient,
        ResourceKind::ServiceRequest,
        ResourceKind::Appointment,
        ResourceKind::ImagingStudy,
        ResourceKind::DiagnosticReport,
    ];

    /// FHIR resource type name (`resourceType`), also used as the collection name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Patient => "Patient",
            ResourceKind::ServiceRequest => "ServiceRequest",
            ResourceKind::Appointment => "Appointment",
            ResourceKind::ImagingStudy => "ImagingStudy",
            ResourceKind::DiagnosticReport => "DiagnosticReport",
        }
    }

    pub fn collection(&self) -> &'static str {
        self.as_str()
    }

    /// Lower-case path segment used by the HTTP routes (`/servicerequest`).
    pub fn route_segment(&self) -> &'static str {
        match self {
            ResourceKind::Patient => "patient",
            ResourceKind::ServiceRequest => "servicerequest",
            ResourceKind::Appointment => "appointment",
            ResourceKind::ImagingStudy => "imagingstudy",
            ResourceKind::DiagnosticReport => "diagnosticreport",
        }
    }

    /// Lower camel case form used when building outcome tags (`serviceRequestNotFound`).
    pub fn tag_prefix(&self) -> &'static str {
        match self {
            ResourceKind::Patient => "patient",
            ResourceKind::ServiceRequest => "serviceRequest",
            ResourceKind::Appointment => "appointment",
            ResourceKind::ImagingStudy => "imagingStudy",
            ResourceKind::DiagnosticReport => "diagnosticReport",
        }
    }

    /// The kind this resource must reference, if any.
    ///
    /// DiagnosticReport is loosely linked and has no enforced predecessor.
    pub fn predecessor(&self) -> Option<ResourceKind> {
        match self {
            ResourceKind::ServiceRequest => Some(ResourceKind::Patient),
            ResourceKind::Appointment => Some(ResourceKind::ServiceRequest),
            ResourceKind::ImagingStudy => Some(ResourceKind::Appointment),
            ResourceKind::Patient | ResourceKind::DiagnosticReport => None,
        }
    }

    /// Whether at most one resource of this kind may reference a given predecessor.
    pub fn is_one_per_predecessor(&self) -> bool {
        matches!(self, ResourceKind::Appointment | ResourceKind::ImagingStudy)
    }

    /// Name of the JSON field holding the predecessor reference.
    pub fn reference_field(&self) -> Option<&'static str> {
        match self {
            ResourceKind::ServiceRequest => Some("subject"),
            ResourceKind::Appointment | ResourceKind::ImagingStudy => Some("basedOn"),
            ResourceKind::Patient | ResourceKind::DiagnosticReport => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown resource kind: {0}")]
pub struct UnknownResourceKind(pub String);

impl FromStr for ResourceKind {
    type Err = UnknownResourceKind;

    /// Accepts either the FHIR type name or the route segment, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| UnknownResourceKind(s.to_string()))
    }
}
