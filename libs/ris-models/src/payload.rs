//! Typed resource payloads
//!
//! `ResourcePayload::from_json` is the single place where an untyped request
//! body is inspected. Everything downstream works with the per-kind structs and
//! only touches the raw body again to apply defaults before it is persisted.

use crate::temporal::{self, Temporal};
use crate::{Identifier, Reference, ReferenceInput, ResourceKind};
use serde_json::{json, Map, Value as JsonValue};

pub type JsonObject = Map<String, JsonValue>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("Resource body must be a JSON object")]
    NotAnObject,

    #[error("resourceType must be {expected}, got {found}")]
    ResourceTypeMismatch {
        expected: ResourceKind,
        found: String,
    },
}

/// Input problems found while applying field defaults.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("Missing required field: {0}")]
    MissingRequiredField(&'static str),

    #[error("Invalid date/time in {field}: {value}")]
    InvalidDateTimeFormat { field: &'static str, value: String },

    #[error("Appointment end {end} is not compatible with start {start}")]
    InvalidAppointmentDuration { start: String, end: String },

    #[error("Every modality entry must be an object with a code")]
    InvalidModalityStructure,
}

/// Name, first given name and birth date; only built when all three are present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Demographics {
    pub family: String,
    pub given: String,
    pub birth_date: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatientPayload {
    identifiers: Vec<Identifier>,
    demographics: Option<Demographics>,
    body: JsonObject,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRequestPayload {
    subject: ReferenceInput,
    status: Option<String>,
    body: JsonObject,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentPayload {
    based_on: ReferenceInput,
    body: JsonObject,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImagingStudyPayload {
    based_on: ReferenceInput,
    body: JsonObject,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticReportPayload {
    body: JsonObject,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResourcePayload {
    Patient(PatientPayload),
    ServiceRequest(ServiceRequestPayload),
    Appointment(AppointmentPayload),
    ImagingStudy(ImagingStudyPayload),
    DiagnosticReport(DiagnosticReportPayload),
}

impl ResourcePayload {
    /// Read a request body for `kind`. A missing `resourceType` is filled in.
    pub fn from_json(kind: ResourceKind, body: JsonValue) -> Result<Self, PayloadError> {
        let JsonValue::Object(mut body) = body else {
            return Err(PayloadError::NotAnObject);
        };

        match body.get("resourceType").cloned() {
            None | Some(JsonValue::Null) => {
                body.insert(
                    "resourceType".to_string(),
                    JsonValue::String(kind.as_str().to_string()),
                );
            }
            Some(JsonValue::String(found)) if found == kind.as_str() => {}
            Some(other) => {
                return Err(PayloadError::ResourceTypeMismatch {
                    expected: kind,
                    found: other.as_str().map(str::to_string).unwrap_or_else(|| other.to_string()),
                })
            }
        }

        Ok(match kind {
            ResourceKind::Patient => ResourcePayload::Patient(PatientPayload::from_body(body)),
            ResourceKind::ServiceRequest => {
                ResourcePayload::ServiceRequest(ServiceRequestPayload {
                    subject: ReferenceInput::from_object(body.get("subject")),
                    status: body
                        .get("status")
                        .and_then(|v| v.as_str())
                        .map(str::to_string),
                    body,
                })
            }
            ResourceKind::Appointment => ResourcePayload::Appointment(AppointmentPayload {
                based_on: ReferenceInput::from_first_element(body.get("basedOn")),
                body,
            }),
            ResourceKind::ImagingStudy => ResourcePayload::ImagingStudy(ImagingStudyPayload {
                based_on: ReferenceInput::from_first_element(body.get("basedOn")),
                body,
            }),
            ResourceKind::DiagnosticReport => {
                ResourcePayload::DiagnosticReport(DiagnosticReportPayload { body })
            }
        })
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourcePayload::Patient(_) => ResourceKind::Patient,
            ResourcePayload::ServiceRequest(_) => ResourceKind::ServiceRequest,
            ResourcePayload::Appointment(_) => ResourceKind::Appointment,
            ResourcePayload::ImagingStudy(_) => ResourceKind::ImagingStudy,
            ResourcePayload::DiagnosticReport(_) => ResourceKind::DiagnosticReport,
        }
    }

    /// The predecessor reference as supplied, for kinds that have one.
    pub fn predecessor_reference(&self) -> Option<&ReferenceInput> {
        match self {
            ResourcePayload::ServiceRequest(sr) => Some(&sr.subject),
            ResourcePayload::Appointment(appt) => Some(&appt.based_on),
            ResourcePayload::ImagingStudy(study) => Some(&study.based_on),
            ResourcePayload::Patient(_) | ResourcePayload::DiagnosticReport(_) => None,
        }
    }

    pub fn body(&self) -> &JsonObject {
        match self {
            ResourcePayload::Patient(p) => &p.body,
            ResourcePayload::ServiceRequest(p) => &p.body,
            ResourcePayload::Appointment(p) => &p.body,
            ResourcePayload::ImagingStudy(p) => &p.body,
            ResourcePayload::DiagnosticReport(p) => &p.body,
        }
    }

    fn body_mut(&mut self) -> &mut JsonObject {
        match self {
            ResourcePayload::Patient(p) => &mut p.body,
            ResourcePayload::ServiceRequest(p) => &mut p.body,
            ResourcePayload::Appointment(p) => &mut p.body,
            ResourcePayload::ImagingStudy(p) => &mut p.body,
            ResourcePayload::DiagnosticReport(p) => &mut p.body,
        }
    }

    pub fn into_body(self) -> JsonObject {
        match self {
            ResourcePayload::Patient(p) => p.body,
            ResourcePayload::ServiceRequest(p) => p.body,
            ResourcePayload::Appointment(p) => p.body,
            ResourcePayload::ImagingStudy(p) => p.body,
            ResourcePayload::DiagnosticReport(p) => p.body,
        }
    }

    /// Rewrite the predecessor reference to its canonical `Kind/id` form.
    ///
    /// No-op for kinds without a predecessor.
    pub fn set_canonical_reference(&mut self, reference: &Reference) {
        let Some(field) = self.kind().reference_field() else {
            return;
        };
        let canonical = reference.canonical();

        let slot = match self.body_mut().get_mut(field) {
            Some(JsonValue::Array(items)) => items.first_mut(),
            Some(value) => Some(value),
            None => None,
        };
        if let Some(JsonValue::Object(obj)) = slot {
            obj.insert(
                "reference".to_string(),
                JsonValue::String(canonical.clone()),
            );
        }

        let input = ReferenceInput::Literal(canonical);
        match self {
            ResourcePayload::ServiceRequest(sr) => sr.subject = input,
            ResourcePayload::Appointment(appt) => appt.based_on = input,
            ResourcePayload::ImagingStudy(study) => study.based_on = input,
            ResourcePayload::Patient(_) | ResourcePayload::DiagnosticReport(_) => {}
        }
    }

    /// Apply per-kind defaults and date normalization.
    pub fn normalize(&mut self) -> Result<(), FieldError> {
        match self {
            ResourcePayload::ServiceRequest(sr) => sr.normalize(),
            ResourcePayload::Appointment(appt) => appt.normalize(),
            ResourcePayload::ImagingStudy(study) => study.normalize(),
            ResourcePayload::Patient(_) | ResourcePayload::DiagnosticReport(_) => Ok(()),
        }
    }
}

impl PatientPayload {
    fn from_body(body: JsonObject) -> Self {
        let identifiers = body
            .get("identifier")
            .and_then(|v| v.as_array())
            .map(|items| items.iter().filter_map(Identifier::from_json).collect())
            .unwrap_or_default();

        let name = body
            .get("name")
            .and_then(|v| v.as_array())
            .and_then(|names| names.first());
        let family = name.and_then(|n| non_empty_str(n.get("family")));
        let given = name
            .and_then(|n| n.get("given"))
            .and_then(|g| g.as_array())
            .and_then(|g| non_empty_str(g.first()));
        let birth_date = non_empty_str(body.get("birthDate"));

        let demographics = match (family, given, birth_date) {
            (Some(family), Some(given), Some(birth_date)) => Some(Demographics {
                family: family.to_string(),
                given: given.to_string(),
                birth_date: birth_date.to_string(),
            }),
            _ => None,
        };

        Self {
            identifiers,
            demographics,
            body,
        }
    }

    /// Identifiers in declaration order, skipping entries without a system or value.
    pub fn identifiers(&self) -> &[Identifier] {
        &self.identifiers
    }

    pub fn demographics(&self) -> Option<&Demographics> {
        self.demographics.as_ref()
    }
}

impl ServiceRequestPayload {
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    fn normalize(&mut self) -> Result<(), FieldError> {
        if is_blank(self.body.get("occurrenceDateTime")) {
            self.body.insert(
                "occurrenceDateTime".to_string(),
                JsonValue::String(temporal::now_string()),
            );
        }
        Ok(())
    }
}

impl AppointmentPayload {
    fn normalize(&mut self) -> Result<(), FieldError> {
        if is_blank(self.body.get("status")) {
            self.body
                .insert("status".to_string(), JsonValue::String("booked".into()));
        }

        let has_participant = self
            .body
            .get("participant")
            .and_then(|v| v.as_array())
            .is_some_and(|items| !items.is_empty());
        if !has_participant {
            self.body.insert(
                "participant".to_string(),
                json!([{
                    "actor": {"display": "Unassigned"},
                    "status": "needs-action"
                }]),
            );
        }

        self.normalize_schedule()
    }

    /// Fill a missing bound from the other one, then check the pair.
    ///
    /// Date-only appointments are stored as dates and must start and end on the
    /// same day; timed appointments keep their instants and must not end early.
    fn normalize_schedule(&mut self) -> Result<(), FieldError> {
        let start = optional_string(&self.body, "start")?;
        let end = optional_string(&self.body, "end")?;

        let (start_raw, end_raw) = match (start, end) {
            (None, None) => return Ok(()),
            (Some(s), None) => (s.clone(), s),
            (None, Some(e)) => (e.clone(), e),
            (Some(s), Some(e)) => (s, e),
        };

        let start = parse_temporal("start", &start_raw)?;
        let end = parse_temporal("end", &end_raw)?;

        let (start_out, end_out) = match (start, end) {
            (Temporal::DateTime(s), Temporal::DateTime(e)) => {
                if e < s {
                    return Err(FieldError::InvalidAppointmentDuration {
                        start: start_raw,
                        end: end_raw,
                    });
                }
                (
                    temporal::with_utc_marker(&start_raw),
                    temporal::with_utc_marker(&end_raw),
                )
            }
            _ => {
                if start.date() != end.date() {
                    return Err(FieldError::InvalidAppointmentDuration {
                        start: start_raw,
                        end: end_raw,
                    });
                }
                let day = Temporal::Date(start.date()).to_fhir_string();
                (day.clone(), day)
            }
        };

        self.body
            .insert("start".to_string(), JsonValue::String(start_out));
        self.body.insert("end".to_string(), JsonValue::String(end_out));
        Ok(())
    }
}

impl ImagingStudyPayload {
    fn normalize(&mut self) -> Result<(), FieldError> {
        if is_blank(self.body.get("status")) {
            self.body
                .insert("status".to_string(), JsonValue::String("registered".into()));
        }

        let started = match self.body.get("started") {
            Some(JsonValue::String(s)) if !s.trim().is_empty() => temporal::with_utc_marker(s),
            Some(JsonValue::String(_)) | Some(JsonValue::Null) | None => {
                return Err(FieldError::MissingRequiredField("started"))
            }
            Some(other) => {
                return Err(FieldError::InvalidDateTimeFormat {
                    field: "started",
                    value: other.to_string(),
                })
            }
        };
        parse_temporal("started", &started)?;
        self.body
            .insert("started".to_string(), JsonValue::String(started));

        let first_modality = match self.body.get("modality") {
            None => None,
            Some(JsonValue::Array(items)) => {
                let well_formed = items
                    .iter()
                    .all(|m| m.as_object().is_some_and(|obj| obj.contains_key("code")));
                if !well_formed {
                    return Err(FieldError::InvalidModalityStructure);
                }
                items.first().cloned()
            }
            Some(_) => return Err(FieldError::InvalidModalityStructure),
        };

        self.body
            .entry("numberOfSeries")
            .or_insert_with(|| json!(1));
        self.body
            .entry("numberOfInstances")
            .or_insert_with(|| json!(1));
        self.body.entry("series").or_insert_with(|| {
            json!([{
                "uid": "1.2.3.4",
                "number": 1,
                "modality": first_modality.unwrap_or_else(|| json!({"code": "OT"})),
                "numberOfInstances": 1
            }])
        });

        Ok(())
    }
}

impl DiagnosticReportPayload {
    pub fn body(&self) -> &JsonObject {
        &self.body
    }
}

fn non_empty_str(value: Option<&JsonValue>) -> Option<&str> {
    value
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
}

fn is_blank(value: Option<&JsonValue>) -> bool {
    match value {
        None | Some(JsonValue::Null) => true,
        Some(JsonValue::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

fn optional_string(body: &JsonObject, field: &'static str) -> Result<Option<String>, FieldError> {
    match body.get(field) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(FieldError::InvalidDateTimeFormat {
            field,
            value: other.to_string(),
        }),
    }
}

fn parse_temporal(field: &'static str, raw: &str) -> Result<Temporal, FieldError> {
    Temporal::parse(raw).ok_or_else(|| FieldError::InvalidDateTimeFormat {
        field,
        value: raw.to_string(),
    })
}
