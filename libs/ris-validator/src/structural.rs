use crate::{ShapeValidator, ValidationIssue, ValidationResult};
use ris_models::temporal::Temporal;
use ris_models::ResourceKind;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

/// Deserializes the body into a per-kind shape and runs its validation rules.
///
/// Unknown fields are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralValidator;

impl StructuralValidator {
    pub fn new() -> Self {
        Self
    }
}

impl ShapeValidator for StructuralValidator {
    fn validate_shape(&self, kind: ResourceKind, body: &JsonValue) -> ValidationResult {
        if !body.is_object() {
            return ValidationResult::from_issues(vec![ValidationIssue::error(
                "Resource body must be a JSON object",
            )]);
        }

        let mut issues = Vec::new();
        if let Some(declared) = body.get("resourceType") {
            if declared.as_str() != Some(kind.as_str()) {
                issues.push(
                    ValidationIssue::error(format!("resourceType must be {kind}"))
                        .with_location("resourceType"),
                );
            }
        }

        match kind {
            ResourceKind::Patient => check::<PatientShape>(body, &mut issues),
            ResourceKind::ServiceRequest => check::<ServiceRequestShape>(body, &mut issues),
            ResourceKind::Appointment => check::<AppointmentShape>(body, &mut issues),
            ResourceKind::ImagingStudy => check::<ImagingStudyShape>(body, &mut issues),
            ResourceKind::DiagnosticReport => check::<DiagnosticReportShape>(body, &mut issues),
        }

        ValidationResult::from_issues(issues)
    }
}

/// Cross-field rules that the derive attributes cannot express.
trait ShapeRules {
    fn check_rules(&self, _issues: &mut Vec<ValidationIssue>) {}
}

fn check<'de, T>(body: &'de JsonValue, issues: &mut Vec<ValidationIssue>)
where
    T: Deserialize<'de> + Validate + ShapeRules,
{
    let shape = match T::deserialize(body) {
        Ok(shape) => shape,
        Err(err) => {
            issues.push(ValidationIssue::error(err.to_string()));
            return;
        }
    };

    if let Err(errors) = shape.validate() {
        let mut found = Vec::new();
        collect_errors("", &errors, &mut found);
        found.sort_by(|a, b| a.location.cmp(&b.location));
        issues.extend(found);
    }
    shape.check_rules(issues);
}

fn collect_errors(prefix: &str, errors: &ValidationErrors, out: &mut Vec<ValidationIssue>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };

        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for error in field_errors {
                    out.push(ValidationIssue::error(describe(error)).with_location(path.clone()));
                }
            }
            ValidationErrorsKind::Struct(inner) => collect_errors(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_errors(&format!("{path}[{index}]"), inner, out);
                }
            }
        }
    }
}

fn describe(error: &ValidationError) -> String {
    match &error.message {
        Some(message) => message.to_string(),
        None => format!("failed '{}' check", error.code),
    }
}

#[derive(Debug, Deserialize, Validate)]
struct IdentifierShape {
    #[validate(length(min = 1, message = "must not be empty"))]
    system: Option<String>,
    #[validate(length(min = 1, message = "must not be empty"))]
    value: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
struct HumanNameShape {
    #[validate(length(min = 1, message = "must not be empty"))]
    family: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct PatientShape {
    #[validate(nested)]
    identifier: Option<Vec<IdentifierShape>>,
    #[validate(nested)]
    name: Option<Vec<HumanNameShape>>,
    birth_date: Option<String>,
}

impl ShapeRules for PatientShape {
    fn check_rules(&self, issues: &mut Vec<ValidationIssue>) {
        let mut systems = HashSet::new();
        for (index, identifier) in self.identifier.iter().flatten().enumerate() {
            let Some(system) = identifier.system.as_deref() else {
                continue;
            };
            if !systems.insert(system) {
                issues.push(
                    ValidationIssue::error(format!("duplicate identifier system {system:?}"))
                        .with_location(format!("identifier[{index}].system")),
                );
            }
        }

        if let Some(birth_date) = self.birth_date.as_deref() {
            if !matches!(Temporal::parse(birth_date), Some(Temporal::Date(_))) {
                issues.push(
                    ValidationIssue::error(format!("{birth_date:?} is not a date"))
                        .with_location("birthDate"),
                );
            }
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
struct ServiceRequestShape {
    #[validate(length(min = 1, message = "must not be empty"))]
    status: String,
    #[validate(length(min = 1, message = "must not be empty"))]
    intent: String,
}

impl ShapeRules for ServiceRequestShape {}

#[derive(Debug, Deserialize, Validate)]
struct ParticipantShape {
    #[validate(length(min = 1, message = "must not be empty"))]
    status: String,
}

#[derive(Debug, Deserialize, Validate)]
struct AppointmentShape {
    #[validate(length(min = 1, message = "must not be empty"))]
    status: Option<String>,
    #[validate(nested)]
    participant: Option<Vec<ParticipantShape>>,
}

impl ShapeRules for AppointmentShape {}

#[derive(Debug, Deserialize, Validate)]
struct SeriesShape {
    #[validate(length(min = 1, message = "must not be empty"))]
    uid: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct ImagingStudyShape {
    #[validate(length(min = 1, message = "must not be empty"))]
    status: Option<String>,
    #[validate(range(min = 1, message = "must be at least 1"))]
    number_of_series: Option<u32>,
    #[validate(range(min = 1, message = "must be at least 1"))]
    number_of_instances: Option<u32>,
    #[validate(nested)]
    series: Option<Vec<SeriesShape>>,
}

impl ShapeRules for ImagingStudyShape {}

#[derive(Debug, Deserialize)]
struct CodeableConceptShape {
    coding: Option<Vec<JsonValue>>,
    text: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
struct DiagnosticReportShape {
    #[validate(length(min = 1, message = "must not be empty"))]
    status: String,
    code: CodeableConceptShape,
}

impl ShapeRules for DiagnosticReportShape {
    fn check_rules(&self, issues: &mut Vec<ValidationIssue>) {
        let has_coding = self.code.coding.as_ref().is_some_and(|c| !c.is_empty());
        let has_text = self
            .code
            .text
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty());
        if !has_coding && !has_text {
            issues.push(
                ValidationIssue::error("code needs at least one coding or a text")
                    .with_location("code"),
            );
        }
    }
}
