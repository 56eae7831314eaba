//! Resource shape validation
//!
//! The write path treats shape validation as a black box: a body is either
//! accepted or rejected with a list of issues. [`ShapeValidator`] is that seam;
//! [`StructuralValidator`] is the implementation shipped with the server. It
//! checks only the fields the record store depends on, not the full clinical
//! model.
//!
//! Reference fields (`subject`, `basedOn`) and the fields normalized later on the
//! write path (`start`, `end`, `started`, `modality`) are deliberately left to
//! the integrity layer, which reports them with their own outcome tags.

use ris_models::ResourceKind;
use serde_json::Value as JsonValue;

mod structural;

pub use structural::StructuralValidator;

/// Validates the shape of a resource body for a given kind.
pub trait ShapeValidator: Send + Sync {
    fn validate_shape(&self, kind: ResourceKind, body: &JsonValue) -> ValidationResult;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSeverity {
    Error,
    Warning,
}

impl std::fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub severity: IssueSeverity,
    pub location: Option<String>,
    pub diagnostics: String,
}

impl ValidationIssue {
    pub fn error(diagnostics: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Error,
            location: None,
            diagnostics: diagnostics.into(),
        }
    }

    pub fn warning(diagnostics: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Warning,
            location: None,
            diagnostics: diagnostics.into(),
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{}: {}", location, self.diagnostics),
            None => f.write_str(&self.diagnostics),
        }
    }
}

/// Outcome of validating one resource body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn success() -> Self {
        Self {
            valid: true,
            issues: Vec::new(),
        }
    }

    /// Valid unless at least one issue is an error.
    pub fn from_issues(issues: Vec<ValidationIssue>) -> Self {
        let valid = !issues
            .iter()
            .any(|issue| issue.severity == IssueSeverity::Error);
        Self { valid, issues }
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|issue| issue.severity == IssueSeverity::Error)
    }

    /// Error issues joined into a single line, for outcome messages.
    pub fn summary(&self) -> String {
        self.errors()
            .map(|issue| issue.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}
