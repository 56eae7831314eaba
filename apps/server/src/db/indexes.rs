//! Unique index definitions and key extraction
//!
//! Both store implementations enforce uniqueness the same way: every index maps
//! a document to zero or more string keys, and a key may belong to at most one
//! document. An index with a `root` is multikey (one key per element of the root
//! array). Indexes are partial: an element or document missing any component is
//! simply not indexed.

use crate::db::filter::FieldPath;
use ris_models::ResourceKind;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;

pub const PATIENT_IDENTIFIER_INDEX: &str = "patient_identifier";
pub const PATIENT_DEMOGRAPHICS_INDEX: &str = "patient_demographics";
pub const APPOINTMENT_BASED_ON_INDEX: &str = "appointment_based_on";
pub const IMAGING_STUDY_BASED_ON_INDEX: &str = "imaging_study_based_on";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueIndex {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<FieldPath>,
    pub fields: Vec<FieldPath>,
}

impl UniqueIndex {
    pub fn new(name: impl Into<String>, fields: &[&str]) -> Self {
        Self {
            name: name.into(),
            root: None,
            fields: fields.iter().map(|f| FieldPath::parse(f)).collect(),
        }
    }

    /// One key per element of the array at `root`.
    pub fn multikey(name: impl Into<String>, root: &str, fields: &[&str]) -> Self {
        Self {
            root: Some(FieldPath::parse(root)),
            ..Self::new(name, fields)
        }
    }

    /// Keys this document contributes to the index, deduplicated.
    pub fn keys(&self, document: &JsonValue) -> Vec<String> {
        let mut keys = BTreeSet::new();

        match &self.root {
            Some(root) => {
                for value in root.resolve(document) {
                    match value {
                        JsonValue::Array(items) => {
                            keys.extend(items.iter().filter_map(|item| self.key_for(item)))
                        }
                        other => keys.extend(self.key_for(other)),
                    }
                }
            }
            None => keys.extend(self.key_for(document)),
        }

        keys.into_iter().collect()
    }

    fn key_for(&self, element: &JsonValue) -> Option<String> {
        let components = self
            .fields
            .iter()
            .map(|field| {
                field
                    .resolve_first(element)
                    .and_then(|v| v.as_str())
                    .filter(|s| !s.trim().is_empty())
            })
            .collect::<Option<Vec<&str>>>()?;

        serde_json::to_string(&components).ok()
    }
}

/// Indexes ensured at startup, per collection.
pub fn standard_indexes(enforce_reference_cardinality: bool) -> Vec<(ResourceKind, UniqueIndex)> {
    let mut indexes = vec![
        (
            ResourceKind::Patient,
            UniqueIndex::multikey(PATIENT_IDENTIFIER_INDEX, "identifier", &["system", "value"]),
        ),
        (
            ResourceKind::Patient,
            UniqueIndex::new(
                PATIENT_DEMOGRAPHICS_INDEX,
                &["name.0.family", "name.0.given.0", "birthDate"],
            ),
        ),
    ];

    if enforce_reference_cardinality {
        indexes.push((
            ResourceKind::Appointment,
            UniqueIndex::new(APPOINTMENT_BASED_ON_INDEX, &["basedOn.0.reference"]),
        ));
        indexes.push((
            ResourceKind::ImagingStudy,
            UniqueIndex::new(IMAGING_STUDY_BASED_ON_INDEX, &["basedOn.0.reference"]),
        ));
    }

    indexes
}
