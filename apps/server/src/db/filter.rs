//! Query filters over JSON documents
//!
//! Paths are dotted (`basedOn.0.reference`). A numeric segment indexes into an
//! array, and a value that is not an array counts as a one-element array, so
//! `name.0.family` also reaches `{"name": {"family": ..}}`. Any other segment
//! applied to an array fans out over its elements, so `basedOn.reference`
//! matches the reference of every `basedOn` entry. These are the rules of a
//! PostgreSQL `lax` JSONPath; the PostgreSQL store compiles paths to one and
//! [`Filter::matches`] follows them in memory.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::fmt;

/// A dotted path into a JSON document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn parse(path: &str) -> Self {
        Self(
            path.split('.')
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// All values reachable through this path.
    pub fn resolve<'a>(&self, document: &'a JsonValue) -> Vec<&'a JsonValue> {
        let mut out = Vec::new();
        resolve_into(document, &self.0, &mut out);
        out
    }

    /// First reachable value, used for index key components.
    pub fn resolve_first<'a>(&self, document: &'a JsonValue) -> Option<&'a JsonValue> {
        self.resolve(document).into_iter().next()
    }
}

fn resolve_into<'a>(value: &'a JsonValue, segments: &[String], out: &mut Vec<&'a JsonValue>) {
    let Some((head, rest)) = segments.split_first() else {
        out.push(value);
        return;
    };

    match (value, array_index(head)) {
        (JsonValue::Array(items), Some(index)) => {
            if let Some(item) = items.get(index) {
                resolve_into(item, rest, out);
            }
        }
        (JsonValue::Array(items), None) => {
            for item in items.iter().filter(|item| item.is_object()) {
                resolve_into(item, segments, out);
            }
        }
        (other, Some(0)) => resolve_into(other, rest, out),
        (_, Some(_)) => {}
        (JsonValue::Object(map), None) => {
            if let Some(child) = map.get(head) {
                resolve_into(child, rest, out);
            }
        }
        _ => {}
    }
}

/// Segments made only of ASCII digits address array elements.
pub(crate) fn array_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl From<&str> for FieldPath {
    fn from(path: &str) -> Self {
        FieldPath::parse(path)
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(FieldPath::parse(&raw))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Some value at `path` equals `value`, or is an array containing it.
    Eq { path: FieldPath, value: JsonValue },
    /// Some string value at `path` ends with `suffix`.
    EndsWith { path: FieldPath, suffix: String },
    /// Some element of the array at `path` matches `filter` on its own.
    ElemMatch { path: FieldPath, filter: Box<Filter> },
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(path: &str, value: impl Into<JsonValue>) -> Self {
        Filter::Eq {
            path: FieldPath::parse(path),
            value: value.into(),
        }
    }

    pub fn ends_with(path: &str, suffix: impl Into<String>) -> Self {
        Filter::EndsWith {
            path: FieldPath::parse(path),
            suffix: suffix.into(),
        }
    }

    pub fn elem_match(path: &str, filter: Filter) -> Self {
        Filter::ElemMatch {
            path: FieldPath::parse(path),
            filter: Box::new(filter),
        }
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::And(filters)
    }

    pub fn or(filters: Vec<Filter>) -> Self {
        Filter::Or(filters)
    }

    pub fn matches(&self, document: &JsonValue) -> bool {
        match self {
            Filter::Eq { path, value } => path.resolve(document).into_iter().any(|candidate| {
                candidate == value
                    || candidate
                        .as_array()
                        .is_some_and(|items| items.contains(value))
            }),
            Filter::EndsWith { path, suffix } => path
                .resolve(document)
                .into_iter()
                .filter_map(|candidate| candidate.as_str())
                .any(|s| s.ends_with(suffix.as_str())),
            Filter::ElemMatch { path, filter } => {
                path.resolve(document).into_iter().any(|candidate| match candidate {
                    JsonValue::Array(items) => items.iter().any(|item| filter.matches(item)),
                    other => filter.matches(other),
                })
            }
            Filter::And(filters) => filters.iter().all(|f| f.matches(document)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(document)),
        }
    }
}
