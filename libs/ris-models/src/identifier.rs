use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// External business key of a resource, distinct from its store id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    pub system: String,
    pub value: String,
}

impl Identifier {
    pub fn new(system: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            value: value.into(),
        }
    }

    /// Read an identifier object, ignoring entries without a non-empty `system` and `value`.
    pub(crate) fn from_json(value: &JsonValue) -> Option<Self> {
        let system = value.get("system")?.as_str()?;
        let val = value.get("value")?.as_str()?;
        if system.trim().is_empty() || val.trim().is_empty() {
            return None;
        }
        Some(Self::new(system, val))
    }
}
