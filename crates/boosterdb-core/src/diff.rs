use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named projection of one comparable value out of an observation.
pub struct WatchedField<T> {
    pub name: &'static str,
    pub extract: fn(&T) -> Value,
}

impl<T> WatchedField<T> {
    pub const fn new(name: &'static str, extract: fn(&T) -> Value) -> Self {
        Self { name, extract }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old: Value,
    pub new: Value,
}

/// Compare two observations of the same entity field by field.
///
/// Returns one entry per watched field whose extracted value differs, in the
/// order the fields are listed. An empty result means "no event".
#[must_use]
pub fn detect_changes<T>(old: &T, new: &T, fields: &[WatchedField<T>]) -> Vec<FieldChange> {
    fields
        .iter()
        .filter_map(|field| {
            let before = (field.extract)(old);
            let after = (field.extract)(new);
            (before != after).then(|| FieldChange {
                field: field.name.to_string(),
                old: before,
                new: after,
            })
        })
        .collect()
}
