//! Serde helpers for upstream records.

use serde::{Deserialize, Deserializer};

/// Read a field the upstream may send as an explicit `null`, mapping `null`
/// to the type's default. Pair with `#[serde(default)]` so an absent field
/// behaves the same way.
///
/// # Errors
///
/// Returns the deserializer's error when the value is present but has the
/// wrong shape.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
