//! Projection of stack outputs onto the keys a caller asked for.

use crate::core::OutputEntry;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// A requested output: its value, or an explicit "not present" marker.
///
/// Serializes as the value string, or `false` when missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputValue {
    /// The stack declared this output.
    Present(String),
    /// The stack has no output with this key.
    Missing,
}

impl OutputValue {
    /// The value, when present.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Present(value) => Some(value),
            Self::Missing => None,
        }
    }

    /// Returns true for [`OutputValue::Missing`].
    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

impl Serialize for OutputValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Present(value) => serializer.serialize_str(value),
            Self::Missing => serializer.serialize_bool(false),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireOutputValue {
    Value(String),
    Flag(bool),
}

impl<'de> Deserialize<'de> for OutputValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match WireOutputValue::deserialize(deserializer)? {
            WireOutputValue::Value(value) => Ok(Self::Present(value)),
            WireOutputValue::Flag(false) => Ok(Self::Missing),
            WireOutputValue::Flag(true) => Err(serde::de::Error::custom(
                "output value must be a string or false",
            )),
        }
    }
}

/// Requested outputs keyed by output name.
pub type ExtractedOutputs = BTreeMap<String, OutputValue>;

/// Maps every requested key to the first output with that key.
///
/// Keys with no matching output map to [`OutputValue::Missing`].
#[must_use]
pub fn extract_outputs(outputs: &[OutputEntry], requested: &[String]) -> ExtractedOutputs {
    requested
        .iter()
        .map(|key| {
            let value = outputs
                .iter()
                .find(|entry| &entry.key == key)
                .map_or(OutputValue::Missing, |entry| {
                    OutputValue::Present(entry.value.clone())
                });
            (key.clone(), value)
        })
        .collect()
}
