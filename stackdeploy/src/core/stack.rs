//! Stack requests and provider descriptions.

use super::status::StackStatus;
use crate::errors::MalformedOutputError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A request to deploy one template as a named stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackRequest {
    /// Base stack name.
    pub name: String,
    /// Provider region the stack lives in.
    pub region: String,
    /// Serialized template document. Never inspected.
    pub template_body: String,
    /// Optional suffix appended to the name (e.g. "dev").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
}

impl StackRequest {
    /// Creates a new stack request.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        region: impl Into<String>,
        template_body: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
            template_body: template_body.into(),
            stage: None,
        }
    }

    /// Sets the stage suffix.
    #[must_use]
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        let stage = stage.into();
        self.stage = (!stage.is_empty()).then_some(stage);
        self
    }

    /// The name the provider knows the stack by: name followed by stage.
    #[must_use]
    pub fn stack_name(&self) -> String {
        match &self.stage {
            Some(stage) => format!("{}{}", self.name, stage),
            None => self.name.clone(),
        }
    }

    /// The stack this request addresses.
    #[must_use]
    pub fn target(&self) -> StackTarget {
        StackTarget::new(self.stack_name(), self.region.clone())
    }

    /// Hex SHA-256 of the template body, for log correlation.
    #[must_use]
    pub fn template_fingerprint(&self) -> String {
        hex::encode(Sha256::digest(self.template_body.as_bytes()))
    }
}

/// A stack name bound to a region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StackTarget {
    /// Stack name.
    pub name: String,
    /// Region.
    pub region: String,
}

impl StackTarget {
    /// Creates a new target.
    #[must_use]
    pub fn new(name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
        }
    }
}

impl fmt::Display for StackTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.region)
    }
}

/// Provider-assigned stack identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StackId(pub String);

impl StackId {
    /// Creates a new stack id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An output record exactly as the provider returned it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOutput {
    /// Output key, if present.
    pub key: Option<String>,
    /// Output value, if present.
    pub value: Option<String>,
}

impl RawOutput {
    /// Creates a complete raw output.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            value: Some(value.into()),
        }
    }
}

/// A validated stack output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputEntry {
    /// Output name.
    pub key: String,
    /// Output value.
    pub value: String,
}

impl OutputEntry {
    /// Creates a new output entry.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl TryFrom<RawOutput> for OutputEntry {
    type Error = MalformedOutputError;

    fn try_from(raw: RawOutput) -> Result<Self, Self::Error> {
        let key = raw
            .key
            .filter(|k| !k.is_empty())
            .ok_or(MalformedOutputError::MissingKey)?;
        let value = match raw.value.filter(|v| !v.is_empty()) {
            Some(value) => value,
            None => return Err(MalformedOutputError::MissingValue { key }),
        };
        Ok(Self { key, value })
    }
}

/// A stack as described by the provider at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDescription {
    /// Raw stack status.
    pub status: StackStatus,
    /// Free-text reason for the status.
    #[serde(default)]
    pub status_reason: Option<String>,
    /// Declared outputs, unvalidated.
    #[serde(default)]
    pub outputs: Vec<RawOutput>,
}

impl StackDescription {
    /// Creates a description with no reason and no outputs.
    #[must_use]
    pub fn new(status: impl Into<StackStatus>) -> Self {
        Self {
            status: status.into(),
            status_reason: None,
            outputs: Vec::new(),
        }
    }

    /// Sets the status reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.status_reason = Some(reason.into());
        self
    }

    /// Adds a complete output.
    #[must_use]
    pub fn with_output(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.outputs.push(RawOutput::new(key, value));
        self
    }

    /// Adds a raw, possibly incomplete, output.
    #[must_use]
    pub fn with_raw_output(mut self, output: RawOutput) -> Self {
        self.outputs.push(output);
        self
    }

    /// Validates every declared output. Any incomplete record is an error.
    pub fn validated_outputs(&self) -> Result<Vec<OutputEntry>, MalformedOutputError> {
        self.outputs
            .iter()
            .cloned()
            .map(OutputEntry::try_from)
            .collect()
    }
}
