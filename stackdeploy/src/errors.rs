//! Error types for stack deployments.
//!
//! Provider adapters raise [`ProviderError`]; everything inside the
//! orchestrator converges on [`DeployError`], which the deployment boundary
//! turns into an error envelope.

use crate::provider::Rejection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for deployment operations.
#[derive(Debug, Error)]
pub enum DeployError {
    /// The provider transport failed to carry out a command or query.
    #[error("{0}")]
    Transport(#[from] TransportError),

    /// The provider refused a create/update for an unrecognized reason.
    #[error("{0}")]
    ProviderRejection(Rejection),

    /// The provider reported no stack under the requested name.
    #[error("No stacks found with the name {name}")]
    StackNotFound {
        /// The stack name that was looked up.
        name: String,
    },

    /// A stack output record was missing its key or value.
    #[error("{0}")]
    MalformedOutput(#[from] MalformedOutputError),

    /// Deployment configuration violated an invariant.
    #[error("{0}")]
    InvalidConfig(#[from] ConfigError),
}

impl DeployError {
    /// Short machine-readable kind, used as a structured log field.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::ProviderRejection(_) => "provider_rejection",
            Self::StackNotFound { .. } => "stack_not_found",
            Self::MalformedOutput(_) => "malformed_output",
            Self::InvalidConfig(_) => "invalid_config",
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!(self.kind()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        if let Self::ProviderRejection(rejection) = self {
            map.insert("code".to_string(), serde_json::json!(rejection.code));
        }
        map
    }
}

impl From<ProviderError> for DeployError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Transport(e) => Self::Transport(e),
            ProviderError::Rejected(rejection) => Self::ProviderRejection(rejection),
            ProviderError::StackNotFound { name } => Self::StackNotFound { name },
        }
    }
}

/// Errors raised by a [`StackProvider`](crate::provider::StackProvider).
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The command or query itself failed (spawn, exit, timeout, decode).
    #[error("{0}")]
    Transport(#[from] TransportError),

    /// The provider answered and refused the mutation.
    #[error("{0}")]
    Rejected(Rejection),

    /// The describe call returned no stacks.
    #[error("No stacks found with the name {name}")]
    StackNotFound {
        /// The stack name.
        name: String,
    },
}

impl ProviderError {
    /// Creates a transport error for an operation.
    #[must_use]
    pub fn transport(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport(TransportError::new(operation, message))
    }

    /// Creates a rejection, classifying the reason text.
    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(Rejection::from_reason(reason))
    }

    /// Creates a stack-not-found error.
    #[must_use]
    pub fn stack_not_found(name: impl Into<String>) -> Self {
        Self::StackNotFound { name: name.into() }
    }

    /// Returns the rejection if the provider refused the request.
    #[must_use]
    pub fn as_rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }
}

/// The provider transport failed to respond.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Provider transport error during {operation}: {message}")]
pub struct TransportError {
    /// The provider operation (e.g. "update-stack").
    pub operation: String,
    /// What went wrong.
    pub message: String,
}

impl TransportError {
    /// Creates a new transport error.
    #[must_use]
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// A stack output record missing one of its required fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedOutputError {
    /// The output has no key.
    #[error("Output does not have a key")]
    MissingKey,

    /// The output has a key but no value.
    #[error("Output does not have a value")]
    MissingValue {
        /// The key of the incomplete output.
        key: String,
    },
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Poll settings violate an invariant.
    #[error("Invalid poll config: {0}")]
    InvalidPoll(String),

    /// CLI settings violate an invariant.
    #[error("Invalid cli config: {0}")]
    InvalidCli(String),

    /// The config document could not be parsed.
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// The config file could not be read.
    #[error("Failed to read config file {path}: {message}")]
    Read {
        /// The file path.
        path: String,
        /// The underlying IO error text.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::RejectionCode;

    #[test]
    fn test_provider_error_converts_to_deploy_error() {
        let err: DeployError = ProviderError::transport("describe-stacks", "exit 255").into();
        assert_eq!(err.kind(), "transport");
        assert!(err.to_string().contains("describe-stacks"));

        let err: DeployError = ProviderError::stack_not_found("app").into();
        assert_eq!(err.to_string(), "No stacks found with the name app");
    }

    #[test]
    fn test_rejection_keeps_reason_text() {
        let err: DeployError = ProviderError::rejected("Template format error").into();
        assert_eq!(err.kind(), "provider_rejection");
        assert_eq!(err.to_string(), "Template format error");

        let dict = err.to_dict();
        assert_eq!(dict.get("type").unwrap(), "provider_rejection");
        assert_eq!(dict.get("code").unwrap(), &serde_json::json!(RejectionCode::Other));
    }

    #[test]
    fn test_malformed_output_messages() {
        assert_eq!(
            MalformedOutputError::MissingKey.to_string(),
            "Output does not have a key"
        );
        let err: DeployError = MalformedOutputError::MissingValue { key: "Url".into() }.into();
        assert_eq!(err.to_string(), "Output does not have a value");
    }

    #[test]
    fn test_as_rejection() {
        assert!(ProviderError::rejected("x").as_rejection().is_some());
        assert!(ProviderError::transport("op", "x").as_rejection().is_none());
    }
}
