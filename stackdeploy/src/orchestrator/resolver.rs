//! Create-or-update resolution.
//!
//! The provider has no upsert. An update is attempted first and the
//! rejection code decides what happens next.

use crate::core::{StackId, StackRequest};
use crate::errors::{DeployError, ProviderError};
use crate::provider::{RejectionCode, StackProvider};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// What the provider is doing with the stack after resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "id", rename_all = "lowercase")]
pub enum CommandStatus {
    /// The stack did not exist and a create was submitted.
    Creating(StackId),
    /// An update was submitted.
    Updating(StackId),
    /// The template matches the deployed stack.
    Nothing,
    /// A create started elsewhere is still running.
    CreateInProgress,
    /// An update started elsewhere is still running.
    UpdateInProgress,
    /// A delete is running.
    DeleteInProgress,
}

impl CommandStatus {
    /// The stack id, when a command was submitted.
    #[must_use]
    pub fn stack_id(&self) -> Option<&StackId> {
        match self {
            Self::Creating(id) | Self::Updating(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Creating(_) => write!(f, "creating"),
            Self::Updating(_) => write!(f, "updating"),
            Self::Nothing => write!(f, "nothing"),
            Self::CreateInProgress => write!(f, "createinprogress"),
            Self::UpdateInProgress => write!(f, "updateinprogress"),
            Self::DeleteInProgress => write!(f, "deleteinprogress"),
        }
    }
}

/// Submits the request as an update, falling back to a create when the stack is missing.
///
/// Unrecognized rejections become [`DeployError::ProviderRejection`]; transport
/// failures from either call propagate unchanged.
pub async fn resolve_stack_command(
    provider: &dyn StackProvider,
    request: &StackRequest,
) -> Result<CommandStatus, DeployError> {
    let rejection = match provider.update_stack(request).await {
        Ok(id) => return Ok(CommandStatus::Updating(id)),
        Err(ProviderError::Rejected(rejection)) => rejection,
        Err(e) => return Err(e.into()),
    };

    debug!(code = %rejection.code, reason = %rejection.reason, "Update rejected");

    match rejection.code {
        RejectionCode::StackDoesNotExist => {
            info!(stack = %request.stack_name(), "Stack does not exist, creating");
            let id = provider.create_stack(request).await?;
            Ok(CommandStatus::Creating(id))
        }
        RejectionCode::NoUpdates => Ok(CommandStatus::Nothing),
        RejectionCode::CreateInProgress => Ok(CommandStatus::CreateInProgress),
        RejectionCode::UpdateInProgress => Ok(CommandStatus::UpdateInProgress),
        RejectionCode::DeleteInProgress => Ok(CommandStatus::DeleteInProgress),
        RejectionCode::Other => Err(DeployError::ProviderRejection(rejection)),
    }
}
