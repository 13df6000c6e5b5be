//! The provider seam: everything the orchestrator asks of the cloud provider.
//!
//! This module provides:
//! - The [`StackProvider`] trait
//! - Rejection classification at the transport boundary
//! - [`AwsCliProvider`], which drives the provider CLI as a subprocess

mod aws_cli;
mod rejection;

pub use aws_cli::AwsCliProvider;
pub use rejection::{Rejection, RejectionCode};

use crate::core::{ResourceStatus, StackDescription, StackId, StackRequest, StackTarget};
use crate::errors::ProviderError;
use async_trait::async_trait;

/// Stack operations offered by a cloud provider.
///
/// Implementations translate provider refusals into
/// [`ProviderError::Rejected`] with a classified [`RejectionCode`], and every
/// other failure into [`ProviderError::Transport`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StackProvider: Send + Sync {
    /// Submits a create for a new stack.
    async fn create_stack(&self, request: &StackRequest) -> Result<StackId, ProviderError>;

    /// Submits an update for an existing stack.
    async fn update_stack(&self, request: &StackRequest) -> Result<StackId, ProviderError>;

    /// Fetches the current status, reason and outputs of a stack.
    async fn describe_stack(&self, target: &StackTarget)
        -> Result<StackDescription, ProviderError>;

    /// Fetches the status of every resource in a stack.
    async fn describe_resources(
        &self,
        target: &StackTarget,
    ) -> Result<Vec<ResourceStatus>, ProviderError>;
}
