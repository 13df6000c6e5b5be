//! Deployment orchestration and the result envelope.

use super::outputs::{extract_outputs, ExtractedOutputs, OutputValue};
use super::polling::{poll_stack, PollConfig, TerminalResult};
use super::resolver::resolve_stack_command;
use crate::cancellation::CancellationToken;
use crate::core::StackRequest;
use crate::errors::{ConfigError, DeployError};
use crate::events::{report_command, NoOpProgressReporter, ProgressReporter};
use crate::provider::StackProvider;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

/// Message of a successful deployment.
pub const DEPLOYED_MESSAGE: &str = "Template deployed successfully";
/// Message when the stack rolled back.
pub const ROLLED_BACK_MESSAGE: &str = "Deployment has been rolled back";
/// Message when polling gave up.
pub const STILL_IN_PROGRESS_MESSAGE: &str = "Deployment is still in progress";
/// Message when the caller cancelled.
pub const CANCELLED_MESSAGE: &str = "Deployment was cancelled";

/// Envelope status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    /// The stack reached a complete state.
    Ok,
    /// Anything else.
    Error,
}

/// The only value a deployment hands back to its caller.
///
/// `outputs` is empty whenever `status` is [`DeploymentStatus::Error`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentResult {
    /// Overall status.
    pub status: DeploymentStatus,
    /// Human readable outcome.
    pub message: String,
    /// Requested outputs; missing ones serialize as `false`.
    pub outputs: ExtractedOutputs,
}

impl DeploymentResult {
    /// Creates a successful result.
    #[must_use]
    pub fn ok(outputs: ExtractedOutputs) -> Self {
        Self {
            status: DeploymentStatus::Ok,
            message: DEPLOYED_MESSAGE.to_string(),
            outputs,
        }
    }

    /// Creates an error result with no outputs.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: DeploymentStatus::Error,
            message: message.into(),
            outputs: ExtractedOutputs::new(),
        }
    }

    /// Returns true when the deployment succeeded.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == DeploymentStatus::Ok
    }

    /// Looks up a requested output.
    #[must_use]
    pub fn output(&self, key: &str) -> Option<&OutputValue> {
        self.outputs.get(key)
    }
}

/// Drives one stack from template submission to a terminal state.
///
/// The orchestrator holds no per-deployment state and may run several
/// deployments concurrently.
#[derive(Clone)]
pub struct DeploymentOrchestrator {
    provider: Arc<dyn StackProvider>,
    reporter: Arc<dyn ProgressReporter>,
}

impl DeploymentOrchestrator {
    /// Creates an orchestrator that reports nothing.
    #[must_use]
    pub fn new(provider: Arc<dyn StackProvider>) -> Self {
        Self {
            provider,
            reporter: Arc::new(NoOpProgressReporter),
        }
    }

    /// Sets the progress reporter.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Deploys `request` and waits for the stack to settle.
    ///
    /// Never fails: every error is logged and folded into an error envelope.
    pub async fn deploy(
        &self,
        request: &StackRequest,
        poll: &PollConfig,
        requested_outputs: &[String],
    ) -> DeploymentResult {
        self.deploy_with_cancellation(request, poll, requested_outputs, &CancellationToken::new())
            .await
    }

    /// Like [`DeploymentOrchestrator::deploy`], stopping early once `cancel` fires.
    pub async fn deploy_with_cancellation(
        &self,
        request: &StackRequest,
        poll: &PollConfig,
        requested_outputs: &[String],
        cancel: &CancellationToken,
    ) -> DeploymentResult {
        let span = info_span!(
            "deployment",
            deployment_id = %Uuid::new_v4(),
            stack = %request.stack_name(),
            region = %request.region,
            template_sha256 = %request.template_fingerprint(),
        );

        async {
            let start = Instant::now();
            let result = match self.try_deploy(request, poll, requested_outputs, cancel).await {
                Ok(result) => result,
                Err(e) => {
                    error!(kind = e.kind(), error = %e, "Deployment failed");
                    DeploymentResult::error(e.to_string())
                }
            };
            info!(
                status = ?result.status,
                message = %result.message,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Deployment finished"
            );
            result
        }
        .instrument(span)
        .await
    }

    async fn try_deploy(
        &self,
        request: &StackRequest,
        poll: &PollConfig,
        requested_outputs: &[String],
        cancel: &CancellationToken,
    ) -> Result<DeploymentResult, DeployError> {
        let stack_name = request.stack_name();
        if poll.stack_name != stack_name {
            return Err(ConfigError::InvalidPoll(format!(
                "poll config targets stack {} but the request deploys {}",
                poll.stack_name, stack_name
            ))
            .into());
        }
        poll.validate()?;

        let command = resolve_stack_command(self.provider.as_ref(), request).await?;
        report_command(self.reporter.as_ref(), &stack_name, &command);

        let target = request.target();
        let terminal = poll_stack(
            self.provider.as_ref(),
            &target,
            poll,
            self.reporter.as_ref(),
            cancel,
        )
        .await?;

        let result = match terminal {
            TerminalResult::StillInProgress => DeploymentResult::error(STILL_IN_PROGRESS_MESSAGE),
            TerminalResult::Failed { message } => DeploymentResult::error(message),
            TerminalResult::RolledBack { message, .. } => {
                info!(reason = %message, "Stack rolled back");
                DeploymentResult::error(ROLLED_BACK_MESSAGE)
            }
            TerminalResult::Cancelled { reason } => {
                info!(%reason, "Deployment cancelled");
                DeploymentResult::error(CANCELLED_MESSAGE)
            }
            TerminalResult::Succeeded { .. } if requested_outputs.is_empty() => {
                DeploymentResult::ok(ExtractedOutputs::new())
            }
            TerminalResult::Succeeded { .. } => {
                let description = self.provider.describe_stack(&target).await?;
                let outputs = description.validated_outputs()?;
                DeploymentResult::ok(extract_outputs(&outputs, requested_outputs))
            }
        };

        Ok(result)
    }
}

impl std::fmt::Debug for DeploymentOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentOrchestrator").finish_non_exhaustive()
    }
}
