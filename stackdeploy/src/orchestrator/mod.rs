//! Deployment orchestration.
//!
//! This module provides:
//! - Create-or-update resolution ([`resolve_stack_command`])
//! - Status polling with bounded backoff ([`poll_stack`])
//! - Output projection ([`extract_outputs`])
//! - The [`DeploymentOrchestrator`] and its [`DeploymentResult`] envelope

mod deploy;
mod outputs;
mod polling;
mod resolver;


pub use deploy::{
    DeploymentOrchestrator, DeploymentResult, DeploymentStatus, CANCELLED_MESSAGE,
    DEPLOYED_MESSAGE, ROLLED_BACK_MESSAGE, STILL_IN_PROGRESS_MESSAGE,
};
pub use outputs::{extract_outputs, ExtractedOutputs, OutputValue};
pub use polling::{poll_stack, Backoff, PollConfig, TerminalResult, UNKNOWN_STATE_MESSAGE};
pub use resolver::{resolve_stack_command, CommandStatus};
