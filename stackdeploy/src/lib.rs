//! # Stackdeploy
//!
//! Deploys a CloudFormation template as a named stack and waits for it to settle.
//!
//! A deployment runs in three steps:
//!
//! - **Command resolution**: submit an update, falling back to a create when the
//!   stack does not exist yet
//! - **Polling**: query the stack status with bounded exponential backoff until it
//!   reaches a terminal state, reporting resource progress along the way
//! - **Output extraction**: project the finished stack's outputs onto the keys the
//!   caller asked for
//!
//! Every outcome, including provider failures, comes back as a single
//! [`DeploymentResult`](orchestrator::DeploymentResult) envelope.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stackdeploy::prelude::*;
//! use std::sync::Arc;
//!
//! let config = DeployConfig::from_env();
//! let provider = Arc::new(AwsCliProvider::new(&config.cli));
//! let orchestrator = DeploymentOrchestrator::new(provider)
//!     .with_reporter(Arc::new(LoggingProgressReporter));
//!
//! let request = StackRequest::new("shop-app", &config.region, template).with_stage("-dev");
//! let poll = config.poll.for_stack(request.stack_name());
//! let result = orchestrator.deploy(&request, &poll, &["Url".to_string()]).await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod orchestrator;
pub mod provider;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{CliSettings, DeployConfig, PollSettings, DEFAULT_REGION};
    pub use crate::core::{
        classify, Outcome, OutputEntry, ResourceStatus, StackDescription, StackId,
        StackRequest, StackStatus, StackTarget,
    };
    pub use crate::errors::{ConfigError, DeployError, MalformedOutputError, ProviderError};
    pub use crate::events::{
        CallbackReporter, LoggingProgressReporter, NoOpProgressReporter, ProgressReporter,
    };
    pub use crate::observability::{init_logging, LogFormat};
    pub use crate::orchestrator::{
        DeploymentOrchestrator, DeploymentResult, DeploymentStatus, OutputValue, PollConfig,
    };
    pub use crate::provider::{AwsCliProvider, RejectionCode, StackProvider};
}
