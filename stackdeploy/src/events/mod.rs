//! Progress reporting for running deployments.
//!
//! Reporters receive the resolved stack command and every in-progress poll.
//! They are the hook for terminal renderers, which live outside this crate.

mod reporter;

pub(crate) use reporter::{report_command, report_progress};
pub use reporter::{
    CallbackReporter, CollectingProgressReporter, LoggingProgressReporter,
    NoOpProgressReporter, ProgressEvent, ProgressReporter,
};
