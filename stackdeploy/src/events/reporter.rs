//! Progress reporter trait and implementations.

use crate::core::{ProgressSummary, ResourceStatus};
use crate::orchestrator::CommandStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, info, warn};

/// Receives progress while a deployment runs.
///
/// Reporters are purely observational; nothing they do affects control flow.
pub trait ProgressReporter: Send + Sync {
    /// Called once, after the create/update command was resolved.
    fn on_command(&self, stack_name: &str, status: &CommandStatus);

    /// Called once per in-progress poll, in increasing iteration order.
    fn on_progress(&self, resources: &[ResourceStatus], iteration: u32);
}

/// Forwards a resolved command to `reporter`; a panicking reporter is logged and suppressed.
pub(crate) fn report_command(
    reporter: &dyn ProgressReporter,
    stack_name: &str,
    status: &CommandStatus,
) {
    if let Err(e) = catch_unwind(AssertUnwindSafe(|| reporter.on_command(stack_name, status))) {
        warn!(stack = %stack_name, "Progress reporter panicked on command: {:?}", e);
    }
}

/// Forwards an in-progress poll to `reporter`; a panicking reporter is logged and suppressed.
pub(crate) fn report_progress(
    reporter: &dyn ProgressReporter,
    resources: &[ResourceStatus],
    iteration: u32,
) {
    if let Err(e) = catch_unwind(AssertUnwindSafe(|| reporter.on_progress(resources, iteration))) {
        warn!(iteration, "Progress reporter panicked on progress: {:?}", e);
    }
}

/// A reporter that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn on_command(&self, _stack_name: &str, _status: &CommandStatus) {}

    fn on_progress(&self, _resources: &[ResourceStatus], _iteration: u32) {}
}

/// A reporter that logs through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingProgressReporter;

impl ProgressReporter for LoggingProgressReporter {
    fn on_command(&self, stack_name: &str, status: &CommandStatus) {
        info!(stack = %stack_name, command = %status, "Stack command resolved");
    }

    fn on_progress(&self, resources: &[ResourceStatus], iteration: u32) {
        let summary = ProgressSummary::of(resources);
        info!(
            iteration,
            complete = summary.complete,
            in_progress = summary.in_progress,
            failed = summary.failed,
            "Deploying stack resources"
        );
        for resource in resources {
            debug!(
                logical_id = %resource.logical_id,
                resource_type = %resource.resource_type,
                status = %resource.raw_status,
                state = %resource.state(),
                "Resource status"
            );
        }
    }
}

/// Adapts a progress closure into a reporter. Command notifications are ignored.
pub struct CallbackReporter<F> {
    callback: F,
}

impl<F> CallbackReporter<F>
where
    F: Fn(&[ResourceStatus], u32) + Send + Sync,
{
    /// Wraps a closure.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> std::fmt::Debug for CallbackReporter<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackReporter").finish_non_exhaustive()
    }
}

impl<F> ProgressReporter for CallbackReporter<F>
where
    F: Fn(&[ResourceStatus], u32) + Send + Sync,
{
    fn on_command(&self, _stack_name: &str, _status: &CommandStatus) {}

    fn on_progress(&self, resources: &[ResourceStatus], iteration: u32) {
        (self.callback)(resources, iteration);
    }
}

/// One recorded reporter call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A resolved stack command.
    Command {
        /// Stack the command targets.
        stack_name: String,
        /// The resolved command.
        status: CommandStatus,
        /// When the command was reported.
        at: DateTime<Utc>,
    },
    /// An in-progress poll.
    Progress {
        /// Poll iteration, starting at 1.
        iteration: u32,
        /// Resource statuses at this poll.
        resources: Vec<ResourceStatus>,
        /// When the poll was reported.
        at: DateTime<Utc>,
    },
}

/// A collecting reporter for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingProgressReporter {
    events: parking_lot::RwLock<Vec<ProgressEvent>>,
}

impl CollectingProgressReporter {
    /// Creates a new collecting reporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.read().clone()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Returns the command statuses seen, in order.
    #[must_use]
    pub fn commands(&self) -> Vec<CommandStatus> {
        self.events
            .read()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Command { status, .. } => Some(status.clone()),
                ProgressEvent::Progress { .. } => None,
            })
            .collect()
    }

    /// Returns the iterations of every progress call, in order.
    #[must_use]
    pub fn iterations(&self) -> Vec<u32> {
        self.events
            .read()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Progress { iteration, .. } => Some(*iteration),
                ProgressEvent::Command { .. } => None,
            })
            .collect()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }
}

impl ProgressReporter for CollectingProgressReporter {
    fn on_command(&self, stack_name: &str, status: &CommandStatus) {
        self.events.write().push(ProgressEvent::Command {
            stack_name: stack_name.to_string(),
            status: status.clone(),
            at: Utc::now(),
        });
    }

    fn on_progress(&self, resources: &[ResourceStatus], iteration: u32) {
        self.events.write().push(ProgressEvent::Progress {
            iteration,
            resources: resources.to_vec(),
            at: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StackId;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn resources() -> Vec<ResourceStatus> {
        vec![ResourceStatus::new("Bucket", "CREATE_IN_PROGRESS", "AWS::S3::Bucket")]
    }

    #[test]
    fn test_noop_and_logging_reporters() {
        let status = CommandStatus::Nothing;
        NoOpProgressReporter.on_command("shop", &status);
        NoOpProgressReporter.on_progress(&resources(), 1);
        LoggingProgressReporter.on_command("shop", &status);
        LoggingProgressReporter.on_progress(&resources(), 1);
        // Should not panic
    }

    #[test]
    fn test_callback_reporter() {
        let last = AtomicU32::new(0);
        let reporter = CallbackReporter::new(|res: &[ResourceStatus], i| {
            assert_eq!(res.len(), 1);
            last.store(i, Ordering::SeqCst);
        });
        reporter.on_command("shop", &CommandStatus::Nothing);
        reporter.on_progress(&resources(), 4);
        assert_eq!(last.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_collecting_reporter() {
        let reporter = CollectingProgressReporter::new();
        assert!(reporter.is_empty());

        reporter.on_command("shop", &CommandStatus::Creating(StackId::new("arn:1")));
        reporter.on_progress(&resources(), 1);
        reporter.on_progress(&resources(), 2);

        assert_eq!(reporter.len(), 3);
        assert_eq!(
            reporter.commands(),
            vec![CommandStatus::Creating(StackId::new("arn:1"))]
        );
        assert_eq!(reporter.iterations(), vec![1, 2]);

        reporter.clear();
        assert!(reporter.is_empty());
    }

    #[test]
    fn test_panicking_reporter_is_contained() {
        let reporter = CallbackReporter::new(|_: &[ResourceStatus], _| panic!("renderer broke"));
        report_progress(&reporter, &resources(), 1);
        report_command(&reporter, "shop", &CommandStatus::Nothing);
    }

    #[test]
    fn test_progress_event_serializes_with_kind_tag() {
        let event = ProgressEvent::Progress {
            iteration: 3,
            resources: Vec::new(),
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "progress");
        assert_eq!(json["iteration"], 3);
    }
}
