//! Status polling with bounded exponential backoff.

use crate::cancellation::CancellationToken;
use crate::config::PollSettings;
use crate::core::{OutputEntry, Outcome, StackDescription, StackTarget};
use crate::errors::{ConfigError, DeployError};
use crate::events::{report_progress, ProgressReporter};
use crate::provider::StackProvider;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Message used when the stack is in a status outside the known vocabulary.
pub const UNKNOWN_STATE_MESSAGE: &str = "Cloudformation is in an unknown state";

/// Polling parameters for one stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Stack being polled.
    pub stack_name: String,
    /// First wait between status queries.
    pub min_retry_interval: Duration,
    /// Cap on the wait between status queries.
    pub max_retry_interval: Duration,
    /// Growth factor applied after each in-progress poll.
    pub backoff_rate: f64,
    /// Status queries before giving up.
    pub max_retries: u32,
}

impl PollConfig {
    /// Creates a config with default polling settings.
    #[must_use]
    pub fn new(stack_name: impl Into<String>) -> Self {
        PollSettings::default().for_stack(stack_name)
    }

    /// Sets the interval bounds.
    #[must_use]
    pub fn with_intervals(mut self, min: Duration, max: Duration) -> Self {
        self.min_retry_interval = min;
        self.max_retry_interval = max;
        self
    }

    /// Sets the backoff rate.
    #[must_use]
    pub fn with_backoff_rate(mut self, rate: f64) -> Self {
        self.backoff_rate = rate;
        self
    }

    /// Sets the maximum number of status queries.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Checks `min <= max`, `backoff_rate >= 1` and `max_retries > 0`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_retry_interval > self.max_retry_interval {
            return Err(ConfigError::InvalidPoll(format!(
                "min_retry_interval ({:?}) must be <= max_retry_interval ({:?})",
                self.min_retry_interval, self.max_retry_interval
            )));
        }
        if !self.backoff_rate.is_finite() || self.backoff_rate < 1.0 {
            return Err(ConfigError::InvalidPoll(format!(
                "backoff_rate ({}) must be a finite number >= 1",
                self.backoff_rate
            )));
        }
        if self.max_retries == 0 {
            return Err(ConfigError::InvalidPoll(
                "max_retries must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// The wait schedule this config produces.
    #[must_use]
    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.min_retry_interval, self.max_retry_interval, self.backoff_rate)
    }
}

/// Geometric wait schedule, clamped at a maximum and rounded to whole milliseconds.
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
    max: Duration,
    rate: f64,
}

impl Backoff {
    /// Creates a schedule starting at `min`.
    #[must_use]
    pub fn new(min: Duration, max: Duration, rate: f64) -> Self {
        Self {
            current: min.min(max),
            max,
            rate,
        }
    }

    /// The wait the next call to [`Backoff::advance`] returns.
    #[must_use]
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Returns the current wait and grows the schedule.
    pub fn advance(&mut self) -> Duration {
        let wait = self.current;
        #[allow(clippy::cast_precision_loss)]
        let grown = (wait.as_millis() as f64 * self.rate).round();
        #[allow(clippy::cast_precision_loss)]
        let max_ms = self.max.as_millis() as f64;
        self.current = if grown >= max_ms {
            self.max
        } else {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let next = Duration::from_millis(grown as u64);
            next.max(wait)
        };
        wait
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        Some(self.advance())
    }
}

/// How a poll loop ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TerminalResult {
    /// The query budget ran out while the stack was still changing.
    StillInProgress,
    /// The stack failed.
    Failed {
        /// The provider's reason.
        message: String,
    },
    /// The stack rolled back.
    RolledBack {
        /// The provider's reason.
        message: String,
        /// Outputs of the rolled back stack.
        outputs: Vec<OutputEntry>,
    },
    /// The stack reached a complete state.
    Succeeded {
        /// Outputs of the finished stack.
        outputs: Vec<OutputEntry>,
    },
    /// The caller cancelled the deployment.
    Cancelled {
        /// The first cancellation reason.
        reason: String,
    },
}

impl TerminalResult {
    /// Returns true for [`TerminalResult::Succeeded`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// Polls `target` until it reaches a terminal status or the query budget is spent.
///
/// Iterations count from 1. The status query at iteration `max_retries` always
/// yields [`TerminalResult::StillInProgress`], so at most `max_retries` status
/// queries are made. Every in-progress poll before that reports resources to
/// `reporter`, then waits the current backoff interval.
pub async fn poll_stack(
    provider: &dyn StackProvider,
    target: &StackTarget,
    config: &PollConfig,
    reporter: &dyn ProgressReporter,
    cancel: &CancellationToken,
) -> Result<TerminalResult, DeployError> {
    config.validate()?;

    let mut backoff = config.backoff();
    let mut iteration: u32 = 1;

    loop {
        if cancel.is_cancelled() {
            return Ok(cancelled(cancel));
        }

        let description = provider.describe_stack(target).await?;
        let outcome = description.status.outcome();
        debug!(
            stack = %target.name,
            iteration,
            raw_status = %description.status,
            outcome = %outcome,
            "Polled stack status"
        );

        if iteration >= config.max_retries {
            warn!(
                stack = %target.name,
                max_retries = config.max_retries,
                raw_status = %description.status,
                "Gave up waiting for stack"
            );
            return Ok(TerminalResult::StillInProgress);
        }

        match outcome {
            Outcome::InProgress => {
                let resources = provider.describe_resources(target).await?;
                report_progress(reporter, &resources, iteration);

                let wait = backoff.advance();
                debug!(stack = %target.name, iteration, interval_ms = wait.as_millis() as u64, "Waiting before next poll");
                tokio::select! {
                    () = tokio::time::sleep(wait) => {}
                    () = cancel.cancelled() => return Ok(cancelled(cancel)),
                }
                iteration += 1;
            }
            Outcome::Fail => {
                let message = failure_message(&description);
                info!(stack = %target.name, raw_status = %description.status, %message, "Stack failed");
                return Ok(TerminalResult::Failed { message });
            }
            Outcome::Rollback => {
                let outputs = description.validated_outputs()?;
                let message = reason_or_unknown(&description);
                info!(stack = %target.name, raw_status = %description.status, %message, "Stack rolled back");
                return Ok(TerminalResult::RolledBack { message, outputs });
            }
            Outcome::Success => {
                let outputs = description.validated_outputs()?;
                info!(stack = %target.name, raw_status = %description.status, iteration, "Stack complete");
                return Ok(TerminalResult::Succeeded { outputs });
            }
        }
    }
}

fn reason_or_unknown(description: &StackDescription) -> String {
    description
        .status_reason
        .clone()
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Reason text, or the unknown-state message when the status itself was not recognized.
fn failure_message(description: &StackDescription) -> String {
    match description.status_reason.as_deref() {
        Some(reason) if !reason.is_empty() => reason.to_string(),
        _ if description.status.is_unknown() => UNKNOWN_STATE_MESSAGE.to_string(),
        _ => "unknown".to_string(),
    }
}

fn cancelled(cancel: &CancellationToken) -> TerminalResult {
    TerminalResult::Cancelled {
        reason: cancel.reason().unwrap_or_else(|| "cancelled".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{RawOutput, ResourceStatus};
    use crate::events::{CollectingProgressReporter, NoOpProgressReporter};
    use crate::testing::ScriptedProvider;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn target() -> StackTarget {
        StackTarget::new("shop-app", "us-east-1")
    }

    fn fast_config() -> PollConfig {
        PollConfig::new("shop-app").with_intervals(ms(10), ms(40)).with_backoff_rate(2.0)
    }

    #[test]
    fn test_backoff_schedule() {
        let intervals: Vec<u64> = Backoff::new(ms(5000), ms(10000), 1.1)
            .take(10)
            .map(|d| d.as_millis() as u64)
            .collect();

        assert_eq!(&intervals[..3], &[5000, 5500, 6050]);
        assert!(intervals.windows(2).all(|w| w[0] <= w[1]));
        assert!(intervals.iter().all(|&i| i <= 10000));
        assert_eq!(*intervals.last().unwrap(), 10000);
    }

    #[test]
    fn test_backoff_rate_one_is_constant() {
        let mut backoff = Backoff::new(ms(250), ms(1000), 1.0);
        assert_eq!(backoff.advance(), ms(250));
        assert_eq!(backoff.advance(), ms(250));
        assert_eq!(backoff.current(), ms(250));
    }

    #[test]
    fn test_config_validation() {
        assert!(PollConfig::new("s").validate().is_ok());
        assert!(PollConfig::new("s").with_intervals(ms(2), ms(1)).validate().is_err());
        assert!(PollConfig::new("s").with_backoff_rate(0.5).validate().is_err());
        assert!(PollConfig::new("s").with_backoff_rate(f64::INFINITY).validate().is_err());
        assert!(PollConfig::new("s").with_max_retries(0).validate().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let provider = ScriptedProvider::new().with_statuses([
            "UPDATE_IN_PROGRESS",
            "UPDATE_IN_PROGRESS",
            "UPDATE_IN_PROGRESS",
            "UPDATE_COMPLETE",
        ]);
        let reporter = CollectingProgressReporter::new();
        let config = fast_config().with_max_retries(3);

        let result = poll_stack(&provider, &target(), &config, &reporter, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result, TerminalResult::StillInProgress);
        assert_eq!(provider.describe_count(), 3);
        assert_eq!(reporter.iterations(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_iteration_wins_over_success() {
        let provider = ScriptedProvider::new().with_statuses(["CREATE_COMPLETE"]);
        let config = fast_config().with_max_retries(1);

        let result = poll_stack(&provider, &target(), &config, &NoOpProgressReporter, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result, TerminalResult::StillInProgress);
        assert_eq!(provider.describe_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_follow_backoff() {
        let provider = ScriptedProvider::new().with_statuses([
            "CREATE_IN_PROGRESS",
            "CREATE_IN_PROGRESS",
            "CREATE_IN_PROGRESS",
            "CREATE_IN_PROGRESS",
            "CREATE_COMPLETE",
        ]);
        let config = PollConfig::new("shop-app")
            .with_intervals(ms(5000), ms(6000))
            .with_backoff_rate(1.1);

        let result = poll_stack(&provider, &target(), &config, &NoOpProgressReporter, &CancellationToken::new())
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(provider.describe_gaps(), vec![ms(5000), ms(5500), ms(6000), ms(6000)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_carries_outputs() {
        let provider = ScriptedProvider::new()
            .with_statuses(["UPDATE_IN_PROGRESS", "UPDATE_COMPLETE"])
            .with_outputs([("Url", "http://x")])
            .with_resources(vec![ResourceStatus::new("Fn", "UPDATE_IN_PROGRESS", "AWS::Lambda::Function")]);
        let reporter = CollectingProgressReporter::new();

        let result = poll_stack(&provider, &target(), &fast_config(), &reporter, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            result,
            TerminalResult::Succeeded { outputs: vec![OutputEntry::new("Url", "http://x")] }
        );
        assert_eq!(reporter.iterations(), vec![1]);
        assert_eq!(provider.resources_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_carries_reason() {
        let provider = ScriptedProvider::new()
            .with_statuses(["CREATE_FAILED"])
            .with_reason("Bucket already exists");

        let result = poll_stack(&provider, &target(), &fast_config(), &NoOpProgressReporter, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result, TerminalResult::Failed { message: "Bucket already exists".into() });
        assert_eq!(provider.resources_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_without_reason_is_unknown() {
        let provider = ScriptedProvider::new().with_statuses(["UPDATE_ROLLBACK_FAILED"]);

        let result = poll_stack(&provider, &target(), &fast_config(), &NoOpProgressReporter, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result, TerminalResult::Failed { message: "unknown".into() });
    }

    #[tokio::test]
    async fn test_unrecognized_status_fails_with_unknown_state() {
        let provider = ScriptedProvider::new().with_statuses(["BRAND_NEW_STATE"]);

        let result = poll_stack(&provider, &target(), &fast_config(), &NoOpProgressReporter, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result, TerminalResult::Failed { message: UNKNOWN_STATE_MESSAGE.into() });
    }

    #[tokio::test]
    async fn test_rollback_carries_outputs() {
        let provider = ScriptedProvider::new()
            .with_statuses(["ROLLBACK_COMPLETE"])
            .with_outputs([("Bucket", "b-1")]);

        let result = poll_stack(&provider, &target(), &fast_config(), &NoOpProgressReporter, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            result,
            TerminalResult::RolledBack {
                message: "unknown".into(),
                outputs: vec![OutputEntry::new("Bucket", "b-1")],
            }
        );
    }

    #[tokio::test]
    async fn test_malformed_output_is_error() {
        let provider = ScriptedProvider::new()
            .with_statuses(["CREATE_COMPLETE"])
            .with_raw_output(RawOutput { key: Some("Url".into()), value: None });

        let err = poll_stack(&provider, &target(), &fast_config(), &NoOpProgressReporter, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::MalformedOutput(_)));
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected_before_querying() {
        let provider = ScriptedProvider::new().with_statuses(["CREATE_COMPLETE"]);
        let config = fast_config().with_max_retries(0);

        let err = poll_stack(&provider, &target(), &config, &NoOpProgressReporter, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::InvalidConfig(_)));
        assert_eq!(provider.describe_count(), 0);
    }

    #[tokio::test]
    async fn test_transport_error_is_not_retried() {
        let provider = ScriptedProvider::new().with_describe_failure("connection reset");

        let err = poll_stack(&provider, &target(), &fast_config(), &NoOpProgressReporter, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::Transport(_)));
        assert_eq!(provider.describe_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_wait() {
        let provider = Arc::new(ScriptedProvider::new().with_statuses(["CREATE_IN_PROGRESS"]));
        let cancel = Arc::new(CancellationToken::new());
        let config = PollConfig::new("shop-app").with_intervals(ms(60_000), ms(60_000));

        let task = {
            let provider = provider.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                poll_stack(provider.as_ref(), &target(), &config, &NoOpProgressReporter, &cancel).await
            })
        };

        tokio::time::sleep(ms(1000)).await;
        cancel.cancel("user abort");

        let result = task.await.unwrap().unwrap();
        assert_eq!(result, TerminalResult::Cancelled { reason: "user abort".into() });
        assert_eq!(provider.describe_count(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_query() {
        let provider = ScriptedProvider::new().with_statuses(["CREATE_COMPLETE"]);
        let cancel = CancellationToken::new();
        cancel.cancel("stop");

        let result = poll_stack(&provider, &target(), &fast_config(), &NoOpProgressReporter, &cancel)
            .await
            .unwrap();

        assert_eq!(result, TerminalResult::Cancelled { reason: "stop".into() });
        assert_eq!(provider.describe_count(), 0);
    }
}
