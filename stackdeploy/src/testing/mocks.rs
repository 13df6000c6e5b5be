//! Scripted providers for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

use crate::core::{RawOutput, ResourceStatus, StackDescription, StackId, StackRequest, StackTarget};
use crate::errors::ProviderError;
use crate::provider::StackProvider;

#[derive(Debug, Default)]
struct Script {
    updates: VecDeque<Result<StackId, ProviderError>>,
    creates: VecDeque<Result<StackId, ProviderError>>,
    statuses: VecDeque<String>,
    last_status: Option<String>,
    reason: Option<String>,
    outputs: Vec<RawOutput>,
    resources: Vec<ResourceStatus>,
    describe_failure: Option<String>,
}

#[derive(Debug, Default)]
struct Calls {
    updates: usize,
    creates: usize,
    describes: Vec<Instant>,
    resources: usize,
    targets: Vec<StackTarget>,
}

/// A provider that replays a scripted sequence of stack statuses.
///
/// Updates and creates succeed with a synthetic id unless a result was queued.
/// Once the status script is down to its last entry, that status repeats.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    script: Mutex<Script>,
    calls: Mutex<Calls>,
}

impl ScriptedProvider {
    /// Creates a provider with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues raw statuses returned by successive describe calls.
    #[must_use]
    pub fn with_statuses<I, S>(self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.script
            .lock()
            .statuses
            .extend(statuses.into_iter().map(Into::into));
        self
    }

    /// Sets the status reason reported with every status.
    #[must_use]
    pub fn with_reason(self, reason: impl Into<String>) -> Self {
        self.script.lock().reason = Some(reason.into());
        self
    }

    /// Sets well-formed stack outputs.
    #[must_use]
    pub fn with_outputs<I, K, V>(self, outputs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.script
            .lock()
            .outputs
            .extend(outputs.into_iter().map(|(k, v)| RawOutput::new(k, v)));
        self
    }

    /// Adds an output record as the provider would return it, possibly incomplete.
    #[must_use]
    pub fn with_raw_output(self, output: RawOutput) -> Self {
        self.script.lock().outputs.push(output);
        self
    }

    /// Sets the resources returned by every resource query.
    #[must_use]
    pub fn with_resources(self, resources: Vec<ResourceStatus>) -> Self {
        self.script.lock().resources = resources;
        self
    }

    /// Makes every describe call fail at the transport level.
    #[must_use]
    pub fn with_describe_failure(self, message: impl Into<String>) -> Self {
        self.script.lock().describe_failure = Some(message.into());
        self
    }

    /// Queues a rejection for the next update call.
    #[must_use]
    pub fn with_update_rejection(self, reason: impl Into<String>) -> Self {
        self.script
            .lock()
            .updates
            .push_back(Err(ProviderError::rejected(reason)));
        self
    }

    /// Queues a transport failure for the next update call.
    #[must_use]
    pub fn with_update_failure(self, message: impl Into<String>) -> Self {
        self.script
            .lock()
            .updates
            .push_back(Err(ProviderError::transport("update-stack", message)));
        self
    }

    /// Queues a rejection for the next create call.
    #[must_use]
    pub fn with_create_rejection(self, reason: impl Into<String>) -> Self {
        self.script
            .lock()
            .creates
            .push_back(Err(ProviderError::rejected(reason)));
        self
    }

    /// Number of update calls made.
    #[must_use]
    pub fn update_count(&self) -> usize {
        self.calls.lock().updates
    }

    /// Number of create calls made.
    #[must_use]
    pub fn create_count(&self) -> usize {
        self.calls.lock().creates
    }

    /// Number of describe calls made.
    #[must_use]
    pub fn describe_count(&self) -> usize {
        self.calls.lock().describes.len()
    }

    /// Number of resource queries made.
    #[must_use]
    pub fn resources_count(&self) -> usize {
        self.calls.lock().resources
    }

    /// Elapsed time between consecutive describe calls.
    #[must_use]
    pub fn describe_gaps(&self) -> Vec<Duration> {
        self.calls
            .lock()
            .describes
            .windows(2)
            .map(|w| w[1] - w[0])
            .collect()
    }

    /// Every target passed to a describe call.
    #[must_use]
    pub fn described_targets(&self) -> Vec<StackTarget> {
        self.calls.lock().targets.clone()
    }

    fn next_status(&self) -> Option<String> {
        let mut script = self.script.lock();
        if let Some(status) = script.statuses.pop_front() {
            script.last_status = Some(status);
        }
        script.last_status.clone()
    }
}

#[async_trait]
impl StackProvider for ScriptedProvider {
    async fn create_stack(&self, request: &StackRequest) -> Result<StackId, ProviderError> {
        self.calls.lock().creates += 1;
        self.script.lock().creates.pop_front().unwrap_or_else(|| {
            Ok(StackId::new(format!(
                "arn:aws:cloudformation:{}:000000000000:stack/{}/created",
                request.region,
                request.stack_name()
            )))
        })
    }

    async fn update_stack(&self, request: &StackRequest) -> Result<StackId, ProviderError> {
        self.calls.lock().updates += 1;
        self.script.lock().updates.pop_front().unwrap_or_else(|| {
            Ok(StackId::new(format!(
                "arn:aws:cloudformation:{}:000000000000:stack/{}/updated",
                request.region,
                request.stack_name()
            )))
        })
    }

    async fn describe_stack(&self, target: &StackTarget) -> Result<StackDescription, ProviderError> {
        {
            let mut calls = self.calls.lock();
            calls.describes.push(Instant::now());
            calls.targets.push(target.clone());
        }

        if let Some(message) = self.script.lock().describe_failure.clone() {
            return Err(ProviderError::transport("describe-stacks", message));
        }

        let status = self.next_status().ok_or_else(|| {
            ProviderError::transport("describe-stacks", "no scripted status left")
        })?;

        let script = self.script.lock();
        let mut description = StackDescription::new(status);
        if let Some(reason) = &script.reason {
            description = description.with_reason(reason.clone());
        }
        for output in &script.outputs {
            description = description.with_raw_output(output.clone());
        }
        Ok(description)
    }

    async fn describe_resources(
        &self,
        _target: &StackTarget,
    ) -> Result<Vec<ResourceStatus>, ProviderError> {
        self.calls.lock().resources += 1;
        Ok(self.script.lock().resources.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> StackTarget {
        StackTarget::new("shop-app", "us-east-1")
    }

    #[tokio::test]
    async fn test_last_status_repeats() {
        let provider = ScriptedProvider::new().with_statuses(["A", "B"]);

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(provider.describe_stack(&target()).await.unwrap().status.to_string());
        }

        assert_eq!(seen, vec!["A", "B", "B"]);
        assert_eq!(provider.describe_count(), 3);
    }

    #[tokio::test]
    async fn test_empty_script_is_transport_error() {
        let provider = ScriptedProvider::new();
        let err = provider.describe_stack(&target()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Transport(_)));
    }

    #[tokio::test]
    async fn test_queued_update_results() {
        let provider = ScriptedProvider::new().with_update_rejection("No updates are to be performed.");
        let request = StackRequest::new("shop", "eu-west-1", "{}").with_stage("-dev");

        assert!(provider.update_stack(&request).await.is_err());
        let id = provider.update_stack(&request).await.unwrap();
        assert!(id.as_str().ends_with("stack/shop-dev/updated"));
        assert_eq!(provider.update_count(), 2);
    }
}
