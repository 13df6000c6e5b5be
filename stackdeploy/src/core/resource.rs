//! Per-resource status, used only for progress reporting.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The status of one physical resource inside a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceStatus {
    /// Logical id from the template.
    pub logical_id: String,
    /// Raw provider status (e.g. "CREATE_COMPLETE").
    pub raw_status: String,
    /// Provider resource type (e.g. "AWS::S3::Bucket").
    pub resource_type: String,
}

impl ResourceStatus {
    /// Creates a new resource status.
    #[must_use]
    pub fn new(
        logical_id: impl Into<String>,
        raw_status: impl Into<String>,
        resource_type: impl Into<String>,
    ) -> Self {
        Self {
            logical_id: logical_id.into(),
            raw_status: raw_status.into(),
            resource_type: resource_type.into(),
        }
    }

    /// Coarse state for display.
    #[must_use]
    pub fn state(&self) -> ResourceState {
        ResourceState::of(&self.raw_status)
    }
}

/// Coarse display state of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    /// The resource finished.
    Complete,
    /// The resource failed or is rolling back.
    Failed,
    /// The provider is still working on the resource.
    InProgress,
}

impl ResourceState {
    /// Derives a state from a raw resource status.
    ///
    /// `COMPLETE` wins over `ROLLBACK`, so `UPDATE_ROLLBACK_COMPLETE` reads as complete.
    #[must_use]
    pub fn of(raw_status: &str) -> Self {
        if raw_status.contains("COMPLETE") {
            Self::Complete
        } else if raw_status.contains("FAILED") || raw_status.contains("ROLLBACK") {
            Self::Failed
        } else {
            Self::InProgress
        }
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete => write!(f, "complete"),
            Self::Failed => write!(f, "failed"),
            Self::InProgress => write!(f, "in_progress"),
        }
    }
}

/// Counts of resources per state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSummary {
    /// Resources in a complete state.
    pub complete: usize,
    /// Resources failed or rolling back.
    pub failed: usize,
    /// Resources still changing.
    pub in_progress: usize,
}

impl ProgressSummary {
    /// Summarizes a resource list.
    #[must_use]
    pub fn of(resources: &[ResourceStatus]) -> Self {
        resources
            .iter()
            .fold(Self::default(), |mut acc, resource| {
                match resource.state() {
                    ResourceState::Complete => acc.complete += 1,
                    ResourceState::Failed => acc.failed += 1,
                    ResourceState::InProgress => acc.in_progress += 1,
                }
                acc
            })
    }

    /// Total resources counted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.complete + self.failed + self.in_progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_state() {
        assert_eq!(ResourceState::of("CREATE_COMPLETE"), ResourceState::Complete);
        assert_eq!(ResourceState::of("UPDATE_ROLLBACK_COMPLETE"), ResourceState::Complete);
        assert_eq!(ResourceState::of("CREATE_FAILED"), ResourceState::Failed);
        assert_eq!(ResourceState::of("ROLLBACK_IN_PROGRESS"), ResourceState::Failed);
        assert_eq!(ResourceState::of("CREATE_IN_PROGRESS"), ResourceState::InProgress);
    }

    #[test]
    fn test_progress_summary() {
        let resources = vec![
            ResourceStatus::new("Bucket", "CREATE_COMPLETE", "AWS::S3::Bucket"),
            ResourceStatus::new("Fn", "CREATE_IN_PROGRESS", "AWS::Lambda::Function"),
            ResourceStatus::new("Role", "CREATE_IN_PROGRESS", "AWS::IAM::Role"),
            ResourceStatus::new("Api", "CREATE_FAILED", "AWS::ApiGatewayV2::Api"),
        ];
        let summary = ProgressSummary::of(&resources);
        assert_eq!(summary.complete, 1);
        assert_eq!(summary.in_progress, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total(), 4);
    }
}
