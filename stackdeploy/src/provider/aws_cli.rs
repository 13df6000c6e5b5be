//! CloudFormation access through the `aws` command line tool.

use super::{RejectionCode, StackProvider};
use crate::config::CliSettings;
use crate::core::{
    RawOutput, ResourceStatus, StackDescription, StackId, StackRequest, StackStatus, StackTarget,
};
use crate::errors::ProviderError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Marker the CLI prints when the service itself answered with an error.
const SERVICE_ERROR_MARKER: &str = "An error occurred (";

/// A [`StackProvider`] that shells out to `aws cloudformation`.
#[derive(Debug, Clone)]
pub struct AwsCliProvider {
    binary: PathBuf,
    capabilities: Vec<String>,
    command_timeout: Option<Duration>,
}

impl Default for AwsCliProvider {
    fn default() -> Self {
        Self::new(&CliSettings::default())
    }
}

impl AwsCliProvider {
    /// Creates a provider from CLI settings.
    #[must_use]
    pub fn new(settings: &CliSettings) -> Self {
        Self {
            binary: settings.binary.clone(),
            capabilities: settings.capabilities.clone(),
            command_timeout: settings.timeout(),
        }
    }

    /// Sets the CLI binary path.
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Sets a per-command timeout.
    #[must_use]
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.command_timeout = Some(limit);
        self
    }

    fn mutation_args(&self, request: &StackRequest) -> Vec<String> {
        let mut args = vec![
            "--stack-name".to_string(),
            request.stack_name(),
            "--template-body".to_string(),
            request.template_body.clone(),
        ];
        if !self.capabilities.is_empty() {
            args.push("--capabilities".to_string());
            args.extend(self.capabilities.iter().cloned());
        }
        args.push("--region".to_string());
        args.push(request.region.clone());
        args
    }

    fn query_args(target: &StackTarget) -> Vec<String> {
        vec![
            "--stack-name".to_string(),
            target.name.clone(),
            "--region".to_string(),
            target.region.clone(),
        ]
    }

    async fn run(&self, operation: &str, args: Vec<String>) -> Result<Vec<u8>, ProviderError> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("cloudformation")
            .arg(operation)
            .args(&args)
            .arg("--output")
            .arg("json")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(binary = %self.binary.display(), operation, "Running provider CLI");

        let output = match self.command_timeout {
            Some(limit) => timeout(limit, cmd.output()).await.map_err(|_| {
                ProviderError::transport(
                    operation,
                    format!("timed out after {}s", limit.as_secs_f64()),
                )
            })?,
            None => cmd.output().await,
        }
        .map_err(|e| {
            ProviderError::transport(
                operation,
                format!("failed to run {}: {e}", self.binary.display()),
            )
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(classify_failure(operation, output.status.code(), stderr));
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl StackProvider for AwsCliProvider {
    async fn create_stack(&self, request: &StackRequest) -> Result<StackId, ProviderError> {
        let stdout = self.run("create-stack", self.mutation_args(request)).await?;
        let response: StackIdResponse = decode("create-stack", &stdout)?;
        Ok(StackId::new(response.stack_id))
    }

    async fn update_stack(&self, request: &StackRequest) -> Result<StackId, ProviderError> {
        let stdout = self.run("update-stack", self.mutation_args(request)).await?;
        let response: StackIdResponse = decode("update-stack", &stdout)?;
        Ok(StackId::new(response.stack_id))
    }

    async fn describe_stack(
        &self,
        target: &StackTarget,
    ) -> Result<StackDescription, ProviderError> {
        let stdout = self
            .run("describe-stacks", Self::query_args(target))
            .await
            .map_err(|e| {
                let missing = e
                    .as_rejection()
                    .is_some_and(|r| r.code == RejectionCode::StackDoesNotExist);
                if missing {
                    ProviderError::stack_not_found(&target.name)
                } else {
                    e
                }
            })?;
        parse_description(&target.name, &stdout)
    }

    async fn describe_resources(
        &self,
        target: &StackTarget,
    ) -> Result<Vec<ResourceStatus>, ProviderError> {
        let stdout = self
            .run("describe-stack-resources", Self::query_args(target))
            .await?;
        parse_resources(&stdout)
    }
}

/// Splits a failed invocation into a provider refusal or a transport failure.
fn classify_failure(operation: &str, code: Option<i32>, stderr: String) -> ProviderError {
    if stderr.contains(SERVICE_ERROR_MARKER) {
        return ProviderError::rejected(stderr);
    }
    let exit = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
    warn!(operation, exit = %exit, "Provider CLI failed without a service error");
    if stderr.is_empty() {
        ProviderError::transport(operation, format!("exited with {exit}"))
    } else {
        ProviderError::transport(operation, format!("exited with {exit}: {stderr}"))
    }
}

fn decode<T: DeserializeOwned>(operation: &str, stdout: &[u8]) -> Result<T, ProviderError> {
    serde_json::from_slice(stdout).map_err(|e| {
        ProviderError::transport(operation, format!("unreadable CLI output: {e}"))
    })
}

fn parse_description(name: &str, stdout: &[u8]) -> Result<StackDescription, ProviderError> {
    let response: DescribeStacksResponse = decode("describe-stacks", stdout)?;
    let stack = response
        .stacks
        .unwrap_or_default()
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::stack_not_found(name))?;

    Ok(StackDescription {
        status: StackStatus::from(stack.stack_status),
        status_reason: stack.stack_status_reason,
        outputs: stack
            .outputs
            .unwrap_or_default()
            .into_iter()
            .map(|o| RawOutput {
                key: o.output_key,
                value: o.output_value,
            })
            .collect(),
    })
}

fn parse_resources(stdout: &[u8]) -> Result<Vec<ResourceStatus>, ProviderError> {
    let response: DescribeResourcesResponse = decode("describe-stack-resources", stdout)?;
    let resources = response.stack_resources.ok_or_else(|| {
        ProviderError::transport("describe-stack-resources", "No stack resources found")
    })?;
    Ok(resources
        .into_iter()
        .map(|r| ResourceStatus::new(r.logical_resource_id, r.resource_status, r.resource_type))
        .collect())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StackIdResponse {
    stack_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeStacksResponse {
    stacks: Option<Vec<WireStack>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireStack {
    stack_status: String,
    #[serde(default)]
    stack_status_reason: Option<String>,
    #[serde(default)]
    outputs: Option<Vec<WireOutput>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireOutput {
    #[serde(default)]
    output_key: Option<String>,
    #[serde(default)]
    output_value: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeResourcesResponse {
    stack_resources: Option<Vec<WireResource>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireResource {
    logical_resource_id: String,
    resource_status: String,
    resource_type: String,
}
