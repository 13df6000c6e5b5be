//! Deployment configuration.
//!
//! Configuration is an explicit value. The environment is read only by
//! [`DeployConfig::from_env`], which callers invoke at the application edge.

use crate::errors::ConfigError;
use crate::orchestrator::PollConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Region used when none is configured.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Top-level deployment configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Provider region.
    #[serde(default = "default_region")]
    pub region: String,
    /// Status polling settings.
    #[serde(default)]
    pub poll: PollSettings,
    /// Provider CLI settings.
    #[serde(default)]
    pub cli: CliSettings,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            poll: PollSettings::default(),
            cli: CliSettings::default(),
        }
    }
}

impl DeployConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, with the region taken from `AWS_REGION` when set.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(region) = std::env::var("AWS_REGION") {
            if !region.trim().is_empty() {
                config.region = region.trim().to_string();
            }
        }
        config
    }

    /// Parses a JSON document. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.poll.validate()?;
        config.cli.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&contents)
    }

    /// Sets the region.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Sets the poll settings.
    #[must_use]
    pub fn with_poll(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    /// Sets the CLI settings.
    #[must_use]
    pub fn with_cli(mut self, cli: CliSettings) -> Self {
        self.cli = cli;
        self
    }
}

/// Polling settings shared by every stack deployed with one config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollSettings {
    /// First wait between status queries, in milliseconds.
    #[serde(default = "default_min_retry_interval_ms")]
    pub min_retry_interval_ms: u64,
    /// Cap on the wait between status queries, in milliseconds.
    #[serde(default = "default_max_retry_interval_ms")]
    pub max_retry_interval_ms: u64,
    /// Growth factor applied to the wait after each in-progress poll.
    #[serde(default = "default_backoff_rate")]
    pub backoff_rate: f64,
    /// Status queries before giving up.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_min_retry_interval_ms() -> u64 {
    5000
}

fn default_max_retry_interval_ms() -> u64 {
    10000
}

fn default_backoff_rate() -> f64 {
    1.1
}

fn default_max_retries() -> u32 {
    200
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            min_retry_interval_ms: default_min_retry_interval_ms(),
            max_retry_interval_ms: default_max_retry_interval_ms(),
            backoff_rate: default_backoff_rate(),
            max_retries: default_max_retries(),
        }
    }
}

impl PollSettings {
    /// Creates settings with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the interval bounds in milliseconds.
    #[must_use]
    pub fn with_intervals_ms(mut self, min: u64, max: u64) -> Self {
        self.min_retry_interval_ms = min;
        self.max_retry_interval_ms = max;
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

    /// Checks the polling invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_retry_interval_ms > self.max_retry_interval_ms {
            return Err(ConfigError::InvalidPoll(format!(
                "min_retry_interval_ms ({}) must be <= max_retry_interval_ms ({})",
                self.min_retry_interval_ms, self.max_retry_interval_ms
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

    /// Binds these settings to a stack.
    #[must_use]
    pub fn for_stack(&self, stack_name: impl Into<String>) -> PollConfig {
        PollConfig {
            stack_name: stack_name.into(),
            min_retry_interval: Duration::from_millis(self.min_retry_interval_ms),
            max_retry_interval: Duration::from_millis(self.max_retry_interval_ms),
            backoff_rate: self.backoff_rate,
            max_retries: self.max_retries,
        }
    }
}

/// Settings for [`AwsCliProvider`](crate::provider::AwsCliProvider).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliSettings {
    /// Path or name of the CLI binary.
    #[serde(default = "default_binary")]
    pub binary: PathBuf,
    /// Capabilities acknowledged on create and update.
    #[serde(default = "default_capabilities")]
    pub capabilities: Vec<String>,
    /// Per-command timeout in seconds. No timeout when unset.
    #[serde(default)]
    pub timeout_seconds: Option<f64>,
}

fn default_binary() -> PathBuf {
    PathBuf::from("aws")
}

fn default_capabilities() -> Vec<String> {
    vec![
        "CAPABILITY_IAM".to_string(),
        "CAPABILITY_AUTO_EXPAND".to_string(),
        "CAPABILITY_NAMED_IAM".to_string(),
    ]
}

impl Default for CliSettings {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            capabilities: default_capabilities(),
            timeout_seconds: None,
        }
    }
}

impl CliSettings {
    /// Gets the timeout as a Duration, ignoring non-positive and unrepresentable values.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds
            .filter(|s| *s > 0.0)
            .and_then(|s| Duration::try_from_secs_f64(s).ok())
    }

    /// Checks that a configured timeout is either non-positive or a valid duration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.timeout_seconds {
            Some(s) if s.is_nan() || (s > 0.0 && Duration::try_from_secs_f64(s).is_err()) => {
                Err(ConfigError::InvalidCli(format!(
                    "timeout_seconds ({s}) is not a representable duration"
                )))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = DeployConfig::default();
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.poll.min_retry_interval_ms, 5000);
        assert_eq!(config.poll.max_retry_interval_ms, 10000);
        assert!((config.poll.backoff_rate - 1.1).abs() < f64::EPSILON);
        assert_eq!(config.poll.max_retries, 200);
        assert_eq!(config.cli.binary, PathBuf::from("aws"));
        assert_eq!(config.cli.capabilities.len(), 3);
        assert!(config.cli.timeout().is_none());
    }

    #[test]
    fn test_from_json_partial() {
        let config = DeployConfig::from_json_str(
            r#"{"region": "eu-central-1", "poll": {"max_retries": 10}, "cli": {"timeout_seconds": 30}}"#,
        )
        .unwrap();

        assert_eq!(config.region, "eu-central-1");
        assert_eq!(config.poll.max_retries, 10);
        assert_eq!(config.poll.min_retry_interval_ms, 5000);
        assert_eq!(config.cli.timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_from_json_rejects_invalid_poll() {
        let err = DeployConfig::from_json_str(
            r#"{"poll": {"min_retry_interval_ms": 20000, "max_retry_interval_ms": 10000}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPoll(_)));

        let err = DeployConfig::from_json_str("not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_poll_validation() {
        assert!(PollSettings::default().validate().is_ok());
        assert!(PollSettings::default().with_backoff_rate(0.9).validate().is_err());
        assert!(PollSettings::default().with_backoff_rate(f64::NAN).validate().is_err());
        assert!(PollSettings::default().with_max_retries(0).validate().is_err());
        assert!(PollSettings::default().with_intervals_ms(10, 10).validate().is_ok());
    }

    #[test]
    fn test_for_stack() {
        let poll = PollSettings::default().with_intervals_ms(100, 400).for_stack("shop");
        assert_eq!(poll.stack_name, "shop");
        assert_eq!(poll.min_retry_interval, Duration::from_millis(100));
        assert_eq!(poll.max_retry_interval, Duration::from_millis(400));
        assert_eq!(poll.max_retries, 200);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"region": "ap-south-1"}}"#).unwrap();

        let config = DeployConfig::from_file(file.path()).unwrap();
        assert_eq!(config.region, "ap-south-1");

        let err = DeployConfig::from_file("/nonexistent/stackdeploy.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_non_positive_timeout_is_ignored() {
        let cli = CliSettings {
            timeout_seconds: Some(0.0),
            ..CliSettings::default()
        };
        assert!(cli.timeout().is_none());
    }

    #[test]
    fn test_unrepresentable_timeout_is_rejected() {
        let err = DeployConfig::from_json_str(r#"{"cli": {"timeout_seconds": 1e30}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCli(_)));

        let cli = CliSettings {
            timeout_seconds: Some(1e30),
            ..CliSettings::default()
        };
        assert!(cli.validate().is_err());
        assert!(cli.timeout().is_none());
        let provider = crate::provider::AwsCliProvider::new(&cli);
        assert!(format!("{provider:?}").contains("command_timeout: None"));
    }
}
