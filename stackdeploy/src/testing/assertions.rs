//! Test assertions for deployment results.

use crate::orchestrator::{DeploymentResult, OutputValue};

/// Asserts that the deployment succeeded.
pub fn assert_deploy_ok(result: &DeploymentResult) {
    assert!(
        result.is_ok(),
        "Expected ok deployment, got error: {}",
        result.message
    );
}

/// Asserts that the deployment failed with the given message and no outputs.
pub fn assert_deploy_error(result: &DeploymentResult, message: &str) {
    assert!(
        !result.is_ok(),
        "Expected error deployment, got ok with outputs {:?}",
        result.outputs
    );
    assert_eq!(
        result.message, message,
        "Expected message {:?}, got {:?}",
        message, result.message
    );
    assert!(
        result.outputs.is_empty(),
        "Expected no outputs on error, got {:?}",
        result.outputs
    );
}

/// Asserts that a requested output resolved to `expected`.
pub fn assert_output(result: &DeploymentResult, key: &str, expected: &str) {
    let actual = result.output(key);
    assert_eq!(
        actual.and_then(OutputValue::as_str),
        Some(expected),
        "Expected output '{}' = {:?}, got {:?}",
        key,
        expected,
        actual
    );
}

/// Asserts that a requested output is present in the result but marked missing.
pub fn assert_output_missing(result: &DeploymentResult, key: &str) {
    assert_eq!(
        result.output(key),
        Some(&OutputValue::Missing),
        "Expected output '{}' to be marked missing. Keys: {:?}",
        key,
        result.outputs.keys().collect::<Vec<_>>()
    );
}
