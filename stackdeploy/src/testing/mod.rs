//! Testing utilities for deployments.
//!
//! This module provides:
//! - A scripted provider that replays stack statuses
//! - Assertions for deployment results

mod assertions;
mod mocks;

pub use assertions::{assert_deploy_error, assert_deploy_ok, assert_output, assert_output_missing};
pub use mocks::ScriptedProvider;
