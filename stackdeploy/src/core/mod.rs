//! Core data types: stack requests, statuses, resources and outputs.

mod resource;
mod stack;
mod status;

pub use resource::{ProgressSummary, ResourceState, ResourceStatus};
pub use stack::{OutputEntry, RawOutput, StackDescription, StackId, StackRequest, StackTarget};
pub use status::{classify, Outcome, StackStatus, KNOWN_STATUSES};
