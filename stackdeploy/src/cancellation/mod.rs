//! Cooperative cancellation for deployments.

mod token;

pub use token::CancellationToken;
