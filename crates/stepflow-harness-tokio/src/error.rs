//! Error types for the Tokio harness.

use thiserror::Error;

/// Errors raised while configuring or running the Tokio harness.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HarnessError {
    /// An environment variable holds an invalid value.
    #[error("invalid value `{value}` for {variable}; expected {expected}")]
    InvalidConfig {
        /// Variable name.
        variable: &'static str,
        /// Rejected value.
        value: String,
        /// Description of the accepted values.
        expected: &'static str,
    },

    /// The Tokio runtime could not be built.
    #[error("failed to build Tokio runtime: {0}")]
    Runtime(#[from] std::io::Error),

    /// A scenario task ended without producing an output.
    #[error("scenario task `{scenario}` did not complete: {source}")]
    Task {
        /// Name of the scenario the task was driving.
        scenario: String,
        /// Join failure reported by Tokio.
        #[source]
        source: tokio::task::JoinError,
    },
}
