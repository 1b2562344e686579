//! Error types and step outcome signals.
//!
//! Step bodies return [`eyre::Result`]. Besides genuine failures a body may
//! return one of the signal types below; the [`ErrorStatusMapper`] turns any
//! returned error into an [`ExecutionStatus`] at the runner boundary.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::result::ScenarioResult;
use crate::status::ExecutionStatus;

/// Maps an error returned from a step or decorator to a status.
pub type ErrorStatusMapper = Arc<dyn Fn(&eyre::Report) -> ExecutionStatus + Send + Sync>;

/// Signals that a step, and so its scenario, should be ignored.
///
/// Ignoring stops the scenario but never fails the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct IgnoreSignal {
    reason: String,
}

impl IgnoreSignal {
    /// Create an ignore signal with a reason shown as the step details.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Reason supplied by the step.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Signals that a step was bypassed; the scenario carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct BypassSignal {
    reason: String,
}

impl BypassSignal {
    /// Create a bypass signal with a reason shown as the step details.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Reason supplied by the step.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// A panic raised by a step body, captured as an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("step panicked: {message}")]
pub struct StepPanic {
    message: String,
}

impl StepPanic {
    /// Wrap a rendered panic payload.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Rendered panic payload.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Recorded against a step that was running when its scenario was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("scenario execution was cancelled")]
pub struct ScenarioCancelled;

/// Returned through the decorator chain when a group of steps stopped.
///
/// The steps themselves already carry their failures; the marker only tells
/// wrapping decorators that the group did not pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("one or more steps did not pass ({status})")]
pub(crate) struct GroupFailed {
    pub(crate) status: ExecutionStatus,
}

/// Build an error that ignores the current step.
///
/// # Examples
///
/// ```
/// use stepflow::{ExecutionStatus, default_status_mapper, ignore};
///
/// let error = ignore::<()>("feature flag disabled").unwrap_err();
/// assert_eq!(default_status_mapper()(&error), ExecutionStatus::Ignored);
/// ```
///
/// # Errors
///
/// Always returns an [`IgnoreSignal`].
pub fn ignore<T>(reason: impl Into<String>) -> eyre::Result<T> {
    Err(IgnoreSignal::new(reason).into())
}

/// Build an error that bypasses the current step.
///
/// # Errors
///
/// Always returns a [`BypassSignal`].
pub fn bypass<T>(reason: impl Into<String>) -> eyre::Result<T> {
    Err(BypassSignal::new(reason).into())
}

/// The stock mapping from errors to statuses.
///
/// [`IgnoreSignal`] maps to `Ignored`, [`BypassSignal`] to `Bypassed`, and
/// every other error to `Failed`.
#[must_use]
pub fn map_error_status(error: &eyre::Report) -> ExecutionStatus {
    if error.downcast_ref::<IgnoreSignal>().is_some() {
        ExecutionStatus::Ignored
    } else if error.downcast_ref::<BypassSignal>().is_some() {
        ExecutionStatus::Bypassed
    } else {
        ExecutionStatus::Failed
    }
}

/// [`map_error_status`] as a shareable mapper.
#[must_use]
pub fn default_status_mapper() -> ErrorStatusMapper {
    Arc::new(map_error_status)
}

/// Problems detected before a scenario starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// The scenario name is missing or blank.
    #[error("scenario name must not be empty")]
    MissingName,
    /// The scenario declares no steps.
    #[error("scenario `{scenario}` has no steps")]
    NoSteps {
        /// Offending scenario.
        scenario: String,
    },
    /// A composite step declares no sub-steps.
    #[error("composite step `{step}` in scenario `{scenario}` has no sub-steps")]
    EmptyComposite {
        /// Owning scenario.
        scenario: String,
        /// Name format of the composite step.
        step: String,
    },
}

/// A step that stopped or failed its scenario.
#[derive(Debug, Clone)]
pub struct StepFailure {
    step: String,
    status: ExecutionStatus,
    error: Arc<eyre::Report>,
}

impl StepFailure {
    pub(crate) fn new(step: String, status: ExecutionStatus, error: Arc<eyre::Report>) -> Self {
        Self {
            step,
            status,
            error,
        }
    }

    /// Qualified number and name, e.g. `2.1 THEN total is 3`.
    #[must_use]
    pub fn step(&self) -> &str {
        &self.step
    }

    /// Status recorded for the step.
    #[must_use]
    pub const fn status(&self) -> ExecutionStatus {
        self.status
    }

    /// Error returned by the step.
    #[must_use]
    pub fn error(&self) -> &Arc<eyre::Report> {
        &self.error
    }
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {} {}: {}", self.step, self.status.label(), self.error)
    }
}

fn join_failures(failures: &[StepFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Outcome of a scenario that did not pass.
///
/// Every variant except [`ScenarioError::Configuration`] carries the
/// published result of the run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScenarioError {
    /// The scenario was rejected before any step ran.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// A single step failed or ignored the scenario.
    #[error("step {step} {}: {error}", .status.label())]
    StepFailed {
        /// Qualified number and name of the step.
        step: String,
        /// `Failed` or `Ignored`.
        status: ExecutionStatus,
        /// Error returned by the step.
        error: Arc<eyre::Report>,
        /// Published scenario result.
        result: Arc<ScenarioResult>,
    },
    /// Several steps failed under the continue-on-failure policy.
    #[error("{} steps failed: {}", .failures.len(), join_failures(.failures))]
    MultipleFailures {
        /// Failures in execution order.
        failures: Vec<StepFailure>,
        /// Published scenario result.
        result: Arc<ScenarioResult>,
    },
    /// A decorator or resource disposal failed outside any step.
    #[error("scenario `{}` {}: {error}", .result.info().name(), .status.label())]
    ScenarioFailed {
        /// Status the error mapped to.
        status: ExecutionStatus,
        /// Error raised outside the steps.
        error: Arc<eyre::Report>,
        /// Published scenario result.
        result: Arc<ScenarioResult>,
    },
    /// Execution was cancelled; remaining steps did not run.
    #[error("scenario `{}` was cancelled", .result.info().name())]
    Cancelled {
        /// Published scenario result.
        result: Arc<ScenarioResult>,
    },
}

impl ScenarioError {
    /// Published result, absent for configuration errors.
    #[must_use]
    pub fn result(&self) -> Option<&Arc<ScenarioResult>> {
        match self {
            Self::Configuration(_) => None,
            Self::StepFailed { result, .. }
            | Self::MultipleFailures { result, .. }
            | Self::ScenarioFailed { result, .. }
            | Self::Cancelled { result } => Some(result),
        }
    }

    /// Scenario status; configuration errors count as `Failed`.
    #[must_use]
    pub fn status(&self) -> ExecutionStatus {
        self.result()
            .map_or(ExecutionStatus::Failed, |result| result.status())
    }

    /// Whether the scenario was ignored rather than failed.
    ///
    /// Hosts use this to mark a test as skipped instead of failed.
    #[must_use]
    pub fn is_ignored(&self) -> bool {
        self.status() == ExecutionStatus::Ignored
    }
}

/// A scoped resource failed to release.
#[derive(Debug, Error)]
#[error("failed to dispose resource `{type_name}`: {source}")]
pub struct ResourceDisposalError {
    type_name: &'static str,
    #[source]
    source: Box<dyn StdError + Send + Sync>,
}

impl ResourceDisposalError {
    /// Wrap a release failure with the resource's type name.
    #[must_use]
    pub fn new(type_name: &'static str, source: Box<dyn StdError + Send + Sync>) -> Self {
        Self { type_name, source }
    }

    /// Type name of the resource that failed to release.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }
}
