//! Mapping scenario outcomes onto host test results.

use std::sync::Arc;

use stepflow::{ScenarioError, ScenarioResult};

use crate::runner::ScenarioOutcome;

/// How a host test should report a finished scenario.
///
/// Host frameworks without a runtime skip primitive report ignored scenarios
/// as passing; [`Verdict::into_strict_result`] keeps them failing instead.
///
/// # Examples
///
/// ```
/// use stepflow::{Engine, EngineConfiguration, StepDescriptor, ignore};
/// use stepflow_harness::{HarnessAdapter, ScenarioRunRequest, StdHarness, Verdict};
///
/// let scenario = Engine::new(EngineConfiguration::default())
///     .feature("Payments")
///     .scenario("refund")
///     .add_step(StepDescriptor::sync("Given a refund", |_| ignore("gateway offline")));
/// let outcome = StdHarness::new().run(ScenarioRunRequest::from_scenario(scenario));
///
/// let verdict = Verdict::from(outcome);
/// assert!(verdict.is_ignored());
/// assert!(verdict.into_test_result().is_ok());
/// ```
#[derive(Debug)]
pub enum Verdict {
    /// The scenario passed or was bypassed.
    Passed(Arc<ScenarioResult>),
    /// A step or decorator asked for the scenario to be ignored.
    Ignored(ScenarioError),
    /// The scenario failed, was cancelled, or was rejected.
    Failed(ScenarioError),
}

impl Verdict {
    /// Returns true when the scenario passed.
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed(_))
    }

    /// Returns true when the scenario was ignored.
    #[must_use]
    pub const fn is_ignored(&self) -> bool {
        matches!(self, Self::Ignored(_))
    }

    /// Converts the verdict into a test result, treating ignores as passes.
    ///
    /// # Errors
    ///
    /// Returns the scenario error when the scenario failed.
    pub fn into_test_result(self) -> Result<(), ScenarioError> {
        match self {
            Self::Passed(_) => Ok(()),
            Self::Ignored(error) => {
                log::info!("scenario ignored: {error}");
                Ok(())
            }
            Self::Failed(error) => Err(error),
        }
    }

    /// Converts the verdict into a test result, treating ignores as failures.
    ///
    /// # Errors
    ///
    /// Returns the scenario error when the scenario failed or was ignored.
    pub fn into_strict_result(self) -> Result<(), ScenarioError> {
        match self {
            Self::Passed(_) => Ok(()),
            Self::Ignored(error) | Self::Failed(error) => Err(error),
        }
    }
}

impl From<ScenarioOutcome> for Verdict {
    fn from(outcome: ScenarioOutcome) -> Self {
        match outcome {
            Ok(result) => Self::Passed(result),
            Err(error) if error.is_ignored() => Self::Ignored(error),
            Err(error) => Self::Failed(error),
        }
    }
}
