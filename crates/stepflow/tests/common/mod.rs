//! Common helpers for behavioural tests.

use std::sync::{Arc, Mutex, PoisonError};

use stepflow::{
    ExecutionStatus, ProgressNotifier, ScenarioError, ScenarioInfo, ScenarioResult, StepDescriptor,
    StepInfo, StepResult,
};

/// Step that always passes.
pub fn passing(name: &str) -> StepDescriptor {
    StepDescriptor::sync(name, |_| Ok(()))
}

/// Step that fails with `message`.
pub fn failing(name: &str, message: &'static str) -> StepDescriptor {
    StepDescriptor::sync(name, move |_| Err(eyre::eyre!(message)))
}

/// Published result of a run, whatever its outcome.
///
/// # Panics
/// Panics on configuration errors, which publish no result.
pub fn result_of(outcome: &Result<Arc<ScenarioResult>, ScenarioError>) -> Arc<ScenarioResult> {
    match outcome {
        Ok(result) => Arc::clone(result),
        Err(error) => error
            .result()
            .cloned()
            .unwrap_or_else(|| panic!("scenario was rejected: {error}")),
    }
}

/// Top-level step statuses in order.
pub fn statuses(steps: &[StepResult]) -> Vec<ExecutionStatus> {
    steps.iter().map(StepResult::status).collect()
}

/// Shared, ordered list of observations.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    /// Append an entry.
    pub fn push(&self, entry: impl Into<String>) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.into());
    }

    /// Entries recorded so far.
    pub fn entries(&self) -> Vec<String> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Notifier recording every event in a [`Journal`].
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    /// Recorded events.
    pub journal: Journal,
}

impl ProgressNotifier for RecordingNotifier {
    fn scenario_start(&self, scenario: &ScenarioInfo) {
        self.journal.push(format!("scenario start: {}", scenario.name()));
    }

    fn scenario_finished(&self, result: &ScenarioResult) {
        self.journal
            .push(format!("scenario finished: {}", result.status()));
    }

    fn step_start(&self, step: &StepInfo) {
        self.journal
            .push(format!("step start: {} {}", step.qualified_number(), step.name()));
    }

    fn step_finished(&self, result: &StepResult) {
        self.journal.push(format!(
            "step finished: {} {}",
            result.info().qualified_number(),
            result.status()
        ));
    }

    fn step_comment(&self, step: &StepInfo, comment: &str) {
        self.journal
            .push(format!("comment: {} {comment}", step.qualified_number()));
    }
}
