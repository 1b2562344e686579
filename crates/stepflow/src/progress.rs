//! Progress tracking and notification for concurrently running scenarios.
//!
//! [`ProgressManager`] hands out scenario sequence numbers and keeps the
//! finished, pending, and failed counters. Sequence numbers come from an
//! atomic counter; the three counters share one lock so a snapshot is always
//! consistent. [`ProgressNotifier`] is the sink the runner reports to while
//! scenarios and steps execute.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::result::{ExecutionTime, ScenarioInfo, ScenarioResult, StepInfo, StepResult};
use crate::scope;
use crate::status::ExecutionStatus;

/// Consistent snapshot of the progress counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    /// Scenarios whose result has been captured.
    pub finished: u64,
    /// Scenarios started but not yet captured.
    pub pending: u64,
    /// Captured scenarios that failed.
    pub failed: u64,
}

/// Allocates scenario sequence numbers and tracks run progress.
///
/// A fresh instance starts from zero; create a new one to reset.
///
/// # Examples
///
/// ```
/// use stepflow::{ExecutionStatus, ProgressManager};
///
/// let manager = ProgressManager::new();
/// assert_eq!(manager.start_new_scenario(), 1);
/// assert_eq!(manager.progress().pending, 1);
///
/// manager.capture_scenario_result(ExecutionStatus::Failed);
/// let progress = manager.progress();
/// assert_eq!((progress.finished, progress.pending, progress.failed), (1, 0, 1));
/// ```
#[derive(Debug, Default)]
pub struct ProgressManager {
    sequence: AtomicU64,
    counters: Mutex<Progress>,
}

impl ProgressManager {
    /// Create a manager with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Progress> {
        match self.counters.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Allocate the next sequence number and count the scenario as pending.
    ///
    /// Inside a scenario slot the number also becomes the
    /// [current scenario number](Self::current_scenario_number).
    pub fn start_new_scenario(&self) -> u64 {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        scope::set_sequence(Some(sequence));
        self.lock().pending += 1;
        sequence
    }

    /// Record a finished scenario's status.
    pub fn capture_scenario_result(&self, status: ExecutionStatus) {
        let mut counters = self.lock();
        counters.pending = counters.pending.saturating_sub(1);
        counters.finished += 1;
        if status == ExecutionStatus::Failed {
            counters.failed += 1;
        }
    }

    /// Clear the scenario number of the current scenario slot.
    pub fn finish_scenario(&self) {
        scope::set_sequence(None);
    }

    /// Sequence number of the scenario running in this task.
    #[must_use]
    pub fn current_scenario_number(&self) -> Option<u64> {
        scope::current_sequence()
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn progress(&self) -> Progress {
        *self.lock()
    }
}

/// Receives progress events from the runner.
///
/// Implementations are shared between concurrently running scenarios and
/// must tolerate interleaved calls.
pub trait ProgressNotifier: Send + Sync {
    /// A scenario is about to run its first step.
    fn scenario_start(&self, scenario: &ScenarioInfo);
    /// A scenario finished and its result is final.
    fn scenario_finished(&self, result: &ScenarioResult);
    /// A step is about to be invoked.
    fn step_start(&self, step: &StepInfo);
    /// A step finished.
    fn step_finished(&self, result: &StepResult);
    /// A running step recorded a comment.
    fn step_comment(&self, step: &StepInfo, comment: &str);
}

/// Discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgressNotifier;

impl ProgressNotifier for NoProgressNotifier {
    fn scenario_start(&self, _: &ScenarioInfo) {}
    fn scenario_finished(&self, _: &ScenarioResult) {}
    fn step_start(&self, _: &StepInfo) {}
    fn step_finished(&self, _: &StepResult) {}
    fn step_comment(&self, _: &StepInfo, _: &str) {}
}

/// Forwards every notification to each inner notifier in order.
#[derive(Clone, Default)]
pub struct DelegatingProgressNotifier {
    targets: Vec<Arc<dyn ProgressNotifier>>,
}

impl DelegatingProgressNotifier {
    /// Fan out to `targets`.
    #[must_use]
    pub fn new(targets: Vec<Arc<dyn ProgressNotifier>>) -> Self {
        Self { targets }
    }
}

impl ProgressNotifier for DelegatingProgressNotifier {
    fn scenario_start(&self, scenario: &ScenarioInfo) {
        self.targets.iter().for_each(|t| t.scenario_start(scenario));
    }

    fn scenario_finished(&self, result: &ScenarioResult) {
        self.targets.iter().for_each(|t| t.scenario_finished(result));
    }

    fn step_start(&self, step: &StepInfo) {
        self.targets.iter().for_each(|t| t.step_start(step));
    }

    fn step_finished(&self, result: &StepResult) {
        self.targets.iter().for_each(|t| t.step_finished(result));
    }

    fn step_comment(&self, step: &StepInfo, comment: &str) {
        self.targets.iter().for_each(|t| t.step_comment(step, comment));
    }
}

/// Destination for rendered progress lines.
pub type LineWriter = Arc<dyn Fn(&str) + Send + Sync>;

/// Log target used by the default line writer.
pub const PROGRESS_TARGET: &str = "stepflow::progress";

/// Writes one line per event, prefixed with the run counters and the
/// scenario sequence number so interleaved output stays attributable:
///
/// ```text
/// Fi=002,Fa=001,Pe=003 #  4> STEP 1/3: GIVEN an empty basket...
/// ```
pub struct ParallelProgressNotifier {
    manager: Arc<ProgressManager>,
    writer: LineWriter,
}

impl ParallelProgressNotifier {
    /// Write lines through the `log` facade at info level.
    #[must_use]
    pub fn new(manager: Arc<ProgressManager>) -> Self {
        Self::with_writer(
            manager,
            Arc::new(|line: &str| log::info!(target: PROGRESS_TARGET, "{line}")),
        )
    }

    /// Write lines through `writer`.
    #[must_use]
    pub fn with_writer(manager: Arc<ProgressManager>, writer: LineWriter) -> Self {
        Self { manager, writer }
    }

    fn prefix(&self) -> String {
        let Progress {
            finished,
            pending,
            failed,
        } = self.manager.progress();
        let sequence = self
            .manager
            .current_scenario_number()
            .map_or_else(|| "   ".to_owned(), |n| format!("{n:>3}"));
        format!("Fi={finished:03},Fa={failed:03},Pe={pending:03} #{sequence}> ")
    }

    fn write(&self, text: &str) {
        let prefix = self.prefix();
        for line in text.lines() {
            (self.writer)(&format!("{prefix}{line}"));
        }
    }
}

fn step_position(step: &StepInfo) -> String {
    format!(
        "{}/{}{}",
        step.qualified_number(),
        step.group_prefix(),
        step.total()
    )
}

/// Render a duration as `850ms` or `2s 15ms`.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let (secs, millis) = (duration.as_secs(), duration.subsec_millis());
    if secs == 0 {
        format!("{millis}ms")
    } else {
        format!("{secs}s {millis}ms")
    }
}

fn format_elapsed(time: Option<ExecutionTime>) -> String {
    time.map_or_else(String::new, |t| {
        format!(" after {}", format_duration(t.duration()))
    })
}

impl ProgressNotifier for ParallelProgressNotifier {
    fn scenario_start(&self, scenario: &ScenarioInfo) {
        let mut text = String::from("SCENARIO: ");
        for label in scenario.labels() {
            text.push('[');
            text.push_str(label);
            text.push(']');
        }
        if !scenario.labels().is_empty() {
            text.push(' ');
        }
        text.push_str(scenario.name());
        self.write(&text);
    }

    fn scenario_finished(&self, result: &ScenarioResult) {
        let mut text = format!(
            "  SCENARIO RESULT: {}{}",
            result.status(),
            format_elapsed(result.execution_time())
        );
        if let Some(details) = result.status_details() {
            for line in details.lines() {
                text.push_str("\n    ");
                text.push_str(line);
            }
        }
        self.write(&text);
    }

    fn step_start(&self, step: &StepInfo) {
        self.write(&format!("STEP {}: {}...", step_position(step), step.name()));
    }

    fn step_finished(&self, result: &StepResult) {
        let step = result.info();
        self.write(&format!(
            "  STEP {}: {} ({}{})",
            step_position(step),
            step.name(),
            result.status(),
            format_elapsed(result.execution_time())
        ));
    }

    fn step_comment(&self, step: &StepInfo, comment: &str) {
        self.write(&format!("STEP {}: /* {comment} */", step_position(step)));
    }
}
