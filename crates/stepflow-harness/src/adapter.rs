//! Harness adapter trait for scenario execution.

use crate::runner::ScenarioRunRequest;

/// Drives scenario futures inside a harness-specific environment.
///
/// # Examples
///
/// ```
/// use stepflow_harness::{HarnessAdapter, ScenarioMetadata, ScenarioRunRequest, StdHarness};
///
/// let request = ScenarioRunRequest::new(
///     ScenarioMetadata::new("Demo", "Example", vec![]),
///     async { 5 + 5 },
/// );
/// let harness = StdHarness::new();
/// assert_eq!(harness.run(request), 10);
/// ```
pub trait HarnessAdapter {
    /// Drives one scenario request to completion and returns its output.
    fn run<T>(&self, request: ScenarioRunRequest<'_, T>) -> T;
}
