//! Default blocking harness implementation.

use crate::adapter::HarnessAdapter;
use crate::runner::ScenarioRunRequest;

/// Framework-agnostic blocking harness.
///
/// `StdHarness` polls the scenario future on the calling thread with
/// [`futures::executor::block_on`]. No async runtime is entered, so steps that
/// spawn Tokio tasks or use Tokio timers need the Tokio harness instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdHarness;

impl StdHarness {
    /// Creates a new blocking harness.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HarnessAdapter for StdHarness {
    fn run<T>(&self, request: ScenarioRunRequest<'_, T>) -> T {
        let (metadata, future) = request.into_parts();
        log::debug!(
            "running scenario `{}` of `{}` on the calling thread",
            metadata.scenario_name(),
            metadata.feature()
        );
        futures::executor::block_on(future)
    }
}
