//! Tokio harness adapter for scenario execution.

use std::num::NonZeroUsize;

use stepflow_harness::{HarnessAdapter, ScenarioRunRequest};
use tokio::runtime::{Builder, Runtime};
use tokio::task::LocalSet;

use crate::config::HarnessConfig;
use crate::error::HarnessError;

/// Drives scenario futures on a Tokio runtime owned by the harness.
///
/// The runtime is built once, from [`HarnessConfig::worker_threads`]: a
/// current-thread runtime when unset, a multi-thread runtime otherwise. Each
/// [`run`](HarnessAdapter::run) blocks the calling thread inside a
/// [`LocalSet`], so `tokio::spawn`, `tokio::task::spawn_local` and Tokio
/// timers are all available to steps.
///
/// # Examples
///
/// ```
/// use stepflow_harness::{HarnessAdapter, ScenarioMetadata, ScenarioRunRequest};
/// use stepflow_harness_tokio::{HarnessConfig, TokioHarness};
///
/// let harness = TokioHarness::new(&HarnessConfig::default())?;
/// let request = ScenarioRunRequest::new(
///     ScenarioMetadata::new("Timers", "Async scenario", vec![]),
///     async {
///         tokio::task::yield_now().await;
///         2 + 2
///     },
/// );
/// assert_eq!(harness.run(request), 4);
/// # Ok::<(), stepflow_harness_tokio::HarnessError>(())
/// ```
#[derive(Debug)]
pub struct TokioHarness {
    runtime: Runtime,
}

impl TokioHarness {
    /// Creates a harness whose runtime follows `config`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Runtime`] when the runtime cannot be built.
    pub fn new(config: &HarnessConfig) -> Result<Self, HarnessError> {
        let runtime = match config.worker_threads {
            Some(threads) => Builder::new_multi_thread()
                .worker_threads(threads.get())
                .thread_name("stepflow-worker")
                .enable_all()
                .build()?,
            None => Builder::new_current_thread().enable_all().build()?,
        };
        tracing::debug!(
            worker_threads = config.worker_threads.map_or(0, NonZeroUsize::get),
            "built scenario runtime"
        );
        Ok(Self { runtime })
    }

    /// Creates a harness configured from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the environment is invalid or the
    /// runtime cannot be built.
    pub fn from_env() -> Result<Self, HarnessError> {
        Self::new(&HarnessConfig::from_env()?)
    }

    /// Runs many scenarios concurrently and returns their outputs in
    /// submission order.
    ///
    /// Every request becomes its own Tokio task, so on a multi-thread runtime
    /// scenarios run in parallel. A panic escaping a scenario task is resumed
    /// on the calling thread.
    ///
    /// # Examples
    ///
    /// ```
    /// use stepflow_harness::{ScenarioMetadata, ScenarioRunRequest};
    /// use stepflow_harness_tokio::{HarnessConfig, TokioHarness};
    ///
    /// let harness = TokioHarness::new(&HarnessConfig::default())?;
    /// let requests = (1..=3_u32).map(|n| {
    ///     ScenarioRunRequest::new(ScenarioMetadata::default(), async move { n * 10 })
    /// });
    /// assert_eq!(harness.run_concurrently(requests)?, [10, 20, 30]);
    /// # Ok::<(), stepflow_harness_tokio::HarnessError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Task`] when a task is cancelled before it
    /// produces an output.
    pub fn run_concurrently<T, I>(&self, requests: I) -> Result<Vec<T>, HarnessError>
    where
        T: Send + 'static,
        I: IntoIterator<Item = ScenarioRunRequest<'static, T>>,
    {
        self.runtime.block_on(async {
            let handles: Vec<_> = requests
                .into_iter()
                .map(|request| {
                    let (metadata, future) = request.into_parts();
                    tracing::debug!(
                        feature = metadata.feature(),
                        scenario = metadata.scenario_name(),
                        "spawning scenario"
                    );
                    (metadata, tokio::spawn(future))
                })
                .collect();

            let mut outputs = Vec::with_capacity(handles.len());
            for (metadata, handle) in handles {
                match handle.await {
                    Ok(output) => outputs.push(output),
                    Err(source) if source.is_panic() => {
                        std::panic::resume_unwind(source.into_panic())
                    }
                    Err(source) => {
                        return Err(HarnessError::Task {
                            scenario: metadata.scenario_name().to_string(),
                            source,
                        });
                    }
                }
            }
            Ok(outputs)
        })
    }
}

impl HarnessAdapter for TokioHarness {
    fn run<T>(&self, request: ScenarioRunRequest<'_, T>) -> T {
        let (metadata, future) = request.into_parts();
        tracing::debug!(
            feature = metadata.feature(),
            scenario = metadata.scenario_name(),
            "running scenario"
        );
        LocalSet::new().block_on(&self.runtime, future)
    }
}
