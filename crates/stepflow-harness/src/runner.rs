//! Scenario run requests and the metadata harnesses receive with them.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use stepflow::{ScenarioBuilder, ScenarioError, ScenarioInfo, ScenarioResult};

/// What [`ScenarioBuilder::run`] resolves to.
pub type ScenarioOutcome = Result<Arc<ScenarioResult>, ScenarioError>;

/// Scenario metadata provided to harness adapters.
///
/// # Examples
///
/// ```
/// use stepflow_harness::ScenarioMetadata;
///
/// let metadata = ScenarioMetadata::new("Login", "Successful login", vec!["T-12".to_string()]);
/// assert_eq!(metadata.feature(), "Login");
/// assert_eq!(metadata.scenario_name(), "Successful login");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScenarioMetadata {
    feature: String,
    scenario_name: String,
    labels: Vec<String>,
}

impl ScenarioMetadata {
    /// Creates metadata for one scenario run.
    #[must_use]
    pub fn new(
        feature: impl Into<String>,
        scenario_name: impl Into<String>,
        labels: Vec<String>,
    ) -> Self {
        Self {
            feature: feature.into(),
            scenario_name: scenario_name.into(),
            labels,
        }
    }

    /// Returns the feature name.
    #[must_use]
    pub fn feature(&self) -> &str {
        &self.feature
    }

    /// Returns the scenario name.
    #[must_use]
    pub fn scenario_name(&self) -> &str {
        &self.scenario_name
    }

    /// Returns the scenario labels.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl Default for ScenarioMetadata {
    fn default() -> Self {
        Self::new("<unknown>", "<unknown>", Vec::new())
    }
}

impl From<&ScenarioInfo> for ScenarioMetadata {
    fn from(info: &ScenarioInfo) -> Self {
        Self::new(info.feature(), info.name(), info.labels().to_vec())
    }
}

/// A harness execution request for one scenario.
///
/// The future is boxed so adapters can hold requests of different origins
/// side by side; it must be `Send` so multi-threaded harnesses may move it
/// onto worker threads.
///
/// # Examples
///
/// ```
/// use stepflow_harness::{ScenarioMetadata, ScenarioRunRequest};
///
/// let request = ScenarioRunRequest::new(
///     ScenarioMetadata::new("Auth", "User signs in", vec![]),
///     async { "ok" },
/// );
/// assert_eq!(request.metadata().scenario_name(), "User signs in");
/// ```
pub struct ScenarioRunRequest<'a, T> {
    metadata: ScenarioMetadata,
    future: BoxFuture<'a, T>,
}

impl<'a, T> ScenarioRunRequest<'a, T> {
    /// Creates a request from metadata and the future to drive.
    #[must_use]
    pub fn new(metadata: ScenarioMetadata, future: impl Future<Output = T> + Send + 'a) -> Self {
        Self {
            metadata,
            future: Box::pin(future),
        }
    }

    /// Returns immutable metadata for diagnostics or harness setup.
    #[must_use]
    pub fn metadata(&self) -> &ScenarioMetadata {
        &self.metadata
    }

    /// Consumes the request and returns metadata and future separately.
    #[must_use]
    pub fn into_parts(self) -> (ScenarioMetadata, BoxFuture<'a, T>) {
        (self.metadata, self.future)
    }
}

impl ScenarioRunRequest<'static, ScenarioOutcome> {
    /// Wraps a declared scenario, taking metadata from its descriptor.
    ///
    /// # Examples
    ///
    /// ```
    /// use stepflow::{Engine, EngineConfiguration, StepDescriptor};
    /// use stepflow_harness::{HarnessAdapter, ScenarioRunRequest, StdHarness};
    ///
    /// let scenario = Engine::new(EngineConfiguration::default())
    ///     .feature("Basket")
    ///     .scenario("empty basket")
    ///     .add_step(StepDescriptor::sync("Given an empty basket", |_| Ok(())));
    /// let request = ScenarioRunRequest::from_scenario(scenario);
    /// assert_eq!(request.metadata().feature(), "Basket");
    /// assert!(StdHarness::new().run(request).is_ok());
    /// ```
    #[must_use]
    pub fn from_scenario(scenario: ScenarioBuilder) -> Self {
        let metadata = ScenarioMetadata::from(scenario.info());
        Self::new(metadata, scenario.run())
    }
}

impl<T> std::fmt::Debug for ScenarioRunRequest<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioRunRequest")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}
