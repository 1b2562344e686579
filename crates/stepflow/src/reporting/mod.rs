//! Collection of scenario results.
//!
//! The runner publishes every finished scenario to the engine's
//! [`ResultConsumer`]s. [`TestRun`] is the stock consumer: it groups results
//! by feature so reporters can render the whole run once it completes.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::aggregation::run_status;
use crate::result::ScenarioResult;
use crate::status::ExecutionStatus;

/// JSON report writer for a test run.
#[cfg(feature = "diagnostics")]
pub mod json;
/// `JUnit` XML writer for a test run.
pub mod junit;


/// Receives each scenario result once the scenario has finished.
///
/// Consumers may be called from several scenarios at the same time.
pub trait ResultConsumer: Send + Sync {
    /// Accept a published scenario result.
    fn consume(&self, result: &Arc<ScenarioResult>);
}

/// Thread-safe collector of scenario results grouped by feature.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use stepflow::reporting::TestRun;
/// use stepflow::{Engine, EngineConfiguration, StepDescriptor};
///
/// let run = Arc::new(TestRun::new("checkout"));
/// let engine = Engine::new(EngineConfiguration::default()).with_consumer(run.clone());
/// # futures::executor::block_on(async {
/// engine
///     .feature("Basket")
///     .scenario("Empty basket")
///     .add_step(StepDescriptor::sync("Given an empty basket", |_| Ok(())))
///     .run()
///     .await?;
/// # Ok::<(), stepflow::ScenarioError>(())
/// # })?;
/// let snapshot = run.snapshot();
/// assert_eq!(snapshot.scenario_count(), 1);
/// assert_eq!(snapshot.status(), stepflow::ExecutionStatus::Passed);
/// # Ok::<(), stepflow::ScenarioError>(())
/// ```
#[derive(Debug)]
pub struct TestRun {
    name: String,
    features: Mutex<BTreeMap<String, Vec<Arc<ScenarioResult>>>>,
}

impl TestRun {
    /// Create an empty run.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            features: Mutex::new(BTreeMap::new()),
        }
    }

    /// Run name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Vec<Arc<ScenarioResult>>>> {
        match self.features.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Add a scenario result under its feature.
    pub fn record(&self, result: Arc<ScenarioResult>) {
        self.lock()
            .entry(result.info().feature().to_owned())
            .or_default()
            .push(result);
    }

    /// Results gathered so far.
    ///
    /// Features are ordered by name and scenarios within a feature by name,
    /// so the snapshot does not depend on completion order.
    #[must_use]
    pub fn snapshot(&self) -> TestRunResult {
        let features = self
            .lock()
            .iter()
            .map(|(name, scenarios)| {
                let mut scenarios = scenarios.clone();
                scenarios.sort_by(|a, b| a.info().name().cmp(b.info().name()));
                FeatureResult {
                    name: name.clone(),
                    scenarios,
                }
            })
            .collect();
        TestRunResult {
            name: self.name.clone(),
            features,
        }
    }

    /// Remove and return everything gathered so far.
    #[must_use]
    pub fn drain(&self) -> TestRunResult {
        let snapshot = self.snapshot();
        self.lock().clear();
        snapshot
    }
}

impl ResultConsumer for TestRun {
    fn consume(&self, result: &Arc<ScenarioResult>) {
        self.record(Arc::clone(result));
    }
}

/// Results of one feature.
#[derive(Debug, Clone)]
pub struct FeatureResult {
    name: String,
    scenarios: Vec<Arc<ScenarioResult>>,
}

impl FeatureResult {
    /// Feature name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Scenario results ordered by scenario name.
    #[must_use]
    pub fn scenarios(&self) -> &[Arc<ScenarioResult>] {
        &self.scenarios
    }

    /// `Failed` when any scenario failed, otherwise `Passed`.
    #[must_use]
    pub fn status(&self) -> ExecutionStatus {
        run_status(self.scenarios.iter().map(|s| s.status()))
    }
}

/// Snapshot of a whole test run.
#[derive(Debug, Clone)]
pub struct TestRunResult {
    name: String,
    features: Vec<FeatureResult>,
}

impl TestRunResult {
    /// Run name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Features ordered by name.
    #[must_use]
    pub fn features(&self) -> &[FeatureResult] {
        &self.features
    }

    /// Every scenario of the run, feature by feature.
    pub fn scenarios(&self) -> impl Iterator<Item = &Arc<ScenarioResult>> {
        self.features.iter().flat_map(|f| f.scenarios.iter())
    }

    /// Number of scenarios.
    #[must_use]
    pub fn scenario_count(&self) -> usize {
        self.scenarios().count()
    }

    /// Number of scenarios that ended with `status`.
    #[must_use]
    pub fn count(&self, status: ExecutionStatus) -> usize {
        self.scenarios().filter(|s| s.status() == status).count()
    }

    /// `Failed` when any scenario failed, otherwise `Passed`.
    ///
    /// Ignored and bypassed scenarios do not fail a run.
    #[must_use]
    pub fn status(&self) -> ExecutionStatus {
        run_status(self.scenarios().map(|s| s.status()))
    }
}
