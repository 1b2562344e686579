//! Scenario runner.
//!
//! An [`Engine`] owns the configuration, the decorator chains, the progress
//! manager, and the result consumers. Scenarios are declared through
//! [`Engine::feature`] and [`FeatureRunner::scenario`], then executed with
//! [`ScenarioBuilder::run`]:
//!
//! ```
//! use stepflow::{Engine, EngineConfiguration, ExecutionStatus, StepDescriptor};
//!
//! # futures::executor::block_on(async {
//! let engine = Engine::new(EngineConfiguration::default());
//! let result = engine
//!     .feature("Basket")
//!     .scenario("Adding an item")
//!     .add_step(StepDescriptor::sync("Given an empty basket", |_| Ok(())))
//!     .add_step(StepDescriptor::sync("When an item is added", |_| Ok(())))
//!     .run()
//!     .await?;
//! assert_eq!(result.status(), ExecutionStatus::Passed);
//! # Ok::<(), stepflow::ScenarioError>(())
//! # })?;
//! # Ok::<(), stepflow::ScenarioError>(())
//! ```
//!
//! Steps run one at a time in declaration order. Under the default policy a
//! `Failed` or `Ignored` step stops the scenario and the remaining steps stay
//! `NotRun`; `Bypassed` steps never stop it. Under continue-on-failure only
//! an `Ignored` step stops the scenario.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::aggregation::format_details;
use crate::config::EngineConfiguration;
use crate::context::{ExecutionContext, StepContext};
use crate::decorator::{Continuation, DecoratorChain};
use crate::error::{
    ConfigurationError, GroupFailed, ScenarioCancelled, ScenarioError, StepFailure, StepPanic,
};
use crate::formatting::ParameterValue;
use crate::panic::panic_message;
use crate::parameter::StepParameter;
use crate::progress::ProgressManager;
use crate::reporting::ResultConsumer;
use crate::result::{
    ExecutionTime, NameParameter, ScenarioInfo, ScenarioResult, StepInfo, StepName, StepResult,
};
use crate::scope::{self, CommentSink, ScenarioLocal, ScopedResources};
use crate::status::{ExecutionStatus, max_severity};
use crate::step::{ContextFactory, ExecutionPolicy, StepAction, StepBody, StepDescriptor};
use crate::step_type::StepTypeResolver;


/// Executes scenarios with a shared configuration.
///
/// Cloning is cheap; clones share the progress manager and consumers.
#[derive(Clone)]
pub struct Engine {
    config: Arc<EngineConfiguration>,
    scenario_chain: DecoratorChain<ScenarioInfo>,
    step_chain: DecoratorChain<StepInfo>,
    progress: Arc<ProgressManager>,
    consumers: Vec<Arc<dyn ResultConsumer>>,
}

impl Engine {
    /// Create an engine with a fresh progress manager and no consumers.
    #[must_use]
    pub fn new(config: EngineConfiguration) -> Self {
        Self {
            scenario_chain: DecoratorChain::new(config.scenario_decorators().to_vec()),
            step_chain: DecoratorChain::new(config.step_decorators().to_vec()),
            config: Arc::new(config),
            progress: Arc::new(ProgressManager::new()),
            consumers: Vec::new(),
        }
    }

    /// Track progress with `progress`, typically the manager a
    /// [`ParallelProgressNotifier`](crate::ParallelProgressNotifier) reads.
    #[must_use]
    pub fn with_progress_manager(mut self, progress: Arc<ProgressManager>) -> Self {
        self.progress = progress;
        self
    }

    /// Publish every scenario result to `consumer`.
    #[must_use]
    pub fn with_consumer(mut self, consumer: Arc<dyn ResultConsumer>) -> Self {
        self.consumers.push(consumer);
        self
    }

    /// Engine configuration.
    #[must_use]
    pub fn configuration(&self) -> &EngineConfiguration {
        &self.config
    }

    /// Progress manager shared by every scenario of this engine.
    #[must_use]
    pub fn progress_manager(&self) -> &Arc<ProgressManager> {
        &self.progress
    }

    /// Declare scenarios belonging to the feature `name`.
    #[must_use]
    pub fn feature(&self, name: impl Into<String>) -> FeatureRunner {
        FeatureRunner {
            engine: self.clone(),
            name: name.into(),
        }
    }

    fn name_parameters(&self, parameters: &[StepParameter]) -> Vec<NameParameter> {
        let formatting = self.config.formatting();
        parameters
            .iter()
            .map(|p| NameParameter::new(p.name(), p.format(formatting), p.is_evaluated()))
            .collect()
    }

    async fn execute(&self, plan: ScenarioPlan, resources: ScopedResources) -> ScenarioOutcome {
        let ScenarioPlan {
            info,
            steps,
            policy,
            cancellation,
        } = plan;
        let notifier = self.config.notifier();
        let sequence = self.progress.start_new_scenario();
        log::debug!("scenario #{sequence} `{}` started", info.name());
        notifier.scenario_start(&info);
        let started = Utc::now();
        let clock = Instant::now();

        let group = GroupRunner {
            engine: self,
            cancellation: &cancellation,
        };
        let mut results = group.prepare(&steps, "");
        let mut outcome = GroupOutcome::default();
        let terminal = group.continuation(steps, policy, &mut results, &mut outcome);
        let chain_result = self.scenario_chain.execute(&info, terminal).await;

        let mut result = ScenarioResult::new(info);
        result.set_steps(results);
        if let Some(first) = outcome.failures.first() {
            result.set_error(Arc::clone(first.error()));
        }

        let mut scenario_error = None;
        if let Err(error) = chain_result {
            if error.downcast_ref::<GroupFailed>().is_none() {
                let status = (self.config.error_mapper())(&error);
                log::debug!("scenario decorator returned {status}: {error}");
                result.escalate(status, Some(format_details(&error.to_string())));
                let error = Arc::new(error);
                result.set_error(Arc::clone(&error));
                scenario_error = Some((status, error));
            }
        }

        for failure in resources.dispose_all().await {
            let error = Arc::new(eyre::Report::new(failure));
            result.escalate(
                ExecutionStatus::Failed,
                Some(format_details(&error.to_string())),
            );
            result.set_error(Arc::clone(&error));
            scenario_error.get_or_insert((ExecutionStatus::Failed, error));
        }

        result.set_execution_time(ExecutionTime::new(started, clock.elapsed()));
        self.progress.capture_scenario_result(result.status());
        notifier.scenario_finished(&result);
        self.progress.finish_scenario();
        log::debug!(
            "scenario #{sequence} `{}` finished: {}",
            result.info().name(),
            result.status()
        );

        let result = Arc::new(result);
        for consumer in &self.consumers {
            consumer.consume(&result);
        }

        ScenarioOutcome {
            result,
            group: outcome,
            scenario_error,
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("progress", &self.progress)
            .field("consumers", &self.consumers.len())
            .finish_non_exhaustive()
    }
}

/// Declares scenarios of one feature.
#[derive(Debug, Clone)]
pub struct FeatureRunner {
    engine: Engine,
    name: String,
}

impl FeatureRunner {
    /// Feature name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start declaring the scenario `name`.
    #[must_use]
    pub fn scenario(&self, name: impl Into<String>) -> ScenarioBuilder {
        ScenarioBuilder {
            engine: self.engine.clone(),
            info: ScenarioInfo::new(self.name.clone(), name),
            steps: Vec::new(),
            context: None,
            policy: None,
            cancellation: CancellationToken::new(),
        }
    }
}

/// A scenario being declared; consumed by [`run`](Self::run).
#[derive(Debug)]
pub struct ScenarioBuilder {
    engine: Engine,
    info: ScenarioInfo,
    steps: Vec<StepDescriptor>,
    context: Option<ExecutionContext>,
    policy: Option<ExecutionPolicy>,
    cancellation: CancellationToken,
}

impl ScenarioBuilder {
    /// Attach labels such as ticket identifiers.
    #[must_use]
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.info = self.info.with_labels(labels);
        self
    }

    /// Attach categories.
    #[must_use]
    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.info = self.info.with_categories(categories);
        self
    }

    /// State shared by the scenario's steps.
    #[must_use]
    pub fn with_context(mut self, context: ExecutionContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Append a step.
    #[must_use]
    pub fn add_step(mut self, step: StepDescriptor) -> Self {
        self.steps.push(step);
        self
    }

    /// Append several steps in order.
    #[must_use]
    pub fn add_steps(mut self, steps: impl IntoIterator<Item = StepDescriptor>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Run every step even after one fails.
    #[must_use]
    pub fn continue_on_failure(self) -> Self {
        self.with_policy(ExecutionPolicy::ContinueOnFailure)
    }

    /// Override the engine's default policy for this scenario.
    #[must_use]
    pub fn with_policy(mut self, policy: ExecutionPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Stop the scenario when `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Scenario identity.
    #[must_use]
    pub fn info(&self) -> &ScenarioInfo {
        &self.info
    }

    /// Check the declaration without running anything.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] when the name is blank, there are no
    /// steps, or a composite step has no sub-steps.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.info.name().trim().is_empty() {
            return Err(ConfigurationError::MissingName);
        }
        if self.steps.is_empty() {
            return Err(ConfigurationError::NoSteps {
                scenario: self.info.name().to_owned(),
            });
        }
        validate_groups(self.info.name(), &self.steps)
    }

    /// Execute the scenario.
    ///
    /// The result is published to the engine's consumers before this returns,
    /// whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::Configuration`] without running any step when
    /// [`validate`](Self::validate) fails, and the other variants when the
    /// scenario was cancelled or did not pass.
    pub async fn run(self) -> Result<Arc<ScenarioResult>, ScenarioError> {
        self.validate()?;
        let Self {
            engine,
            info,
            steps,
            context,
            policy,
            cancellation,
        } = self;
        let plan = ScenarioPlan {
            info,
            steps,
            policy: policy.unwrap_or_else(|| engine.config.default_policy()),
            cancellation,
        };
        let local = ScenarioLocal::new(context);
        let resources = local.resources();
        let outcome = scope::enter(local, engine.execute(plan, resources)).await;
        outcome.into_result()
    }
}

fn validate_groups(scenario: &str, steps: &[StepDescriptor]) -> Result<(), ConfigurationError> {
    for step in steps {
        if let Some(group) = step.group() {
            if group.steps().is_empty() {
                return Err(ConfigurationError::EmptyComposite {
                    scenario: scenario.to_owned(),
                    step: step.name_format().to_owned(),
                });
            }
            validate_groups(scenario, group.steps())?;
        }
    }
    Ok(())
}

struct ScenarioPlan {
    info: ScenarioInfo,
    steps: Vec<StepDescriptor>,
    policy: ExecutionPolicy,
    cancellation: CancellationToken,
}

struct ScenarioOutcome {
    result: Arc<ScenarioResult>,
    group: GroupOutcome,
    scenario_error: Option<(ExecutionStatus, Arc<eyre::Report>)>,
}

impl ScenarioOutcome {
    fn into_result(self) -> Result<Arc<ScenarioResult>, ScenarioError> {
        let Self {
            result,
            group,
            scenario_error,
        } = self;
        if group.cancelled {
            return Err(ScenarioError::Cancelled { result });
        }
        let mut failures = group.failures;
        if failures.len() > 1 {
            return Err(ScenarioError::MultipleFailures { failures, result });
        }
        if let Some(failure) = failures.pop() {
            return Err(ScenarioError::StepFailed {
                step: failure.step().to_owned(),
                status: failure.status(),
                error: Arc::clone(failure.error()),
                result,
            });
        }
        match scenario_error {
            Some((status, error)) if status.stops_scenario() => {
                Err(ScenarioError::ScenarioFailed {
                    status,
                    error,
                    result,
                })
            }
            _ => Ok(result),
        }
    }
}

#[derive(Default)]
struct GroupOutcome {
    failures: Vec<StepFailure>,
    worst: ExecutionStatus,
    cancelled: bool,
}

impl GroupOutcome {
    fn verdict(&self) -> eyre::Result<()> {
        if self.worst.stops_scenario() {
            Err(GroupFailed { status: self.worst }.into())
        } else {
            Ok(())
        }
    }
}

/// Runs one group of sibling steps: a scenario's steps or a composite's.
///
/// The execution context is read from the scenario slot when each step
/// starts, so changes made through [`scope::set_execution_context`] reach
/// the following steps.
struct GroupRunner<'e> {
    engine: &'e Engine,
    cancellation: &'e CancellationToken,
}

impl GroupRunner<'_> {
    /// Initial `NotRun` results carrying resolved step types and names.
    fn prepare(&self, steps: &[StepDescriptor], group_prefix: &str) -> Vec<StepResult> {
        let mut resolver = StepTypeResolver::new(self.engine.config.step_types());
        let total = steps.len();
        steps
            .iter()
            .enumerate()
            .map(|(index, step)| {
                let resolved = resolver.resolve(step.step_type(), step.name_format());
                let name = StepName::new(
                    resolved.step_type,
                    resolved.name_format,
                    self.engine.name_parameters(step.parameters()),
                );
                StepResult::new(StepInfo::new(index + 1, total, group_prefix, name))
            })
            .collect()
    }

    /// Continuation running `steps` and recording their outcome.
    fn continuation<'a>(
        &'a self,
        steps: Vec<StepDescriptor>,
        policy: ExecutionPolicy,
        results: &'a mut [StepResult],
        outcome: &'a mut GroupOutcome,
    ) -> Continuation<'a> {
        Box::new(move || -> BoxFuture<'a, eyre::Result<()>> {
            Box::pin(async move {
                *outcome = self.run(steps, results, policy).await;
                outcome.verdict()
            })
        })
    }

    fn run<'a>(
        &'a self,
        steps: Vec<StepDescriptor>,
        results: &'a mut [StepResult],
        policy: ExecutionPolicy,
    ) -> BoxFuture<'a, GroupOutcome> {
        Box::pin(async move {
            let mut outcome = GroupOutcome::default();
            for (step, result) in steps.into_iter().zip(results.iter_mut()) {
                if self.cancellation.is_cancelled() {
                    outcome.cancelled = true;
                    break;
                }
                let status = self.run_step(step, result, &mut outcome).await;
                outcome.worst.escalate(status);
                if self.cancellation.is_cancelled() {
                    outcome.cancelled = true;
                    break;
                }
                let stop = match status {
                    ExecutionStatus::Ignored => true,
                    ExecutionStatus::Failed => !policy.continues_after_failure(),
                    _ => false,
                };
                if stop {
                    break;
                }
            }
            outcome
        })
    }

    async fn run_step(
        &self,
        step: StepDescriptor,
        result: &mut StepResult,
        outcome: &mut GroupOutcome,
    ) -> ExecutionStatus {
        let (mut parameters, action) = step.into_parts();
        let started = Utc::now();
        let clock = Instant::now();
        let context = scope::execution_context();

        let evaluation = std::panic::catch_unwind(AssertUnwindSafe(|| {
            for parameter in &mut parameters {
                parameter.evaluate(context.as_ref());
            }
        }));
        let name = StepName::new(
            result.info().name().step_type(),
            result.info().name().format(),
            self.engine.name_parameters(&parameters),
        );
        result.info_mut().set_name(name);
        let info = result.info().clone();

        let notifier = self.engine.config.notifier();
        notifier.step_start(&info);
        log::debug!("step {} `{}` started", info.qualified_number(), info.name());

        let sink = CommentSink::new(info.clone(), Arc::clone(notifier));
        let previous_sink = scope::replace_comment_sink(Some(sink.clone()));
        let arguments: Vec<Option<ParameterValue>> =
            parameters.iter().map(|p| p.value().cloned()).collect();
        drop(parameters);

        let mut sub_results = Vec::new();
        let mut sub_outcome = None;
        let invocation = match (evaluation, action) {
            (Err(payload), _) => Err(eyre::Report::new(StepPanic::new(panic_message(&*payload)))),
            (Ok(()), StepAction::Body(body)) => {
                let ctx = StepContext::new(
                    info.clone(),
                    arguments,
                    context,
                    self.cancellation.clone(),
                    sink.clone(),
                );
                self.invoke(&info, body_continuation(body, ctx), true).await
            }
            (Ok(()), StepAction::Composite(group)) => {
                let (steps, policy, factory) = group.into_parts();
                sub_results = self.prepare(&steps, &format!("{}.", info.qualified_number()));
                let terminal = self.composite_continuation(
                    steps,
                    policy,
                    factory,
                    &mut sub_results,
                    &mut sub_outcome,
                );
                self.invoke(&info, terminal, false).await
            }
        };

        scope::replace_comment_sink(previous_sink);
        result.set_comments(sink.take());
        result.set_execution_time(ExecutionTime::new(started, clock.elapsed()));

        match invocation {
            Ok(()) => result.set_status(ExecutionStatus::Passed, None),
            Err(error) if error.downcast_ref::<GroupFailed>().is_some() => {}
            Err(error) => {
                let status = (self.engine.config.error_mapper())(&error);
                let error = Arc::new(error);
                result.set_status(status, Some(format_details(&error.to_string())));
                result.set_error(Arc::clone(&error));
                if status.stops_scenario() {
                    let step = format!("{} {}", info.qualified_number(), info.name());
                    outcome.failures.push(StepFailure::new(step, status, error));
                }
            }
        }
        if let Some(worst) = max_severity(sub_results.iter().map(StepResult::status)) {
            result.set_status(worst, None);
        }
        result.set_sub_steps(sub_results);
        if let Some(group) = sub_outcome {
            outcome.failures.extend(group.failures);
            outcome.cancelled |= group.cancelled;
        }

        log::debug!(
            "step {} `{}` finished: {}",
            info.qualified_number(),
            info.name(),
            result.status()
        );
        notifier.step_finished(result);
        result.status()
    }

    fn composite_continuation<'a>(
        &'a self,
        steps: Vec<StepDescriptor>,
        policy: ExecutionPolicy,
        factory: Option<ContextFactory>,
        results: &'a mut Vec<StepResult>,
        outcome: &'a mut Option<GroupOutcome>,
    ) -> Continuation<'a> {
        Box::new(move || -> BoxFuture<'a, eyre::Result<()>> {
            Box::pin(async move {
                let parent = factory
                    .map(|factory| factory())
                    .transpose()?
                    .map(|own| scope::replace_execution_context(Some(own)));
                let group_outcome = self.run(steps, results, policy).await;
                if let Some(parent) = parent {
                    scope::replace_execution_context(parent);
                }
                let verdict = group_outcome.verdict();
                *outcome = Some(group_outcome);
                verdict
            })
        })
    }

    /// Run `terminal` through the step decorators, capturing panics and,
    /// for step bodies, racing against cancellation.
    async fn invoke<'a>(
        &'a self,
        info: &'a StepInfo,
        terminal: Continuation<'a>,
        cancellable: bool,
    ) -> eyre::Result<()> {
        let guarded = AssertUnwindSafe(async move {
            self.engine.step_chain.execute(info, terminal).await
        })
        .catch_unwind()
        .map(|caught| {
            caught.unwrap_or_else(|payload| {
                Err(eyre::Report::new(StepPanic::new(panic_message(&*payload))))
            })
        });

        if !cancellable {
            return guarded.await;
        }
        tokio::select! {
            biased;
            () = self.cancellation.cancelled() => Err(eyre::Report::new(ScenarioCancelled)),
            outcome = guarded => outcome,
        }
    }
}

fn body_continuation<'a>(body: StepBody, ctx: StepContext) -> Continuation<'a> {
    Box::new(move || -> BoxFuture<'a, eyre::Result<()>> { body(ctx) })
}
