//! Step descriptors: what the runner executes.
//!
//! A [`StepDescriptor`] pairs a name format and its parameters with either a
//! body or a [`CompositeStep`] group of sub-steps. Descriptors are consumed by
//! the run, so bodies are `FnOnce`.

use std::fmt;
use std::future::Future;

use futures::future::BoxFuture;

use crate::context::{ExecutionContext, StepContext};
use crate::parameter::StepParameter;

/// Future returned by a step body.
pub type StepFuture = BoxFuture<'static, eyre::Result<()>>;

pub(crate) type StepBody = Box<dyn FnOnce(StepContext) -> StepFuture + Send>;
pub(crate) type ContextFactory = Box<dyn FnOnce() -> eyre::Result<ExecutionContext> + Send>;

/// How a group of steps reacts to a failed step.
///
/// Ignored steps stop the group under either policy; bypassed steps never do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionPolicy {
    /// The first failed step stops the group; the rest are not run.
    #[default]
    StopOnFailure,
    /// Failed steps are recorded and the remaining steps still run.
    ContinueOnFailure,
}

impl ExecutionPolicy {
    pub(crate) const fn continues_after_failure(self) -> bool {
        matches!(self, Self::ContinueOnFailure)
    }
}

pub(crate) enum StepAction {
    Body(StepBody),
    Composite(CompositeStep),
}

/// A single step awaiting execution.
///
/// # Examples
///
/// ```
/// use stepflow::{StepDescriptor, StepParameter};
///
/// let step = StepDescriptor::new("Given a basket with {0} items", |ctx| async move {
///     let count = ctx.argument::<u32>(0);
///     eyre::ensure!(count.as_deref() == Some(&2), "unexpected count");
///     Ok(())
/// })
/// .with_parameter(StepParameter::constant("count", 2_u32));
/// assert_eq!(step.name_format(), "Given a basket with {0} items");
/// ```
pub struct StepDescriptor {
    name_format: String,
    step_type: Option<String>,
    parameters: Vec<StepParameter>,
    action: StepAction,
}

impl StepDescriptor {
    /// An asynchronous step.
    #[must_use]
    pub fn new<F, Fut>(name_format: impl Into<String>, body: F) -> Self
    where
        F: FnOnce(StepContext) -> Fut + Send + 'static,
        Fut: Future<Output = eyre::Result<()>> + Send + 'static,
    {
        let body: StepBody = Box::new(move |ctx: StepContext| -> StepFuture {
            Box::pin(body(ctx))
        });
        Self::with_action(name_format, StepAction::Body(body))
    }

    /// A synchronous step; the body runs when the step is polled.
    #[must_use]
    pub fn sync<F>(name_format: impl Into<String>, body: F) -> Self
    where
        F: FnOnce(&StepContext) -> eyre::Result<()> + Send + 'static,
    {
        let body: StepBody = Box::new(move |ctx: StepContext| -> StepFuture {
            Box::pin(async move { body(&ctx) })
        });
        Self::with_action(name_format, StepAction::Body(body))
    }

    /// A step running a group of sub-steps.
    #[must_use]
    pub fn composite(name_format: impl Into<String>, group: CompositeStep) -> Self {
        Self::with_action(name_format, StepAction::Composite(group))
    }

    fn with_action(name_format: impl Into<String>, action: StepAction) -> Self {
        Self {
            name_format: name_format.into(),
            step_type: None,
            parameters: Vec::new(),
            action,
        }
    }

    /// Set the step type explicitly instead of reading it from the name.
    #[must_use]
    pub fn with_step_type(mut self, step_type: impl Into<String>) -> Self {
        self.step_type = Some(step_type.into());
        self
    }

    /// Append a parameter; the n-th parameter fills placeholder `{n}`.
    #[must_use]
    pub fn with_parameter(mut self, parameter: StepParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Append several parameters in order.
    #[must_use]
    pub fn with_parameters(mut self, parameters: impl IntoIterator<Item = StepParameter>) -> Self {
        self.parameters.extend(parameters);
        self
    }

    /// Name format with positional placeholders.
    #[must_use]
    pub fn name_format(&self) -> &str {
        &self.name_format
    }

    /// Explicit step type, if any.
    #[must_use]
    pub fn step_type(&self) -> Option<&str> {
        self.step_type.as_deref()
    }

    /// Parameters in placeholder order.
    #[must_use]
    pub fn parameters(&self) -> &[StepParameter] {
        &self.parameters
    }

    /// Sub-step group, for composite steps.
    #[must_use]
    pub fn group(&self) -> Option<&CompositeStep> {
        match &self.action {
            StepAction::Composite(group) => Some(group),
            StepAction::Body(_) => None,
        }
    }

    pub(crate) fn into_parts(self) -> (Vec<StepParameter>, StepAction) {
        (self.parameters, self.action)
    }
}

impl fmt::Debug for StepDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDescriptor")
            .field("name_format", &self.name_format)
            .field("step_type", &self.step_type)
            .field("parameters", &self.parameters)
            .field("group", &self.group())
            .finish()
    }
}

/// A nested group of steps with its own execution policy.
///
/// The policy is never inherited from the enclosing scenario or group; an
/// undeclared policy means [`ExecutionPolicy::StopOnFailure`].
///
/// # Examples
///
/// ```
/// use stepflow::{CompositeStep, ExecutionPolicy, StepDescriptor};
///
/// let checks = CompositeStep::new(vec![
///     StepDescriptor::sync("Then the total is shown", |_| Ok(())),
///     StepDescriptor::sync("Then the basket is empty", |_| Ok(())),
/// ])
/// .continue_on_failure();
/// assert_eq!(checks.policy(), ExecutionPolicy::ContinueOnFailure);
/// assert_eq!(checks.steps().len(), 2);
/// ```
pub struct CompositeStep {
    steps: Vec<StepDescriptor>,
    policy: ExecutionPolicy,
    context: Option<ContextFactory>,
}

impl CompositeStep {
    /// Group `steps` under the stop-on-failure policy.
    #[must_use]
    pub fn new(steps: Vec<StepDescriptor>) -> Self {
        Self {
            steps,
            policy: ExecutionPolicy::default(),
            context: None,
        }
    }

    /// Run every sub-step even after one fails.
    #[must_use]
    pub fn continue_on_failure(self) -> Self {
        self.with_policy(ExecutionPolicy::ContinueOnFailure)
    }

    /// Set the group's policy.
    #[must_use]
    pub fn with_policy(mut self, policy: ExecutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Give the sub-steps their own execution context.
    ///
    /// The factory runs when the composite step starts and its context
    /// replaces the scenario's until the last sub-step finishes. If it fails,
    /// the composite step takes the error's status and no sub-step runs.
    #[must_use]
    pub fn with_context<F>(mut self, factory: F) -> Self
    where
        F: FnOnce() -> eyre::Result<ExecutionContext> + Send + 'static,
    {
        self.context = Some(Box::new(factory));
        self
    }

    /// Sub-steps in declaration order.
    #[must_use]
    pub fn steps(&self) -> &[StepDescriptor] {
        &self.steps
    }

    /// The group's policy.
    #[must_use]
    pub const fn policy(&self) -> ExecutionPolicy {
        self.policy
    }

    pub(crate) fn into_parts(self) -> (Vec<StepDescriptor>, ExecutionPolicy, Option<ContextFactory>) {
        (self.steps, self.policy, self.context)
    }
}

impl fmt::Debug for CompositeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeStep")
            .field("steps", &self.steps)
            .field("policy", &self.policy)
            .field("has_context", &self.context.is_some())
            .finish()
    }
}
