//! Step and scenario descriptors and their execution results.
//!
//! Results are built by the runner and published as `Arc<ScenarioResult>`.
//! Setters are crate-private; once published a result is read-only.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::aggregation;
use crate::formatting::render_name;
use crate::status::ExecutionStatus;

/// A parameter as it appears in a rendered step name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameParameter {
    name: String,
    formatted: String,
    evaluated: bool,
}

impl NameParameter {
    /// Create a rendered name parameter.
    #[must_use]
    pub fn new(name: impl Into<String>, formatted: impl Into<String>, evaluated: bool) -> Self {
        Self {
            name: name.into(),
            formatted: formatted.into(),
            evaluated,
        }
    }

    /// Raw parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Formatted value, or the unevaluated placeholder.
    #[must_use]
    pub fn formatted(&self) -> &str {
        &self.formatted
    }

    /// Whether the value had been evaluated when the name was rendered.
    #[must_use]
    pub const fn is_evaluated(&self) -> bool {
        self.evaluated
    }
}

/// Step name: format string, ordered parameters, and step-type label.
///
/// # Examples
///
/// ```
/// use stepflow::{NameParameter, StepName};
///
/// let name = StepName::new(
///     "GIVEN",
///     "a basket with {0} items",
///     vec![NameParameter::new("count", "3", true)],
/// );
/// assert_eq!(name.rendered(), "a basket with 3 items");
/// assert_eq!(name.to_string(), "GIVEN a basket with 3 items");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepName {
    step_type: String,
    format: String,
    parameters: Vec<NameParameter>,
}

impl StepName {
    /// Create a step name. An empty `step_type` means no label.
    #[must_use]
    pub fn new(
        step_type: impl Into<String>,
        format: impl Into<String>,
        parameters: Vec<NameParameter>,
    ) -> Self {
        Self {
            step_type: step_type.into(),
            format: format.into(),
            parameters,
        }
    }

    /// Step-type label such as `GIVEN` or `AND`; empty when none applies.
    #[must_use]
    pub fn step_type(&self) -> &str {
        &self.step_type
    }

    /// Name format with positional placeholders.
    #[must_use]
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Parameters in placeholder order.
    #[must_use]
    pub fn parameters(&self) -> &[NameParameter] {
        &self.parameters
    }

    /// Name with parameters substituted, without the step type.
    #[must_use]
    pub fn rendered(&self) -> String {
        let values: Vec<String> = self
            .parameters
            .iter()
            .map(|p| p.formatted.clone())
            .collect();
        render_name(&self.format, &values)
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.step_type.is_empty() {
            f.write_str(&self.rendered())
        } else {
            write!(f, "{} {}", self.step_type, self.rendered())
        }
    }
}

/// Identity of a step within its scenario or composite group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepInfo {
    number: usize,
    total: usize,
    group_prefix: String,
    name: StepName,
}

impl StepInfo {
    /// Create step identity. `number` is one-based.
    #[must_use]
    pub fn new(number: usize, total: usize, group_prefix: impl Into<String>, name: StepName) -> Self {
        Self {
            number,
            total,
            group_prefix: group_prefix.into(),
            name,
        }
    }

    /// One-based position within the enclosing group.
    #[must_use]
    pub const fn number(&self) -> usize {
        self.number
    }

    /// Number of steps in the enclosing group.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }

    /// Dotted prefix of the enclosing composite step, e.g. `"2."`; empty at top level.
    #[must_use]
    pub fn group_prefix(&self) -> &str {
        &self.group_prefix
    }

    /// Fully qualified step number, e.g. `"2.1"`.
    #[must_use]
    pub fn qualified_number(&self) -> String {
        format!("{}{}", self.group_prefix, self.number)
    }

    /// Step name.
    #[must_use]
    pub fn name(&self) -> &StepName {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: StepName) {
        self.name = name;
    }
}

/// Wall-clock start and measured duration of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionTime {
    start: DateTime<Utc>,
    duration: Duration,
}

impl ExecutionTime {
    /// Create an execution time window.
    #[must_use]
    pub const fn new(start: DateTime<Utc>, duration: Duration) -> Self {
        Self { start, duration }
    }

    /// When execution started.
    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// How long execution took.
    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.duration
    }
}

/// Outcome of one step.
#[derive(Debug, Clone)]
pub struct StepResult {
    info: StepInfo,
    status: ExecutionStatus,
    status_details: Option<String>,
    error: Option<Arc<eyre::Report>>,
    execution_time: Option<ExecutionTime>,
    comments: Vec<String>,
    sub_steps: Vec<StepResult>,
}

impl StepResult {
    /// A result for a step that has not run.
    #[must_use]
    pub fn new(info: StepInfo) -> Self {
        Self {
            info,
            status: ExecutionStatus::NotRun,
            status_details: None,
            error: None,
            execution_time: None,
            comments: Vec::new(),
            sub_steps: Vec::new(),
        }
    }

    /// Step identity.
    #[must_use]
    pub fn info(&self) -> &StepInfo {
        &self.info
    }

    /// Final status.
    #[must_use]
    pub const fn status(&self) -> ExecutionStatus {
        self.status
    }

    /// Status details produced by this step alone, without a step prefix.
    #[must_use]
    pub fn status_details(&self) -> Option<&str> {
        self.status_details.as_deref()
    }

    /// Error captured while the step ran.
    #[must_use]
    pub fn error(&self) -> Option<&Arc<eyre::Report>> {
        self.error.as_ref()
    }

    /// Execution time, absent for steps that never ran.
    #[must_use]
    pub const fn execution_time(&self) -> Option<ExecutionTime> {
        self.execution_time
    }

    /// Comments recorded by the step body, in order.
    #[must_use]
    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    /// Results of composite sub-steps, in order.
    #[must_use]
    pub fn sub_steps(&self) -> &[Self] {
        &self.sub_steps
    }

    pub(crate) fn info_mut(&mut self) -> &mut StepInfo {
        &mut self.info
    }

    pub(crate) fn set_status(&mut self, status: ExecutionStatus, details: Option<String>) {
        self.status.escalate(status);
        if details.is_some() {
            self.status_details = details;
        }
    }

    pub(crate) fn set_error(&mut self, error: Arc<eyre::Report>) {
        self.error = Some(error);
    }

    pub(crate) fn set_execution_time(&mut self, time: ExecutionTime) {
        self.execution_time = Some(time);
    }

    pub(crate) fn set_comments(&mut self, comments: Vec<String>) {
        self.comments = comments;
    }

    pub(crate) fn set_sub_steps(&mut self, sub_steps: Vec<Self>) {
        self.sub_steps = sub_steps;
    }
}

/// Identity of a scenario.
///
/// # Examples
///
/// ```
/// use stepflow::ScenarioInfo;
///
/// let info = ScenarioInfo::new("Checkout", "Paying by card")
///     .with_labels(["TICKET-1"])
///     .with_categories(["payments"]);
/// assert_eq!(info.feature(), "Checkout");
/// assert_eq!(info.labels(), ["TICKET-1"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScenarioInfo {
    feature: String,
    name: String,
    labels: Vec<String>,
    categories: Vec<String>,
}

impl ScenarioInfo {
    /// Create scenario identity.
    #[must_use]
    pub fn new(feature: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            feature: feature.into(),
            name: name.into(),
            labels: Vec::new(),
            categories: Vec::new(),
        }
    }

    /// Attach labels such as ticket identifiers.
    #[must_use]
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Attach categories.
    #[must_use]
    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    /// Owning feature name.
    #[must_use]
    pub fn feature(&self) -> &str {
        &self.feature
    }

    /// Scenario name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Labels in declaration order.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Categories in declaration order.
    #[must_use]
    pub fn categories(&self) -> &[String] {
        &self.categories
    }
}

/// Outcome of one scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    info: ScenarioInfo,
    steps: Vec<StepResult>,
    status: ExecutionStatus,
    status_details: Option<String>,
    execution_time: Option<ExecutionTime>,
    error: Option<Arc<eyre::Report>>,
}

impl ScenarioResult {
    /// A result with no steps executed yet.
    #[must_use]
    pub fn new(info: ScenarioInfo) -> Self {
        Self {
            info,
            steps: Vec::new(),
            status: ExecutionStatus::NotRun,
            status_details: None,
            execution_time: None,
            error: None,
        }
    }

    /// Scenario identity.
    #[must_use]
    pub fn info(&self) -> &ScenarioInfo {
        &self.info
    }

    /// Step results in declaration order.
    #[must_use]
    pub fn steps(&self) -> &[StepResult] {
        &self.steps
    }

    /// Aggregated status.
    #[must_use]
    pub const fn status(&self) -> ExecutionStatus {
        self.status
    }

    /// Aggregated details, one `Step n: ...` line per step with details.
    #[must_use]
    pub fn status_details(&self) -> Option<&str> {
        self.status_details.as_deref()
    }

    /// Execution time of the whole scenario.
    #[must_use]
    pub const fn execution_time(&self) -> Option<ExecutionTime> {
        self.execution_time
    }

    /// First error captured while the scenario ran.
    #[must_use]
    pub fn error(&self) -> Option<&Arc<eyre::Report>> {
        self.error.as_ref()
    }

    /// Roll step outcomes into the scenario status and details.
    ///
    /// With no steps the explicitly set status is kept.
    pub(crate) fn set_steps(&mut self, steps: Vec<StepResult>) {
        self.status = aggregation::scenario_status(&steps, self.status);
        self.status_details = aggregation::merge_status_details(&steps);
        self.steps = steps;
    }

    pub(crate) fn escalate(&mut self, status: ExecutionStatus, details: Option<String>) {
        self.status.escalate(status);
        let Some(extra) = details else {
            return;
        };
        let merged = self
            .status_details
            .take()
            .map_or_else(|| extra.clone(), |existing| format!("{existing}\n{extra}"));
        self.status_details = Some(merged);
    }

    pub(crate) fn set_error(&mut self, error: Arc<eyre::Report>) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    pub(crate) fn set_execution_time(&mut self, time: ExecutionTime) {
        self.execution_time = Some(time);
    }
}
