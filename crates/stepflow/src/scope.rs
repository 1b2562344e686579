//! Scenario-local state carried across `.await` points.
//!
//! Each scenario run executes inside its own task-local slot holding the
//! scenario sequence number, the user [`ExecutionContext`], the comment sink of
//! the running step, and the scenario's disposable resources. Tokio does not
//! copy task-locals into spawned tasks; use [`spawn`] to start a child task that
//! sees a snapshot of the current slot. Changes made inside a child never leak
//! back to the parent or to sibling tasks. Resources are shared, so a child may
//! register resources that the scenario later releases.

use std::any::type_name;
use std::cell::RefCell;
use std::error::Error as StdError;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::BoxFuture;
use tokio::task::JoinHandle;

use crate::context::ExecutionContext;
use crate::error::ResourceDisposalError;
use crate::progress::ProgressNotifier;
use crate::result::StepInfo;

tokio::task_local! {
    static SCENARIO: RefCell<ScenarioLocal>;
}

/// A resource owned by the running scenario and released after its last step.
///
/// # Examples
///
/// ```
/// use futures::future::BoxFuture;
/// use stepflow::scope::Disposable;
///
/// struct TempDir(std::path::PathBuf);
///
/// impl Disposable for TempDir {
///     fn dispose(
///         self: Box<Self>,
///     ) -> BoxFuture<'static, Result<(), Box<dyn std::error::Error + Send + Sync>>> {
///         Box::pin(async move { std::fs::remove_dir_all(&self.0).map_err(Into::into) })
///     }
/// }
/// ```
pub trait Disposable: Send + 'static {
    /// Release the resource.
    fn dispose(self: Box<Self>) -> BoxFuture<'static, Result<(), Box<dyn StdError + Send + Sync>>>;
}

type Resource = (&'static str, Box<dyn Disposable>);

#[derive(Clone, Default)]
pub(crate) struct ScopedResources {
    entries: Arc<Mutex<Vec<Resource>>>,
}

impl ScopedResources {
    fn lock(&self) -> MutexGuard<'_, Vec<Resource>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn register<R: Disposable>(&self, resource: R) {
        self.lock().push((type_name::<R>(), Box::new(resource)));
    }

    /// Release every resource in reverse registration order.
    pub(crate) async fn dispose_all(&self) -> Vec<ResourceDisposalError> {
        let entries = std::mem::take(&mut *self.lock());
        let mut failures = Vec::new();
        for (type_name, resource) in entries.into_iter().rev() {
            if let Err(source) = resource.dispose().await {
                log::warn!("failed to dispose scoped resource {type_name}: {source}");
                failures.push(ResourceDisposalError::new(type_name, source));
            }
        }
        failures
    }
}

/// Comment buffer of the step currently running.
#[derive(Clone)]
pub(crate) struct CommentSink {
    step: StepInfo,
    comments: Arc<Mutex<Vec<String>>>,
    notifier: Arc<dyn ProgressNotifier>,
}

impl CommentSink {
    pub(crate) fn new(step: StepInfo, notifier: Arc<dyn ProgressNotifier>) -> Self {
        Self {
            step,
            comments: Arc::default(),
            notifier,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        match self.comments.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub(crate) fn record(&self, comment: &str) {
        let comment = comment.trim();
        if comment.is_empty() {
            return;
        }
        self.lock().push(comment.to_owned());
        self.notifier.step_comment(&self.step, comment);
    }

    pub(crate) fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lock())
    }
}

#[derive(Clone, Default)]
pub(crate) struct ScenarioLocal {
    sequence: Option<u64>,
    context: Option<ExecutionContext>,
    comments: Option<CommentSink>,
    resources: ScopedResources,
}

impl ScenarioLocal {
    pub(crate) fn new(context: Option<ExecutionContext>) -> Self {
        Self {
            context,
            ..Self::default()
        }
    }

    pub(crate) fn resources(&self) -> ScopedResources {
        self.resources.clone()
    }
}

/// Run `future` inside a fresh slot seeded with `local`.
pub(crate) async fn enter<F: Future>(local: ScenarioLocal, future: F) -> F::Output {
    SCENARIO.scope(RefCell::new(local), future).await
}

/// Run `future` inside a fresh, empty scenario slot.
///
/// The runner opens a slot for every scenario; this is for code that drives
/// scenario-local state on its own, such as a progress manager used without
/// the runner.
pub async fn isolated<F: Future>(future: F) -> F::Output {
    enter(ScenarioLocal::default(), future).await
}

fn with_local<R>(f: impl FnOnce(&mut ScenarioLocal) -> R) -> Option<R> {
    SCENARIO.try_with(|slot| f(&mut slot.borrow_mut())).ok()
}

/// Spawn a Tokio task that inherits a snapshot of the current scenario slot.
///
/// Outside a scenario the child gets an empty slot. Must be called from
/// within a Tokio runtime.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let snapshot = with_local(|local| local.clone()).unwrap_or_default();
    tokio::spawn(SCENARIO.scope(RefCell::new(snapshot), future))
}

/// Sequence number of the running scenario.
#[must_use]
pub fn current_sequence() -> Option<u64> {
    with_local(|local| local.sequence).flatten()
}

/// Store the sequence number; returns `false` outside a scenario slot.
pub(crate) fn set_sequence(sequence: Option<u64>) -> bool {
    with_local(|local| local.sequence = sequence).is_some()
}

/// Execution context of the running scenario.
#[must_use]
pub fn execution_context() -> Option<ExecutionContext> {
    with_local(|local| local.context.clone()).flatten()
}

/// Replace the execution context for the rest of this task.
///
/// Steps that start afterwards see the new context in their
/// [`StepContext`](crate::context::StepContext) and parameter evaluation.
/// Inside a composite step with its own context the change ends with the
/// composite. Returns `false` outside a scenario slot.
pub fn set_execution_context(context: ExecutionContext) -> bool {
    with_local(|local| local.context = Some(context)).is_some()
}

pub(crate) fn replace_execution_context(
    context: Option<ExecutionContext>,
) -> Option<ExecutionContext> {
    with_local(|local| std::mem::replace(&mut local.context, context)).flatten()
}

pub(crate) fn replace_comment_sink(sink: Option<CommentSink>) -> Option<CommentSink> {
    with_local(|local| std::mem::replace(&mut local.comments, sink)).flatten()
}

/// Attach a comment to the running step.
///
/// Returns `false` when no step is running in this task.
pub fn comment(text: &str) -> bool {
    let Some(sink) = with_local(|local| local.comments.clone()).flatten() else {
        return false;
    };
    sink.record(text);
    true
}

/// Register a resource released once the scenario finishes.
///
/// Returns `false`, and drops the resource without disposing it, when called
/// outside a scenario.
pub fn register_resource<R: Disposable>(resource: R) -> bool {
    let Some(resources) = with_local(|local| local.resources.clone()) else {
        return false;
    };
    resources.register(resource);
    true
}
