//! Execution context and the per-step handle passed to step bodies.
//!
//! [`ExecutionContext`] is the user state shared by every step of a scenario.
//! It is type-erased and retrieved with a typed downcast, so a mismatched
//! type yields `None` rather than an error. [`StepContext`] bundles what a
//! running step may need: its identity, evaluated arguments, the scenario's
//! context, the cancellation token, and a comment sink.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::formatting::ParameterValue;
use crate::result::StepInfo;
use crate::scope::CommentSink;

/// Shared, type-erased scenario state.
///
/// # Examples
///
/// ```
/// use stepflow::ExecutionContext;
///
/// let ctx = ExecutionContext::new(vec![1, 2, 3]);
/// assert_eq!(ctx.downcast_ref::<Vec<i32>>().map(Vec::len), Some(3));
/// assert!(ctx.downcast_ref::<String>().is_none());
/// ```
#[derive(Clone)]
pub struct ExecutionContext(Arc<dyn Any + Send + Sync>);

impl ExecutionContext {
    /// Wrap `value` as the scenario context.
    #[must_use]
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Wrap an already shared value.
    #[must_use]
    pub fn from_arc(value: Arc<dyn Any + Send + Sync>) -> Self {
        Self(value)
    }

    /// Borrow the context as `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_ref().downcast_ref::<T>()
    }

    /// Share the context as `Arc<T>`.
    #[must_use]
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.0).downcast::<T>().ok()
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ExecutionContext").finish_non_exhaustive()
    }
}

/// Handle passed to a step body for the duration of one invocation.
pub struct StepContext {
    info: StepInfo,
    arguments: Vec<Option<ParameterValue>>,
    execution_context: Option<ExecutionContext>,
    cancellation: CancellationToken,
    comments: Option<CommentSink>,
}

impl StepContext {
    pub(crate) fn new(
        info: StepInfo,
        arguments: Vec<Option<ParameterValue>>,
        execution_context: Option<ExecutionContext>,
        cancellation: CancellationToken,
        comments: CommentSink,
    ) -> Self {
        Self {
            info,
            arguments,
            execution_context,
            cancellation,
            comments: Some(comments),
        }
    }

    /// A context for driving a step body outside the runner.
    ///
    /// Comments recorded through it are discarded.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use stepflow::formatting::ParameterValue;
    /// use stepflow::{StepContext, StepInfo, StepName};
    ///
    /// let info = StepInfo::new(1, 1, "", StepName::default());
    /// let count: ParameterValue = Arc::new(5_u8);
    /// let ctx = StepContext::detached(info, vec![count]);
    /// assert_eq!(ctx.argument::<u8>(0).as_deref(), Some(&5));
    /// ```
    #[must_use]
    pub fn detached(info: StepInfo, arguments: Vec<ParameterValue>) -> Self {
        Self {
            info,
            arguments: arguments.into_iter().map(Some).collect(),
            execution_context: None,
            cancellation: CancellationToken::new(),
            comments: None,
        }
    }

    /// Identity of the running step.
    #[must_use]
    pub fn info(&self) -> &StepInfo {
        &self.info
    }

    /// Evaluated value of the parameter at `index`, if it holds a `T`.
    #[must_use]
    pub fn argument<T: Any + Send + Sync>(&self, index: usize) -> Option<Arc<T>> {
        let value = self.arguments.get(index)?.as_ref()?;
        Arc::clone(value).downcast::<T>().ok()
    }

    /// Scenario execution context.
    #[must_use]
    pub fn execution_context(&self) -> Option<&ExecutionContext> {
        self.execution_context.as_ref()
    }

    /// Scenario execution context borrowed as `T`.
    #[must_use]
    pub fn context<T: Any>(&self) -> Option<&T> {
        self.execution_context.as_ref()?.downcast_ref::<T>()
    }

    /// Token cancelled when the scenario is cancelled.
    ///
    /// Long-running steps may poll it to stop early.
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Attach a comment to this step and report it to the progress sink.
    ///
    /// Blank comments are dropped.
    pub fn comment(&self, text: impl AsRef<str>) {
        if let Some(sink) = &self.comments {
            sink.record(text.as_ref());
        }
    }
}

impl fmt::Debug for StepContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepContext")
            .field("info", &self.info)
            .field("arguments", &self.arguments.len())
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish_non_exhaustive()
    }
}
