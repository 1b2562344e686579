//! Step parameters with lazy, idempotent evaluation.
//!
//! A [`StepParameter`] starts *not evaluated* and renders as
//! [`UNEVALUATED`]. Constant parameters are evaluated while they are
//! constructed; dynamic ones are evaluated the first time their step starts.

use std::any::Any;
use std::fmt::{self, Display};
use std::sync::Arc;

use crate::context::ExecutionContext;
use crate::formatting::{ParameterFormatter, ParameterValue, ValueFormattingService};

/// Rendering of a parameter whose value has not been evaluated yet.
pub const UNEVALUATED: &str = "<?>";

type Evaluator = Box<dyn FnOnce(Option<&ExecutionContext>) -> ParameterValue + Send>;

#[derive(Clone)]
enum FormatterSource {
    Service(fn(&ValueFormattingService) -> ParameterFormatter),
    Custom(ParameterFormatter),
}

/// A named step argument.
///
/// # Examples
///
/// ```
/// use stepflow::{StepParameter, ValueFormattingService};
///
/// let formatting = ValueFormattingService::default();
/// let mut param = StepParameter::dynamic("count", |_| 3_u32);
/// assert_eq!(param.format(&formatting), "<?>");
///
/// param.evaluate(None);
/// assert_eq!(param.format(&formatting), "3");
/// ```
pub struct StepParameter {
    name: String,
    evaluator: Option<Evaluator>,
    formatter: FormatterSource,
    value: Option<ParameterValue>,
}

impl StepParameter {
    /// A parameter whose value is known up front.
    ///
    /// The value is evaluated immediately, without an execution context.
    #[must_use]
    pub fn constant<T: Any + Send + Sync + Display>(name: impl Into<String>, value: T) -> Self {
        let mut param = Self::dynamic(name, move |_| value);
        param.evaluate(None);
        param
    }

    /// A parameter evaluated lazily when its step starts.
    #[must_use]
    pub fn dynamic<T, F>(name: impl Into<String>, evaluator: F) -> Self
    where
        T: Any + Send + Sync + Display,
        F: FnOnce(Option<&ExecutionContext>) -> T + Send + 'static,
    {
        Self {
            name: name.into(),
            evaluator: Some(Box::new(
                move |ctx: Option<&ExecutionContext>| -> ParameterValue { Arc::new(evaluator(ctx)) },
            )),
            formatter: FormatterSource::Service(ValueFormattingService::formatter_for::<T>),
            value: None,
        }
    }

    /// A lazily evaluated parameter with an explicit formatter.
    #[must_use]
    pub fn with_formatter(
        name: impl Into<String>,
        evaluator: impl FnOnce(Option<&ExecutionContext>) -> ParameterValue + Send + 'static,
        formatter: ParameterFormatter,
    ) -> Self {
        Self {
            name: name.into(),
            evaluator: Some(Box::new(evaluator)),
            formatter: FormatterSource::Custom(formatter),
            value: None,
        }
    }

    /// Raw parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate the parameter. Only the first call invokes the evaluator.
    pub fn evaluate(&mut self, context: Option<&ExecutionContext>) {
        if let Some(evaluator) = self.evaluator.take() {
            self.value = Some(evaluator(context));
        }
    }

    /// Whether [`evaluate`](Self::evaluate) has run.
    #[must_use]
    pub fn is_evaluated(&self) -> bool {
        self.value.is_some()
    }

    /// The evaluated value, if any.
    #[must_use]
    pub fn value(&self) -> Option<&ParameterValue> {
        self.value.as_ref()
    }

    /// Render the parameter for display in a step name.
    #[must_use]
    pub fn format(&self, formatting: &ValueFormattingService) -> String {
        let Some(value) = &self.value else {
            return UNEVALUATED.to_owned();
        };
        match &self.formatter {
            FormatterSource::Service(factory) => factory(formatting)(value.as_ref()),
            FormatterSource::Custom(formatter) => formatter(value.as_ref()),
        }
    }
}

impl fmt::Debug for StepParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepParameter")
            .field("name", &self.name)
            .field("evaluated", &self.is_evaluated())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatting::Culture;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn dynamic_parameter_evaluates_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut param = StepParameter::dynamic("value", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            "ready"
        });
        let formatting = ValueFormattingService::default();

        assert!(!param.is_evaluated());
        assert_eq!(param.format(&formatting), UNEVALUATED);
        param.evaluate(None);
        param.evaluate(None);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(param.format(&formatting), "ready");
    }

    #[test]
    fn constant_parameter_is_evaluated_on_construction() {
        let param = StepParameter::constant("price", 9.5_f64);
        assert!(param.is_evaluated());
        let formatting = ValueFormattingService::new(Culture::from_name("fr-FR"));
        assert_eq!(param.format(&formatting), "9,5");
    }

    #[test]
    fn dynamic_parameter_reads_execution_context() {
        let context = ExecutionContext::new(String::from("admin"));
        let mut param = StepParameter::dynamic("user", |ctx| {
            ctx.and_then(|c| c.downcast_ref::<String>().cloned())
                .unwrap_or_default()
        });
        param.evaluate(Some(&context));
        assert_eq!(param.format(&ValueFormattingService::default()), "admin");
    }

    #[test]
    fn custom_formatter_is_used() {
        let mut param = StepParameter::with_formatter(
            "flag",
            |_| -> ParameterValue { Arc::new(true) },
            Arc::new(|value: &(dyn Any + Send + Sync)| {
                value
                    .downcast_ref::<bool>()
                    .map_or_else(String::new, |flag| (if *flag { "on" } else { "off" }).to_owned())
            }),
        );
        param.evaluate(None);
        assert_eq!(param.format(&ValueFormattingService::default()), "on");
        assert_eq!(param.name(), "flag");
    }
}
