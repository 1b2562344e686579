//! Core library for `stepflow`.
//!
//! The crate executes behaviour-driven scenarios: ordered lists of named
//! steps whose outcomes roll up into a scenario result. It resolves step
//! types, renders step names from lazily evaluated parameters, wraps every
//! scenario and step in configurable decorators, maps errors to statuses,
//! reports progress for concurrently running scenarios, and publishes results
//! to consumers such as [`reporting::TestRun`].
//!
//! ```
//! use stepflow::{
//!     CompositeStep, Engine, EngineConfiguration, ExecutionStatus, StepDescriptor, ignore,
//! };
//!
//! # futures::executor::block_on(async {
//! let engine = Engine::new(EngineConfiguration::default());
//! let outcome = engine
//!     .feature("Payments")
//!     .scenario("Refund")
//!     .add_step(StepDescriptor::sync("Given a settled payment", |_| Ok(())))
//!     .add_step(StepDescriptor::composite(
//!         "Then the refund is checked",
//!         CompositeStep::new(vec![
//!             StepDescriptor::sync("Then the balance is restored", |_| Ok(())),
//!             StepDescriptor::sync("Then an email is sent", |_| ignore("mail is stubbed")),
//!         ]),
//!     ))
//!     .run()
//!     .await;
//!
//! let Err(error) = outcome else { panic!("the scenario should be ignored") };
//! assert!(error.is_ignored());
//! let result = error.result().cloned().unwrap_or_else(|| panic!("result is published"));
//! assert_eq!(result.status(), ExecutionStatus::Ignored);
//! assert_eq!(
//!     result.status_details(),
//!     Some("Step 2.2: mail is stubbed"),
//! );
//! # });
//! ```

pub mod aggregation;
pub mod config;
pub mod context;
pub mod decorator;
pub mod error;
pub mod formatting;
pub mod panic;
pub mod parameter;
pub mod progress;
pub mod reporting;
pub mod result;
pub mod runner;
pub mod scope;
pub mod status;
pub mod step;
pub mod step_type;

pub use config::{
    CONTINUE_ON_FAILURE_ENV, CULTURE_ENV, ConfigError, EngineConfiguration,
    REPEATED_STEP_REPLACEMENT_ENV,
};
pub use context::{ExecutionContext, StepContext};
pub use decorator::{Continuation, Decorator, DecoratorChain, ScenarioDecorator, StepDecorator};
pub use error::{
    BypassSignal, ConfigurationError, ErrorStatusMapper, IgnoreSignal, ResourceDisposalError,
    ScenarioCancelled, ScenarioError, StepFailure, StepPanic, bypass, default_status_mapper,
    ignore, map_error_status,
};
pub use formatting::{Culture, ValueFormattingService};
pub use panic::panic_message;
pub use parameter::StepParameter;
pub use progress::{
    DelegatingProgressNotifier, NoProgressNotifier, ParallelProgressNotifier, Progress,
    ProgressManager, ProgressNotifier,
};
pub use reporting::ResultConsumer;
pub use result::{
    ExecutionTime, NameParameter, ScenarioInfo, ScenarioResult, StepInfo, StepName, StepResult,
};
pub use runner::{Engine, FeatureRunner, ScenarioBuilder};
pub use scope::Disposable;
pub use status::{ExecutionStatus, max_severity};
pub use step::{CompositeStep, ExecutionPolicy, StepDescriptor, StepFuture};
pub use step_type::{ResolvedStepType, StepTypeConfiguration, StepTypeResolver};
pub use tokio_util::sync::CancellationToken;
