//! Tokio harness adapter for `stepflow`.
//!
//! [`TokioHarness`] drives scenario futures on a Tokio runtime it owns, either
//! one at a time or many at once, so steps can spawn tasks and use Tokio
//! timers. [`init_logging`] installs the process-wide `tracing` subscriber,
//! which also receives the engine's `log` records.

mod config;
mod error;
mod logging;
mod tokio_harness;

pub use config::{HarnessConfig, LOG_LEVEL_ENV, LogLevel, WORKER_THREADS_ENV};
pub use error::HarnessError;
pub use logging::init_logging;
pub use tokio_harness::TokioHarness;
