//! Harness configuration parsed from environment variables.
//!
//! Every setting can be overridden through a `STEPFLOW_` prefixed variable.
//! Lookup is injectable so tests never touch the process environment.

use std::num::NonZeroUsize;
use std::str::FromStr;

use crate::error::HarnessError;

/// Variable selecting the log level.
pub const LOG_LEVEL_ENV: &str = "STEPFLOW_LOG_LEVEL";
/// Variable selecting the number of runtime worker threads.
pub const WORKER_THREADS_ENV: &str = "STEPFLOW_WORKER_THREADS";

/// Log level enumeration matching tracing crate levels.
///
/// Defaults to `Info` when not specified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Most verbose logging, includes all trace spans.
    Trace,
    /// Debug-level information such as step transitions.
    Debug,
    /// Standard informational messages.
    #[default]
    Info,
    /// Warnings such as failed resource disposal.
    Warn,
    /// Error messages only.
    Error,
}

impl FromStr for LogLevel {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(HarnessError::InvalidConfig {
                variable: LOG_LEVEL_ENV,
                value: s.to_string(),
                expected: "one of trace, debug, info, warn, error",
            }),
        }
    }
}

impl LogLevel {
    /// Convert to a tracing filter directive string.
    #[must_use]
    pub const fn as_filter_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Configuration for the Tokio harness.
///
/// # Environment Variables
///
/// - `STEPFLOW_LOG_LEVEL`: log level (trace, debug, info, warn, error)
/// - `STEPFLOW_WORKER_THREADS`: worker threads of a multi-thread runtime;
///   unset selects a current-thread runtime
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Log level applied by [`init_logging`](crate::init_logging).
    pub log_level: LogLevel,
    /// Worker threads; `None` runs scenarios on a current-thread runtime.
    pub worker_threads: Option<NonZeroUsize>,
}

impl HarnessConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::InvalidConfig`] when a variable holds an
    /// invalid value.
    pub fn from_env() -> Result<Self, HarnessError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from variables read through `lookup`.
    ///
    /// # Examples
    ///
    /// ```
    /// use stepflow_harness_tokio::{HarnessConfig, LogLevel};
    ///
    /// let config = HarnessConfig::from_lookup(|name| match name {
    ///     "STEPFLOW_LOG_LEVEL" => Some("debug".to_string()),
    ///     "STEPFLOW_WORKER_THREADS" => Some("4".to_string()),
    ///     _ => None,
    /// })?;
    /// assert_eq!(config.log_level, LogLevel::Debug);
    /// assert_eq!(config.worker_threads.map(usize::from), Some(4));
    /// # Ok::<(), stepflow_harness_tokio::HarnessError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::InvalidConfig`] when a variable holds an
    /// invalid value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, HarnessError> {
        let log_level = lookup(LOG_LEVEL_ENV)
            .map(|raw| raw.parse::<LogLevel>())
            .transpose()?
            .unwrap_or_default();

        let worker_threads = lookup(WORKER_THREADS_ENV)
            .map(|raw| {
                raw.trim()
                    .parse::<NonZeroUsize>()
                    .map_err(|_| HarnessError::InvalidConfig {
                        variable: WORKER_THREADS_ENV,
                        value: raw.clone(),
                        expected: "a positive integer",
                    })
            })
            .transpose()?;

        Ok(Self {
            log_level,
            worker_threads,
        })
    }

    /// Create a new configuration with the specified log level.
    #[must_use]
    pub const fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Create a new configuration running a multi-thread runtime.
    #[must_use]
    pub const fn with_worker_threads(mut self, threads: NonZeroUsize) -> Self {
        self.worker_threads = Some(threads);
        self
    }
}
