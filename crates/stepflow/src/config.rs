//! Engine configuration.
//!
//! [`EngineConfiguration`] gathers everything the runner needs: step-type
//! rules, value formatting, the error-to-status mapper, the progress
//! notifier, decorators, and the default execution policy. It is passed to
//! [`Engine::new`](crate::Engine::new) explicitly; nothing is read from
//! global state once an engine exists.
//!
//! [`EngineConfiguration::from_env`] reads the following variables:
//!
//! | variable | effect |
//! |----------|--------|
//! | `STEPFLOW_CULTURE` | culture used to format parameter values |
//! | `STEPFLOW_REPEATED_STEP_REPLACEMENT` | label for repeated step types; empty disables collapsing |
//! | `STEPFLOW_CONTINUE_ON_FAILURE` | boolean; default policy for scenarios |

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::decorator::{Decorator, ScenarioDecorator, StepDecorator};
use crate::error::{ErrorStatusMapper, default_status_mapper};
use crate::formatting::{Culture, ValueFormattingService};
use crate::progress::{NoProgressNotifier, ProgressNotifier};
use crate::result::{ScenarioInfo, StepInfo};
use crate::status::ExecutionStatus;
use crate::step::ExecutionPolicy;
use crate::step_type::StepTypeConfiguration;

/// Variable naming the formatting culture.
pub const CULTURE_ENV: &str = "STEPFLOW_CULTURE";
/// Variable overriding the repeated step-type replacement.
pub const REPEATED_STEP_REPLACEMENT_ENV: &str = "STEPFLOW_REPEATED_STEP_REPLACEMENT";
/// Variable selecting continue-on-failure as the default policy.
pub const CONTINUE_ON_FAILURE_ENV: &str = "STEPFLOW_CONTINUE_ON_FAILURE";

/// Errors raised while reading configuration from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A boolean variable holds an unrecognised value.
    #[error("invalid boolean `{value}` for {variable}; expected 1/0, true/false, yes/no, or on/off")]
    InvalidBool {
        /// Variable name.
        variable: &'static str,
        /// Rejected value.
        value: String,
    },
}

fn parse_env_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "1" | "true" | "TRUE" | "True" | "yes" | "YES" | "Yes" | "on" | "ON" | "On" => Some(true),
        "0" | "false" | "FALSE" | "False" | "no" | "NO" | "No" | "off" | "OFF" | "Off" => {
            Some(false)
        }
        _ => None,
    }
}

/// Runner configuration shared by every scenario of an engine.
///
/// # Examples
///
/// ```
/// use stepflow::{Culture, EngineConfiguration, ExecutionPolicy};
///
/// let config = EngineConfiguration::default()
///     .with_culture(Culture::from_name("de-DE"))
///     .with_default_policy(ExecutionPolicy::ContinueOnFailure);
/// assert_eq!(config.formatting().culture().decimal_separator(), ',');
/// ```
#[derive(Clone)]
pub struct EngineConfiguration {
    step_types: StepTypeConfiguration,
    formatting: ValueFormattingService,
    error_mapper: ErrorStatusMapper,
    notifier: Arc<dyn ProgressNotifier>,
    scenario_decorators: Vec<Arc<ScenarioDecorator>>,
    step_decorators: Vec<Arc<StepDecorator>>,
    default_policy: ExecutionPolicy,
}

impl Default for EngineConfiguration {
    fn default() -> Self {
        Self {
            step_types: StepTypeConfiguration::default(),
            formatting: ValueFormattingService::default(),
            error_mapper: default_status_mapper(),
            notifier: Arc::new(NoProgressNotifier),
            scenario_decorators: Vec::new(),
            step_decorators: Vec::new(),
            default_policy: ExecutionPolicy::default(),
        }
    }
}

impl EngineConfiguration {
    /// Default configuration adjusted by the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable holds an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Default configuration adjusted by variables read through `lookup`.
    ///
    /// # Examples
    ///
    /// ```
    /// use stepflow::{EngineConfiguration, ExecutionPolicy};
    ///
    /// let config = EngineConfiguration::from_lookup(|name| match name {
    ///     "STEPFLOW_CONTINUE_ON_FAILURE" => Some("yes".to_owned()),
    ///     "STEPFLOW_REPEATED_STEP_REPLACEMENT" => Some(String::new()),
    ///     _ => None,
    /// })?;
    /// assert_eq!(config.default_policy(), ExecutionPolicy::ContinueOnFailure);
    /// assert_eq!(config.step_types().repeated_replacement(), None);
    /// # Ok::<(), stepflow::ConfigError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable holds an invalid value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(culture) = lookup(CULTURE_ENV) {
            config = config.with_culture(Culture::from_name(&culture));
        }
        if let Some(replacement) = lookup(REPEATED_STEP_REPLACEMENT_ENV) {
            config.step_types = config
                .step_types
                .with_repeated_replacement(Some(replacement.trim().to_owned()));
        }
        if let Some(raw) = lookup(CONTINUE_ON_FAILURE_ENV) {
            match parse_env_bool(&raw) {
                Some(true) => config.default_policy = ExecutionPolicy::ContinueOnFailure,
                Some(false) => {}
                None => {
                    return Err(ConfigError::InvalidBool {
                        variable: CONTINUE_ON_FAILURE_ENV,
                        value: raw,
                    });
                }
            }
        }
        Ok(config)
    }

    /// Replace the step-type rules.
    #[must_use]
    pub fn with_step_types(mut self, step_types: StepTypeConfiguration) -> Self {
        self.step_types = step_types;
        self
    }

    /// Format values for `culture`, dropping custom formatters.
    #[must_use]
    pub fn with_culture(mut self, culture: Culture) -> Self {
        self.formatting = ValueFormattingService::new(culture);
        self
    }

    /// Replace the formatting service.
    #[must_use]
    pub fn with_formatting(mut self, formatting: ValueFormattingService) -> Self {
        self.formatting = formatting;
        self
    }

    /// Replace the error-to-status mapper.
    #[must_use]
    pub fn with_error_mapper(
        mut self,
        mapper: impl Fn(&eyre::Report) -> ExecutionStatus + Send + Sync + 'static,
    ) -> Self {
        self.error_mapper = Arc::new(mapper);
        self
    }

    /// Replace the progress notifier.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn ProgressNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Append a scenario decorator; earlier decorators wrap later ones.
    #[must_use]
    pub fn with_scenario_decorator(
        mut self,
        decorator: impl Decorator<ScenarioInfo> + 'static,
    ) -> Self {
        self.scenario_decorators.push(Arc::new(decorator));
        self
    }

    /// Append a step decorator; earlier decorators wrap later ones.
    #[must_use]
    pub fn with_step_decorator(mut self, decorator: impl Decorator<StepInfo> + 'static) -> Self {
        self.step_decorators.push(Arc::new(decorator));
        self
    }

    /// Policy for scenarios that do not choose one.
    #[must_use]
    pub fn with_default_policy(mut self, policy: ExecutionPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    /// Step-type rules.
    #[must_use]
    pub fn step_types(&self) -> &StepTypeConfiguration {
        &self.step_types
    }

    /// Value formatting service.
    #[must_use]
    pub fn formatting(&self) -> &ValueFormattingService {
        &self.formatting
    }

    /// Error-to-status mapper.
    #[must_use]
    pub fn error_mapper(&self) -> &ErrorStatusMapper {
        &self.error_mapper
    }

    /// Progress notifier.
    #[must_use]
    pub fn notifier(&self) -> &Arc<dyn ProgressNotifier> {
        &self.notifier
    }

    /// Scenario decorators, outermost first.
    #[must_use]
    pub fn scenario_decorators(&self) -> &[Arc<ScenarioDecorator>] {
        &self.scenario_decorators
    }

    /// Step decorators, outermost first.
    #[must_use]
    pub fn step_decorators(&self) -> &[Arc<StepDecorator>] {
        &self.step_decorators
    }

    /// Default execution policy.
    #[must_use]
    pub const fn default_policy(&self) -> ExecutionPolicy {
        self.default_policy
    }
}

impl fmt::Debug for EngineConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfiguration")
            .field("step_types", &self.step_types)
            .field("formatting", &self.formatting)
            .field("scenario_decorators", &self.scenario_decorators.len())
            .field("step_decorators", &self.step_decorators.len())
            .field("default_policy", &self.default_policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let Ok(config) = EngineConfiguration::from_lookup(lookup(&[])) else {
            panic!("empty environment must be valid");
        };
        assert_eq!(config.default_policy(), ExecutionPolicy::StopOnFailure);
        assert_eq!(config.step_types().repeated_replacement(), Some("AND"));
        assert_eq!(config.formatting().culture(), &Culture::invariant());
    }

    #[test]
    fn environment_overrides_are_applied() {
        let Ok(config) = EngineConfiguration::from_lookup(lookup(&[
            (CULTURE_ENV, "fr-FR"),
            (REPEATED_STEP_REPLACEMENT_ENV, " ET "),
            (CONTINUE_ON_FAILURE_ENV, "On"),
        ])) else {
            panic!("overrides must be valid");
        };
        assert_eq!(config.formatting().format_value(&1.5_f64), "1,5");
        assert_eq!(config.step_types().repeated_replacement(), Some("ET"));
        assert_eq!(config.default_policy(), ExecutionPolicy::ContinueOnFailure);
    }

    #[test]
    fn invalid_boolean_is_rejected() {
        let result = EngineConfiguration::from_lookup(lookup(&[(CONTINUE_ON_FAILURE_ENV, "maybe")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidBool { variable: CONTINUE_ON_FAILURE_ENV, ref value }) if value == "maybe"
        ));
    }

    #[test]
    fn parse_env_bool_understands_common_values() {
        for truthy in ["1", "true", "TRUE", "True", "yes", "YES", "Yes", "on", "ON", "On"] {
            assert_eq!(parse_env_bool(truthy), Some(true), "expected {truthy} to be truthy");
        }
        for falsy in ["0", "false", "FALSE", "False", "no", "NO", "No", "off", "OFF", "Off"] {
            assert_eq!(parse_env_bool(falsy), Some(false), "expected {falsy} to be falsy");
        }
        assert_eq!(parse_env_bool("maybe"), None);
    }
}
