//! Step-type labels and collapsing of repeated types.
//!
//! A step type is either given explicitly or taken from a configured prefix
//! word at the start of the step name (`"Given a user"` becomes type `GIVEN`
//! and name `"a user"`). A type equal to the immediately preceding step's
//! type is replaced with the configured conjunction, so
//! `GIVEN, GIVEN, WHEN` is shown as `GIVEN, AND, WHEN`.

const DEFAULT_STEP_TYPES: [&str; 6] = ["GIVEN", "WHEN", "THEN", "SETUP", "AND", "BUT"];
const DEFAULT_REPLACEMENT: &str = "AND";

/// Recognised step-type prefixes and the replacement for repeated types.
///
/// # Examples
///
/// ```
/// use stepflow::StepTypeConfiguration;
///
/// let config = StepTypeConfiguration::default();
/// assert_eq!(config.repeated_replacement(), Some("AND"));
/// assert!(config.predefined().iter().any(|t| t == "WHEN"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepTypeConfiguration {
    predefined: Vec<String>,
    repeated_replacement: Option<String>,
}

impl StepTypeConfiguration {
    /// Create a configuration with explicit prefixes and replacement.
    #[must_use]
    pub fn new<I, S>(predefined: I, repeated_replacement: Option<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            predefined: predefined.into_iter().map(Into::into).collect(),
            repeated_replacement,
        }
    }

    /// Replace the conjunction used for repeated types; `None` keeps repeats.
    #[must_use]
    pub fn with_repeated_replacement(mut self, replacement: Option<String>) -> Self {
        self.repeated_replacement = replacement.filter(|r| !r.trim().is_empty());
        self
    }

    /// Recognised prefixes in matching order.
    #[must_use]
    pub fn predefined(&self) -> &[String] {
        &self.predefined
    }

    /// Replacement for a type repeating the previous step's type.
    #[must_use]
    pub fn repeated_replacement(&self) -> Option<&str> {
        self.repeated_replacement.as_deref()
    }

    fn match_prefix<'a>(&'a self, name: &'a str) -> Option<(&'a str, &'a str)> {
        let trimmed = name.trim_start();
        self.predefined.iter().find_map(|prefix| {
            let head = trimmed.get(..prefix.len())?;
            let rest = trimmed.get(prefix.len()..)?;
            (head.eq_ignore_ascii_case(prefix) && rest.starts_with(' '))
                .then(|| (prefix.as_str(), rest.trim_start()))
        })
    }
}

impl Default for StepTypeConfiguration {
    fn default() -> Self {
        Self::new(DEFAULT_STEP_TYPES, Some(DEFAULT_REPLACEMENT.to_owned()))
    }
}

/// Step type and name after prefix extraction and repeat collapsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStepType {
    /// Label to display; empty when no type applies.
    pub step_type: String,
    /// Name format with any extracted prefix removed.
    pub name_format: String,
}

/// Resolves step types for one sequence of sibling steps.
///
/// Only the immediately preceding step is consulted when collapsing repeats.
///
/// # Examples
///
/// ```
/// use stepflow::{StepTypeConfiguration, StepTypeResolver};
///
/// let config = StepTypeConfiguration::default();
/// let mut resolver = StepTypeResolver::new(&config);
/// let first = resolver.resolve(None, "Given an empty basket");
/// let second = resolver.resolve(None, "given a voucher");
/// assert_eq!((first.step_type.as_str(), first.name_format.as_str()), ("GIVEN", "an empty basket"));
/// assert_eq!(second.step_type, "AND");
/// ```
#[derive(Debug)]
pub struct StepTypeResolver<'a> {
    config: &'a StepTypeConfiguration,
    previous: Option<String>,
}

impl<'a> StepTypeResolver<'a> {
    /// Start a fresh sequence.
    #[must_use]
    pub const fn new(config: &'a StepTypeConfiguration) -> Self {
        Self {
            config,
            previous: None,
        }
    }

    /// Resolve the next step in the sequence.
    pub fn resolve(&mut self, explicit: Option<&str>, name_format: &str) -> ResolvedStepType {
        let explicit = explicit.map(str::trim).filter(|t| !t.is_empty());
        let (base, name) = explicit.map_or_else(
            || {
                self.config.match_prefix(name_format).map_or_else(
                    || (String::new(), name_format.to_owned()),
                    |(prefix, rest)| (prefix.to_owned(), rest.to_owned()),
                )
            },
            |step_type| (step_type.to_owned(), name_format.to_owned()),
        );

        let repeated = !base.is_empty()
            && self
                .previous
                .as_deref()
                .is_some_and(|prev| prev.eq_ignore_ascii_case(&base));
        let step_type = match self.config.repeated_replacement() {
            Some(replacement) if repeated => replacement.to_owned(),
            _ => base.clone(),
        };
        self.previous = Some(base);

        ResolvedStepType {
            step_type,
            name_format: name,
        }
    }
}
