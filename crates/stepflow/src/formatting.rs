//! Culture-aware value formatting and step name rendering.
//!
//! Parameter values are type-erased, so formatting goes through a
//! [`ValueFormattingService`] that knows per-type formatters and falls back to
//! [`Display`]. Step names use positional placeholders (`{0}`, `{1}`) with
//! `{{` and `}}` escapes.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::sync::Arc;

/// Type-erased parameter value shared between the step model and the step body.
pub type ParameterValue = Arc<dyn Any + Send + Sync>;

/// Renders an evaluated parameter value as text.
pub type ParameterFormatter = Arc<dyn Fn(&(dyn Any + Send + Sync)) -> String + Send + Sync>;

type TypeFormatter = Arc<dyn Fn(&(dyn Any + Send + Sync), &Culture) -> String + Send + Sync>;

/// Placeholder rendered when a formatter receives a value of another type.
pub const UNFORMATTABLE: &str = "<!>";

const COMMA_DECIMAL_CULTURES: [&str; 12] = [
    "fr", "de", "pl", "es", "it", "pt", "nl", "ru", "sv", "da", "cs", "tr",
];

/// Culture settings used when rendering values.
///
/// # Examples
///
/// ```
/// use stepflow::Culture;
///
/// assert_eq!(Culture::invariant().decimal_separator(), '.');
/// assert_eq!(Culture::from_name("fr-FR").decimal_separator(), ',');
/// assert_eq!(Culture::from_name("en-GB").decimal_separator(), '.');
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Culture {
    name: String,
    decimal_separator: char,
}

impl Culture {
    /// Culture-neutral formatting.
    #[must_use]
    pub fn invariant() -> Self {
        Self::new("", '.')
    }

    /// Create a culture with an explicit decimal separator.
    #[must_use]
    pub fn new(name: impl Into<String>, decimal_separator: char) -> Self {
        Self {
            name: name.into(),
            decimal_separator,
        }
    }

    /// Resolve a culture from a language tag such as `de-DE`.
    ///
    /// Unknown tags fall back to a `.` decimal separator.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        let language = name
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        let separator = if COMMA_DECIMAL_CULTURES.contains(&language.as_str()) {
            ','
        } else {
            '.'
        };
        Self::new(name.trim(), separator)
    }

    /// Culture name, empty for the invariant culture.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Separator placed between the integral and fractional digits.
    #[must_use]
    pub const fn decimal_separator(&self) -> char {
        self.decimal_separator
    }

    fn localise_decimal(&self, rendered: &str) -> String {
        if self.decimal_separator == '.' {
            rendered.to_owned()
        } else {
            rendered.replacen('.', &self.decimal_separator.to_string(), 1)
        }
    }
}

impl Default for Culture {
    fn default() -> Self {
        Self::invariant()
    }
}

/// Per-type, culture-aware formatter registry.
///
/// Cloning is cheap; registered formatters are shared.
///
/// # Examples
///
/// ```
/// use stepflow::{Culture, ValueFormattingService};
///
/// let service = ValueFormattingService::new(Culture::from_name("de-DE"))
///     .with_formatter::<bool>(|value, _| if *value { "yes".into() } else { "no".into() });
/// assert_eq!(service.format_value(&2.5_f64), "2,5");
/// assert_eq!(service.format_value(&true), "yes");
/// assert_eq!(service.format_value(&"text"), "text");
/// ```
#[derive(Clone, Default)]
pub struct ValueFormattingService {
    culture: Culture,
    formatters: Arc<HashMap<TypeId, TypeFormatter>>,
}

impl ValueFormattingService {
    /// Create a service for `culture` without custom formatters.
    #[must_use]
    pub fn new(culture: Culture) -> Self {
        Self {
            culture,
            formatters: Arc::default(),
        }
    }

    /// Register a formatter for values of type `T`, replacing any previous one.
    #[must_use]
    pub fn with_formatter<T: Any + Send + Sync>(
        mut self,
        formatter: impl Fn(&T, &Culture) -> String + Send + Sync + 'static,
    ) -> Self {
        let erased: TypeFormatter = Arc::new(move |value, culture| {
            value
                .downcast_ref::<T>()
                .map_or_else(|| UNFORMATTABLE.to_owned(), |typed| formatter(typed, culture))
        });
        Arc::make_mut(&mut self.formatters).insert(TypeId::of::<T>(), erased);
        self
    }

    /// The culture used for rendering.
    #[must_use]
    pub fn culture(&self) -> &Culture {
        &self.culture
    }

    /// Format a value using a registered formatter or its [`Display`] output.
    #[must_use]
    pub fn format_value<T: Any + Send + Sync + Display>(&self, value: &T) -> String {
        if let Some(formatter) = self.formatters.get(&TypeId::of::<T>()) {
            return formatter(value, &self.culture);
        }
        let rendered = value.to_string();
        let any: &dyn Any = value;
        if any.is::<f64>() || any.is::<f32>() {
            self.culture.localise_decimal(&rendered)
        } else {
            rendered
        }
    }

    /// Build a type-erased formatter for parameters holding `T`.
    #[must_use]
    pub fn formatter_for<T: Any + Send + Sync + Display>(&self) -> ParameterFormatter {
        let service = self.clone();
        Arc::new(move |value| {
            value
                .downcast_ref::<T>()
                .map_or_else(|| UNFORMATTABLE.to_owned(), |typed| service.format_value(typed))
        })
    }
}

impl fmt::Debug for ValueFormattingService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueFormattingService")
            .field("culture", &self.culture)
            .field("formatters", &self.formatters.len())
            .finish()
    }
}

/// Substitute positional placeholders in `format` with `arguments`.
///
/// `{{` and `}}` render literal braces. Placeholders without a matching
/// argument, or that are not a plain index, are kept verbatim.
///
/// # Examples
///
/// ```
/// use stepflow::formatting::render_name;
///
/// let args = ["42".to_string(), "Bob".to_string()];
/// assert_eq!(render_name("{1} has {0} {{items}}", &args), "Bob has 42 {items}");
/// assert_eq!(render_name("missing {3}", &args), "missing {3}");
/// ```
#[must_use]
pub fn render_name(format: &str, arguments: &[String]) -> String {
    let mut out = String::with_capacity(format.len());
    let mut chars = format.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut token = String::new();
                let mut closed = false;
                for next in chars.by_ref() {
                    if next == '}' {
                        closed = true;
                        break;
                    }
                    token.push(next);
                }
                let argument = token
                    .trim()
                    .parse::<usize>()
                    .ok()
                    .filter(|_| closed)
                    .and_then(|index| arguments.get(index));
                if let Some(value) = argument {
                    out.push_str(value);
                    continue;
                }
                out.push('{');
                out.push_str(&token);
                if closed {
                    out.push('}');
                }
            }
            other => out.push(other),
        }
    }
    out
}
