//! Declarative per-field rules for [`FieldMap`] records.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use super::{FieldErrors, Validator};
use crate::record::{FieldMap, FieldValue};

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// A single check applied to one field.
#[derive(Clone)]
pub enum Rule {
    /// Field must be present and not blank.
    Required { message: String },
    /// Non-blank text must look like an email address.
    Email { message: String },
    /// Non-blank text must have at least `min` characters.
    MinLength { min: usize, message: String },
    /// Text must have at most `max` characters.
    MaxLength { max: usize, message: String },
    /// Arbitrary check; returns `Some(message)` on failure.
    Custom(Arc<dyn Fn(Option<&FieldValue>) -> Option<String> + Send + Sync>),
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Required { message } => f.debug_struct("Required").field("message", message).finish(),
            Rule::Email { message } => f.debug_struct("Email").field("message", message).finish(),
            Rule::MinLength { min, message } => f
                .debug_struct("MinLength")
                .field("min", min)
                .field("message", message)
                .finish(),
            Rule::MaxLength { max, message } => f
                .debug_struct("MaxLength")
                .field("max", max)
                .field("message", message)
                .finish(),
            Rule::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl Rule {
    fn check(&self, value: Option<&FieldValue>) -> Option<String> {
        let blank = value.is_none_or(FieldValue::is_blank);
        let text = value.and_then(FieldValue::as_text).map(str::trim);

        match self {
            Rule::Required { message } => blank.then(|| message.clone()),
            Rule::Email { message } => match text {
                Some(t) if !t.is_empty() && !EMAIL_PATTERN.is_match(t) => Some(message.clone()),
                _ => None,
            },
            Rule::MinLength { min, message } => match text {
                Some(t) if !t.is_empty() && t.chars().count() < *min => Some(message.clone()),
                _ => None,
            },
            Rule::MaxLength { max, message } => match text {
                Some(t) if t.chars().count() > *max => Some(message.clone()),
                _ => None,
            },
            Rule::Custom(check) => check(value),
        }
    }
}

/// Ordered list of `(field, rule)` pairs. The first failing rule for a field
/// wins; later rules for that field are skipped.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<(String, Rule)>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, field: impl Into<String>, rule: Rule) -> Self {
        self.rules.push((field.into(), rule));
        self
    }

    pub fn required(self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.rule(
            field,
            Rule::Required {
                message: message.into(),
            },
        )
    }

    /// Required plus email-pattern check on the same field.
    pub fn email(
        self,
        field: impl Into<String>,
        required_message: impl Into<String>,
        invalid_message: impl Into<String>,
    ) -> Self {
        let field = field.into();
        self.required(field.clone(), required_message).rule(
            field,
            Rule::Email {
                message: invalid_message.into(),
            },
        )
    }

    pub fn min_length(self, field: impl Into<String>, min: usize, message: impl Into<String>) -> Self {
        self.rule(
            field,
            Rule::MinLength {
                min,
                message: message.into(),
            },
        )
    }

    pub fn max_length(self, field: impl Into<String>, max: usize, message: impl Into<String>) -> Self {
        self.rule(
            field,
            Rule::MaxLength {
                max,
                message: message.into(),
            },
        )
    }

    pub fn custom<F>(self, field: impl Into<String>, check: F) -> Self
    where
        F: Fn(Option<&FieldValue>) -> Option<String> + Send + Sync + 'static,
    {
        self.rule(field, Rule::Custom(Arc::new(check)))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Validator<FieldMap> for RuleSet {
    fn validate(&self, data: &FieldMap) -> FieldErrors {
        let mut errors = FieldErrors::new();
        for (field, rule) in &self.rules {
            if errors.contains_key(field) {
                continue;
            }
            if let Some(message) = rule.check(data.get(field)) {
                errors.insert(field.clone(), message);
            }
        }
        errors
    }
}
