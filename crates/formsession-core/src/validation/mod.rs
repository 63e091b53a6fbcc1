//! Validation domain module.
//!
//! Validators are pure and synchronous: they inspect a record and return a
//! map from field name to message. An empty map means the record is valid.
//!
//! # Module Structure
//!
//! - `rules`: declarative per-field rules for `FieldMap` records (`RuleSet`)
//!
//! # Usage
//!
//! ```ignore
//! use formsession_core::validation::{FieldErrors, RuleSet, Validator};
//! ```

mod rules;

use std::collections::BTreeMap;

use crate::error::{FormSessionError, Result};

pub use rules::{Rule, RuleSet};

/// Field name to error message. Ordered so snapshots are deterministic.
pub type FieldErrors = BTreeMap<String, String>;

/// A pure, synchronous record validator.
pub trait Validator<R>: Send + Sync {
    fn validate(&self, data: &R) -> FieldErrors;
}

impl<R, F> Validator<R> for F
where
    F: Fn(&R) -> FieldErrors + Send + Sync,
{
    fn validate(&self, data: &R) -> FieldErrors {
        self(data)
    }
}

/// Accepts every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl<R> Validator<R> for AcceptAll {
    fn validate(&self, _data: &R) -> FieldErrors {
        FieldErrors::new()
    }
}

/// Runs `validator` and converts a non-empty error map into
/// [`FormSessionError::Validation`].
pub fn check<R>(validator: &dyn Validator<R>, data: &R) -> Result<()> {
    let errors = validator.validate(data);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(FormSessionError::validation(errors))
    }
}
