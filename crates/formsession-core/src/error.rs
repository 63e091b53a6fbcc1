//! Error types for form sessions.

use serde::Serialize;
use thiserror::Error;

use crate::validation::FieldErrors;

/// A shared error type for the form session library.
///
/// Session operations never return these as hard failures; `save` and
/// `refresh` report them inside their outcome types so the session stays
/// usable. Config loading and the validation helpers return them through
/// [`Result`].
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum FormSessionError {
    /// Field-scoped validation failure that blocks a save
    #[error("Validation failed for {} field(s)", .fields.len())]
    Validation { fields: FieldErrors },

    /// A save or refresh collaborator reported a failure
    #[error("{operation} failed: {reason}")]
    Operation {
        operation: &'static str,
        reason: String,
    },

    /// Missing collaborator or invalid configuration value
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error (config file access)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization { format: String, message: String },
}

impl FormSessionError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a Validation error from a non-empty error map
    pub fn validation(fields: FieldErrors) -> Self {
        Self::Validation { fields }
    }

    /// Creates an Operation error
    pub fn operation(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Operation {
            operation,
            reason: reason.into(),
        }
    }

    /// Creates a Configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    pub fn is_operation(&self) -> bool {
        matches!(self, Self::Operation { .. })
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Text suitable for a top-level status message.
    ///
    /// Operation errors show only the collaborator's reason, which is what
    /// the user needs to see next to the form.
    pub fn display_text(&self) -> String {
        match self {
            Self::Operation { reason, .. } => reason.clone(),
            other => other.to_string(),
        }
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for FormSessionError {
    fn from(err: std::io::Error) -> Self {
        Self::io(format!("{} (kind: {:?})", err, err.kind()))
    }
}

impl From<serde_json::Error> for FormSessionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for FormSessionError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for FormSessionError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, FormSessionError>`.
pub type Result<T> = std::result::Result<T, FormSessionError>;
