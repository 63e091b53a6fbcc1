//! View/edit state machine for editable dashboard records.
//!
//! A [`FormSession`] holds the committed and working copies of a record,
//! tracks dirtiness and validation errors, and drives save/refresh through
//! caller-supplied collaborators. Rendering is left to the host; it reads
//! [`SessionSnapshot`]s and calls the action API.

pub mod config;
pub mod error;
pub mod record;
pub mod session;
pub mod validation;

// Re-export common types
pub use config::FormSessionConfig;
pub use error::{FormSessionError, Result};
pub use record::{FieldMap, FieldValue, Mergeable};
pub use session::{
    FormSession, InMemoryRecordStore, MessageKind, Mode, RecordSaver, RecordSource, RefreshOutcome,
    ReseedOutcome, SaveOutcome, SessionSnapshot, Status, StatusMessage,
};
pub use validation::{FieldErrors, RuleSet, Validator};
