//! Session state types.

use serde::{Deserialize, Serialize};

use crate::error::FormSessionError;
use crate::validation::FieldErrors;

/// Whether the record is displayed read-only or open for editing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Viewing,
    Editing,
}

/// The single asynchronous operation in flight, if any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Idle,
    Saving,
    Refreshing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Error,
    Success,
}

/// A dismissible top-level message for the presentation layer to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub kind: MessageKind,
    pub text: String,
}

impl StatusMessage {
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Error,
            text: text.into(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Success,
            text: text.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == MessageKind::Error
    }

    pub fn is_success(&self) -> bool {
        self.kind == MessageKind::Success
    }
}

/// Point-in-time copy of a session, suitable for rendering or shipping to a
/// front-end as JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot<R> {
    pub current: R,
    pub original: R,
    pub mode: Mode,
    pub errors: FieldErrors,
    pub status: Status,
    pub message: Option<StatusMessage>,
    pub is_dirty: bool,
    pub has_pending_reseed: bool,
}

impl<R> SessionSnapshot<R> {
    pub fn is_editing(&self) -> bool {
        self.mode == Mode::Editing
    }

    pub fn is_saving(&self) -> bool {
        self.status == Status::Saving
    }

    pub fn is_refreshing(&self) -> bool {
        self.status == Status::Refreshing
    }
}

/// Result of [`crate::session::FormSession::save`].
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// The collaborator accepted the record; the session is back in viewing mode.
    Saved,
    /// Validation failed; the collaborator was not called.
    Invalid(FieldErrors),
    /// The collaborator reported a failure.
    Failed(FormSessionError),
    /// Another save or refresh was already in flight.
    Skipped,
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveOutcome::Saved)
    }
}

/// Result of [`crate::session::FormSession::refresh`].
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Refreshed,
    Failed(FormSessionError),
    /// No refresh collaborator is configured.
    Unavailable,
    /// Another save or refresh was already in flight.
    Skipped,
}

impl RefreshOutcome {
    pub fn is_refreshed(&self) -> bool {
        matches!(self, RefreshOutcome::Refreshed)
    }
}

/// Result of [`crate::session::FormSession::reseed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReseedOutcome {
    /// Both snapshots now hold the new data.
    Applied,
    /// Unsaved edits are open; the new data is held until the edit ends.
    Deferred,
    /// The new data equals the committed baseline.
    Unchanged,
}
