//! Session domain module.
//!
//! This module contains the form session controller, its state types, and
//! the collaborator interfaces it calls.
//!
//! # Module Structure
//!
//! - `model`: State types (`Mode`, `Status`, `StatusMessage`, `SessionSnapshot`, outcomes)
//! - `collaborator`: Save/refresh collaborator traits (`RecordSaver`, `RecordSource`)
//! - `controller`: The state machine (`FormSession`)
//! - `auto_save`: Debounced auto-save timer (internal)
//!
//! # Usage
//!
//! ```ignore
//! use formsession_core::session::{FormSession, RecordSaver, SaveOutcome};
//! ```

mod auto_save;
mod collaborator;
mod controller;
mod model;

#[cfg(test)]
mod controller_test;

// Re-export public API
pub use collaborator::{InMemoryRecordStore, RecordSaver, RecordSource};
pub use controller::{FormSession, FormSessionBuilder};
pub use model::{
    MessageKind, Mode, RefreshOutcome, ReseedOutcome, SaveOutcome, SessionSnapshot, Status,
    StatusMessage,
};
