//! Record domain module.
//!
//! A form session is generic over the record it edits. Any `Clone + PartialEq`
//! type works; dirtiness is plain structural equality, so records should keep
//! unordered collections in ordered containers (`BTreeSet`, `BTreeMap`).
//!
//! # Module Structure
//!
//! - `field_map`: dynamic, string-keyed record (`FieldMap`, `FieldValue`)
//!
//! # Usage
//!
//! ```ignore
//! use formsession_core::record::{FieldMap, FieldValue, Mergeable};
//! ```

mod field_map;

pub use field_map::{FieldMap, FieldValue};

/// Records that accept a partial update.
///
/// `merge` must return a new value and leave `self` untouched; the session
/// compares the result against its committed baseline to decide dirtiness.
pub trait Mergeable: Sized {
    /// The partial-record type accepted by [`Mergeable::merge`].
    type Patch;

    fn merge(&self, patch: Self::Patch) -> Self;
}
