//! Error types for field construction and restore.

use crate::record::FieldKind;

/// Errors raised when field data does not fit the mesh or the store.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FieldError {
    /// A value array has the wrong length for the mesh.
    #[error("field '{field}' expects {expected} values, got {found}")]
    LengthMismatch {
        /// Field name.
        field: String,
        /// Length required by the mesh.
        expected: usize,
        /// Length supplied.
        found: usize,
    },
    /// A field required for restore is absent.
    #[error("field '{name}' is missing")]
    MissingField {
        /// Field name.
        name: String,
    },
    /// A stored record has a different kind than the target field.
    #[error("field '{field}' is stored as {found:?}, expected {expected:?}")]
    KindMismatch {
        /// Field name.
        field: String,
        /// Kind of the target field.
        expected: FieldKind,
        /// Kind found in the record.
        found: FieldKind,
    },
}
