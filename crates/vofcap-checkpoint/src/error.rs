//! Error types for checkpoint encoding, decoding and restore.

use std::io;

use vofcap_fields::FieldError;

/// Errors raised while writing, reading or applying a checkpoint.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// An I/O error occurred during read or write.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The data does not start with the `b"VOFC"` magic bytes.
    #[error("invalid magic bytes (expected b\"VOFC\")")]
    InvalidMagic,
    /// The format version is not supported by this build.
    #[error("unsupported format version {found}")]
    UnsupportedVersion {
        /// The version found in the data.
        found: u8,
    },
    /// A record could not be decoded.
    #[error("malformed checkpoint: {detail}")]
    Malformed {
        /// What went wrong.
        detail: String,
    },
    /// The trailing hash does not match the decoded content.
    #[error("checkpoint hash mismatch: recorded={recorded:#018x}, computed={computed:#018x}")]
    HashMismatch {
        /// Hash stored in the data.
        recorded: u64,
        /// Hash of the decoded content.
        computed: u64,
    },
    /// The checkpoint was taken on a mesh of a different size.
    #[error(
        "checkpoint is for {found_cells} cells / {found_faces} faces, \
         mesh has {expected_cells} / {expected_faces}"
    )]
    ShapeMismatch {
        /// Cells in the current mesh.
        expected_cells: u64,
        /// Faces in the current mesh.
        expected_faces: u64,
        /// Cells recorded in the checkpoint.
        found_cells: u64,
        /// Faces recorded in the checkpoint.
        found_faces: u64,
    },
    /// A field record does not fit its target field.
    #[error(transparent)]
    Field(#[from] FieldError),
}
