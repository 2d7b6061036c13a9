//! Whole-state checkpoints for the vofcap solver.
//!
//! A checkpoint captures the time state and every persisted field of a
//! [`FieldStore`](vofcap_fields::FieldStore) at the end of a time step.
//! The solver only ever asks a [`CheckpointStore`] to write the current
//! state or to read the latest one at startup.
//!
//! # Format
//!
//! ```text
//! [MAGIC "VOFC"] [VERSION u8] [Header]
//! [field count u32] [Field 1] ... [Field N]
//! [FNV-1a hash u64]
//! ```
//!
//! Each field is a length-prefixed name, a kind tag and a length-prefixed
//! array of little-endian `f64`. The trailing hash covers the header and
//! all field data, so truncation and bit flips are both detected.

#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod error;
pub mod hash;
pub mod store;
pub mod types;

pub use error::CheckpointError;
pub use hash::checkpoint_hash;
pub use store::{CheckpointStore, DirectoryStore, MemoryStore};
pub use types::{Checkpoint, CheckpointHeader};

/// Magic bytes at the start of every checkpoint.
pub const MAGIC: [u8; 4] = *b"VOFC";

/// Current binary format version.
pub const FORMAT_VERSION: u8 = 1;
