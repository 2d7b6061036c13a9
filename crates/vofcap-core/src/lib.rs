//! Core types and traits for the vofcap two-phase flow solver.
//!
//! This is the leaf crate of the workspace. It defines the vector type
//! used for velocities and geometry, the [`FieldValue`] abstraction that
//! lets field storage and discretisation stay generic over scalars and
//! vectors, the [`TimeState`] owned by the orchestrator, and the
//! [`Communicator`] trait through which every global reduction passes.

#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod comm;
pub mod error;
pub mod time;
pub mod value;

pub use comm::{Communicator, SerialComm, ThreadComm};
pub use error::CommError;
pub use time::TimeState;
pub use value::{FieldValue, Vector};

/// Small number used to guard divisions, matching the usual `SMALL` of
/// finite-volume codes.
pub const SMALL: f64 = 1e-15;

/// Very small number used where `SMALL` would still bias the result.
pub const VSMALL: f64 = 1e-300;
