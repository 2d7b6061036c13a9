//! Field storage for the vofcap solver.
//!
//! [`VolField`] holds one value per cell plus one per boundary face, with
//! a boundary condition per patch and an optional old-time copy.
//! [`SurfaceField`] holds one value per face. [`FieldStore`] owns every
//! field the time-stepping controller reads or writes, and converts them
//! to and from named [`FieldRecord`]s for checkpointing.

#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod bc;
pub mod error;
pub mod record;
pub mod store;
pub mod surface;
pub mod vol;

pub use bc::Bc;
pub use error::FieldError;
pub use record::{FieldKind, FieldRecord};
pub use store::{alpha_bc, pressure_bc, velocity_bc, FieldStore};
pub use surface::SurfaceField;
pub use vol::VolField;
