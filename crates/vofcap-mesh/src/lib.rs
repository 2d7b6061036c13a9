//! Finite-volume mesh geometry and the mesh-engine interface.
//!
//! [`PolyMesh`] stores face-addressed geometry in the usual
//! owner/neighbour form: internal faces first, boundary faces grouped by
//! patch after them. [`MeshEngine`] is the narrow interface through which
//! the solver asks an external motion/topology engine to move the mesh and
//! report overset cell classification. Three reference engines are
//! provided: [`StaticMesh`], [`OversetBoxMesh`] and [`TranslatingMesh`].

#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod block;
pub mod engine;
pub mod error;
pub mod moving;
pub mod overset;
pub mod poly;

pub use block::{BlockMesh, Side};
pub use engine::{CellClass, MeshChange, MeshEngine, StaticMesh};
pub use error::MeshError;
pub use moving::TranslatingMesh;
pub use overset::OversetBoxMesh;
pub use poly::{LduAddressing, Patch, PatchKind, PolyMesh};
