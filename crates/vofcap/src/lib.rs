//! vofcap: a time-stepping controller for two-phase, overset VOF flows.
//!
//! This facade re-exports the public API of the vofcap sub-crates. Most
//! users only need this crate and its [`prelude`].
//!
//! # Quick start
//!
//! ```rust
//! use vofcap::prelude::*;
//!
//! // A 4x1x4 closed tank with a liquid column in one corner.
//! let mesh = BlockMesh::new([4, 1, 4], Vector::new(1.0, 0.25, 1.0))
//!     .build()
//!     .unwrap();
//! let mut fields = FieldStore::new(&mesh);
//! for (i, c) in mesh.cell_centres().iter().enumerate() {
//!     fields.alpha1[i] = if c.x < 0.5 && c.z < 0.5 { 1.0 } else { 0.0 };
//! }
//! fields.update_alpha2();
//!
//! let config = SolverConfig::from_json_str(
//!     r#"{
//!         "u_cap_period": 2,
//!         "time": { "end_time": 0.002, "delta_t": 0.001, "adjust_time_step": false }
//!     }"#,
//! )
//! .unwrap();
//! let mut sim = Simulation::builder(config, Box::new(StaticMesh::new(mesh)))
//!     .fields(fields)
//!     .build()
//!     .unwrap();
//! assert_eq!(sim.run().unwrap(), 2);
//! assert!(sim.last_metrics().u_cap_ran);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `vofcap-core` | Vectors, time state, communicators |
//! | [`mesh`] | `vofcap-mesh` | Polyhedral meshes and mesh engines |
//! | [`fields`] | `vofcap-fields` | Cell and face fields, boundary conditions |
//! | [`fvm`] | `vofcap-fvm` | Discretisation, limiter and linear solvers |
//! | [`models`] | `vofcap-models` | Mixture, turbulence, waves, sources |
//! | [`checkpoint`] | `vofcap-checkpoint` | Checkpoint codec and stores |
//! | [`engine`] | `vofcap-engine` | The time loop and its stages |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Vectors, time state and communicators (`vofcap-core`).
pub use vofcap_core as types;

/// Meshes and mesh engines (`vofcap-mesh`).
///
/// [`mesh::BlockMesh`] builds structured boxes; [`mesh::StaticMesh`],
/// [`mesh::TranslatingMesh`] and [`mesh::OversetBoxMesh`] implement
/// [`mesh::MeshEngine`].
pub use vofcap_mesh as mesh;

/// Cell and face fields (`vofcap-fields`).
pub use vofcap_fields as fields;

/// Finite-volume operators and linear solvers (`vofcap-fvm`).
pub use vofcap_fvm as fvm;

/// Physical models (`vofcap-models`).
pub use vofcap_models as models;

/// Checkpoint format and stores (`vofcap-checkpoint`).
pub use vofcap_checkpoint as checkpoint;

/// The time loop (`vofcap-engine`).
///
/// [`engine::Simulation`] runs the steps; the stage types
/// ([`engine::AlphaSubcycler`], [`engine::MomentumPredictor`],
/// [`engine::PressureCorrector`], [`engine::VelocityCap`]) can be driven
/// on their own for testing.
pub use vofcap_engine as engine;

/// Common imports for building and running a simulation.
pub mod prelude {
    pub use vofcap_checkpoint::{CheckpointStore, DirectoryStore, MemoryStore};
    pub use vofcap_core::{Communicator, SerialComm, ThreadComm, TimeState, Vector};
    pub use vofcap_engine::{
        ConfigError, Simulation, SimulationBuilder, SolverConfig, StepError, StepMetrics,
    };
    pub use vofcap_fields::FieldStore;
    pub use vofcap_mesh::{
        BlockMesh, CellClass, MeshChange, MeshEngine, OversetBoxMesh, PatchKind, PolyMesh,
        Side, StaticMesh, TranslatingMesh,
    };
    pub use vofcap_models::{ImmiscibleMixture, PhaseProperties, TurbulenceModel, WaveForcing};
}
