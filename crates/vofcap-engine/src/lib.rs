//! Time-stepping controller for two-phase, overset VOF simulations.
//!
//! The [`Simulation`] owns the mesh engine, the field state and the
//! physical models, and advances them one time step at a time through a
//! PIMPLE outer loop: mask repair after mesh changes, subcycled phase
//! advection, momentum prediction and pressure correction. A periodic
//! [`VelocityCap`] bounds gas velocities by the fastest liquid speed
//! across all partitions, and checkpoints are written through a
//! [`CheckpointStore`](vofcap_checkpoint::CheckpointStore).
//!
//! Stages are plain functions and small structs that borrow exactly the
//! state they touch; [`Simulation::step`] sequences them.

#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod alpha;
pub mod config;
pub mod error;
pub mod metrics;
pub mod momentum;
pub mod overset;
pub mod pimple;
pub mod pressure;
pub mod simulation;
pub mod state;
pub mod timestep;
pub mod velocity_cap;

pub use alpha::{AlphaReport, AlphaSubcycler};
pub use config::{ConfigError, SolverConfig};
pub use error::StepError;
pub use metrics::{ContinuityErrors, StepMetrics};
pub use momentum::{MomentumModels, MomentumPredictor};
pub use overset::{MaskManager, RepairReport};
pub use pimple::PimpleControl;
pub use pressure::{PressureCorrector, PressureOutcome};
pub use simulation::{Simulation, SimulationBuilder};
pub use state::SimState;
pub use timestep::{CourantNumbers, GlobalCourant, LocalTimeStepping, TimeStepPolicy};
pub use velocity_cap::{CapReport, VelocityCap};
