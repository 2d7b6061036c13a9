//! Physical models plugged into the vofcap solver.
//!
//! Each model sits behind a narrow trait so the time-stepping core never
//! depends on a concrete closure:
//!
//! - [`mixture`]: density, viscosity and interface geometry of the
//!   two-phase mixture.
//! - [`turbulence`]: the [`TurbulenceModel`] contract with laminar and
//!   Smagorinsky closures.
//! - [`waves`]: the [`WaveForcing`] contract and relaxation zones.
//! - [`sources`]: generic momentum sources.
//! - [`mrf`]: moving reference frame zones.

#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod mixture;
pub mod mrf;
pub mod sources;
pub mod turbulence;
pub mod waves;

pub use mixture::{ImmiscibleMixture, PhaseProperties};
pub use mrf::MrfZone;
pub use sources::{CellSelection, ExplicitBodyForce, LinearDamping, MomentumSource, SourceSet};
pub use turbulence::{Laminar, Smagorinsky, TurbulenceModel};
pub use waves::{AiryWave, NoWaveForcing, RelaxationZone, WaveForcing};
