//! Finite-volume discretisation for the vofcap solver.
//!
//! - [`fvc`]: explicit operators returning evaluated fields
//!   (interpolation, face-minimum, normal gradient, divergence, Gauss
//!   gradient, flux reconstruction, smoothing).
//! - [`fvm`]: implicit operators returning an assembled [`FvMatrix`]
//!   (Euler time derivative, upwind convection, Laplacian).
//! - [`solver`]: the [`LinearSolver`] contract with a Jacobi-preconditioned
//!   conjugate-gradient and a Gauss-Seidel implementation.
//! - [`limiter`]: the two-sided flux limiter that keeps explicit transport
//!   of a bounded scalar inside its bounds.

#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod fvc;
pub mod fvm;
pub mod limiter;
pub mod matrix;
pub mod solver;

pub use error::SolveError;
pub use matrix::FvMatrix;
pub use solver::{
    solve_vector, GaussSeidel, LinearSolver, Pcg, SolverControls, SolverPerformance,
};
