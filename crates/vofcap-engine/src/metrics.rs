//! Per-step metrics for the time loop.
//!
//! [`StepMetrics`] captures timings, iteration counts and the numerical
//! health indicators of a single time step. The simulation fills one after
//! each `step()` call.

/// Timing and convergence data collected during a single time step.
///
/// All durations are in microseconds.
#[derive(Clone, Debug, Default)]
pub struct StepMetrics {
    /// Time index reached by the step.
    pub time_index: u64,
    /// Time step used.
    pub delta_t: f64,
    /// Wall-clock time for the whole step.
    pub total_us: u64,
    /// Time spent in mesh-engine updates.
    pub mesh_update_us: u64,
    /// Time spent repairing masks and fluxes after mesh changes.
    pub mask_repair_us: u64,
    /// Time spent advecting the phase fraction.
    pub alpha_us: u64,
    /// Time spent assembling and solving momentum.
    pub momentum_us: u64,
    /// Time spent in pressure correctors.
    pub pressure_us: u64,
    /// Time spent in the velocity cap.
    pub cap_us: u64,
    /// Time spent writing a checkpoint.
    pub checkpoint_us: u64,
    /// Outer iterations performed.
    pub outer_iterations: u32,
    /// Phase-advection sub-steps of the last outer iteration.
    pub alpha_subcycles: u32,
    /// Mean and maximum flow Courant number before the step.
    pub courant: (f64, f64),
    /// Maximum interface Courant number before the step.
    pub alpha_courant: f64,
    /// Mesh-motion Courant number, when checked.
    pub mesh_courant: Option<f64>,
    /// Continuity errors of the last pressure corrector.
    pub continuity: ContinuityErrors,
    /// Extremes of `alpha1` after the last sub-step.
    pub alpha_bounds: (f64, f64),
    /// Linear solves that did not converge or were singular.
    pub solver_warnings: u32,
    /// Whether the mesh reported a change during the step.
    pub mesh_changed: bool,
    /// Whether the velocity cap was due on this step.
    pub u_cap_ran: bool,
    /// Global phase-1 maximum speed used by the cap; `None` when it did
    /// not run or found no liquid.
    pub u_cap_max: Option<f64>,
    /// Cells rescaled by the cap on this partition.
    pub capped_cells: usize,
    /// Whether a checkpoint was written.
    pub checkpoint_written: bool,
}

/// Time-step continuity errors.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ContinuityErrors {
    /// Volume-weighted mean `|div phi| Δt`.
    pub local: f64,
    /// Volume-weighted signed mean `div phi Δt`.
    pub global: f64,
    /// Running sum of `global` over the run.
    pub cumulative: f64,
}
