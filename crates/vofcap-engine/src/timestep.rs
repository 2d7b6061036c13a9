//! Time-step control: Courant numbers, the global adaptive step and local
//! time-stepping rates.
//!
//! The policy is chosen once from the configuration as a
//! [`TimeStepPolicy`]; the orchestrator calls it before every step.

use vofcap_core::{CommError, Communicator, SMALL};
use vofcap_fields::FieldStore;
use vofcap_fvm::fvc;
use vofcap_mesh::PolyMesh;

use crate::config::SolverConfig;

/// Phase fraction band that counts as "near the interface".
pub const INTERFACE_BAND: (f64, f64) = (0.01, 0.99);

/// True when `alpha1` lies strictly inside [`INTERFACE_BAND`].
pub fn near_interface(alpha1: f64) -> bool {
    alpha1 > INTERFACE_BAND.0 && alpha1 < INTERFACE_BAND.1
}

/// Cells that carry the interface: those inside [`INTERFACE_BAND`] and
/// both cells of any internal face across which `alpha1` crosses one half.
///
/// The second rule keeps a sharp 0/1 front visible.
pub fn interface_cells(mesh: &PolyMesh, alpha1: &[f64]) -> Vec<bool> {
    let mut selected: Vec<bool> = alpha1.iter().map(|a| near_interface(*a)).collect();
    let owner = mesh.owner();
    for (f, &n) in mesh.neighbour().iter().enumerate() {
        let o = owner[f];
        if (alpha1[o] - 0.5) * (alpha1[n] - 0.5) < 0.0 {
            selected[o] = true;
            selected[n] = true;
        }
    }
    selected
}

// ── Courant numbers ────────────────────────────────────────────────

/// Mean and maximum Courant number of a flux field.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CourantNumbers {
    /// Volume-weighted mean.
    pub mean: f64,
    /// Maximum over the selected cells.
    pub max: f64,
}

fn masked_sum_mag(mesh: &PolyMesh, phi: &[f64], face_mask: &[f64]) -> Vec<f64> {
    let masked: Vec<f64> = phi.iter().zip(face_mask).map(|(p, m)| p * m).collect();
    fvc::surface_sum_mag(mesh, &masked)
}

fn courant_over(
    mesh: &PolyMesh,
    sum_phi: &[f64],
    delta_t: f64,
    select: impl Fn(usize) -> bool,
    comm: &dyn Communicator,
) -> Result<CourantNumbers, CommError> {
    let vol = mesh.cell_volumes();
    let mut local_max = 0.0f64;
    let mut local_sum = 0.0;
    let mut local_vol = 0.0;
    for (i, s) in sum_phi.iter().enumerate() {
        if select(i) {
            local_max = local_max.max(s / vol[i]);
            local_sum += s;
            local_vol += vol[i];
        }
    }
    // Three reductions: every rank contributes even with nothing selected.
    let max = comm.all_reduce_max(local_max)?;
    let sum = comm.all_reduce_sum(local_sum)?;
    let total_vol = comm.all_reduce_sum(local_vol)?;
    Ok(CourantNumbers {
        mean: 0.5 * sum / total_vol.max(SMALL) * delta_t,
        max: 0.5 * max * delta_t,
    })
}

/// Flow Courant number over all active faces.
pub fn courant_number(
    mesh: &PolyMesh,
    fields: &FieldStore,
    delta_t: f64,
    comm: &dyn Communicator,
) -> Result<CourantNumbers, CommError> {
    let sum_phi = masked_sum_mag(mesh, fields.phi.values(), fields.face_mask.values());
    courant_over(mesh, &sum_phi, delta_t, |_| true, comm)
}

/// Courant number restricted to cells near the interface.
pub fn alpha_courant_number(
    mesh: &PolyMesh,
    fields: &FieldStore,
    delta_t: f64,
    comm: &dyn Communicator,
) -> Result<CourantNumbers, CommError> {
    let sum_phi = masked_sum_mag(mesh, fields.phi.values(), fields.face_mask.values());
    let interface = interface_cells(mesh, fields.alpha1.values());
    courant_over(mesh, &sum_phi, delta_t, |i| interface[i], comm)
}

/// Courant number of the mesh-motion flux.
pub fn mesh_courant_number(
    mesh: &PolyMesh,
    mesh_phi: &[f64],
    delta_t: f64,
    comm: &dyn Communicator,
) -> Result<CourantNumbers, CommError> {
    let sum_phi = fvc::surface_sum_mag(mesh, mesh_phi);
    courant_over(mesh, &sum_phi, delta_t, |_| true, comm)
}

// ── Policies ───────────────────────────────────────────────────────

/// The time-step policy, fixed for the run.
#[derive(Clone, Debug, PartialEq)]
pub enum TimeStepPolicy {
    /// One step for every cell, bounded by Courant limits.
    GlobalCourant(GlobalCourant),
    /// Per-cell pseudo time steps.
    LocalTimeStepping(LocalTimeStepping),
}

impl TimeStepPolicy {
    /// Select the policy named by `cfg`.
    pub fn from_config(cfg: &SolverConfig) -> Self {
        if cfg.lts.enabled {
            TimeStepPolicy::LocalTimeStepping(LocalTimeStepping {
                max_co: cfg.lts.max_co,
                max_alpha_co: cfg.lts.max_alpha_co,
                max_delta_t: cfg.lts.max_delta_t,
                smoothing_coeff: cfg.lts.smoothing_coeff,
                damping_coeff: cfg.lts.damping_coeff,
            })
        } else {
            TimeStepPolicy::GlobalCourant(GlobalCourant {
                adjust: cfg.time.adjust_time_step,
                max_co: cfg.courant.max_co,
                max_alpha_co: cfg.courant.max_alpha_co,
                max_delta_t: cfg.time.max_delta_t,
                min_delta_t: cfg.time.min_delta_t,
                max_mesh_co: cfg.courant.check_mesh_courant.then_some(cfg.courant.max_mesh_co),
            })
        }
    }

    /// True for local time stepping.
    pub fn is_local(&self) -> bool {
        matches!(self, TimeStepPolicy::LocalTimeStepping(_))
    }
}

/// Adaptive global time step.
#[derive(Clone, Debug, PartialEq)]
pub struct GlobalCourant {
    /// Adapt at all; when false the step never changes.
    pub adjust: bool,
    /// Flow Courant limit.
    pub max_co: f64,
    /// Interface Courant limit.
    pub max_alpha_co: f64,
    /// Largest step.
    pub max_delta_t: f64,
    /// Smallest step, applied last.
    pub min_delta_t: f64,
    /// Mesh-motion Courant limit, when checked.
    pub max_mesh_co: Option<f64>,
}

impl GlobalCourant {
    /// Step before the first iteration, reduced if the initial flux is
    /// already beyond the limit. Never grows the step.
    pub fn initial_delta_t(&self, delta_t: f64, co: f64) -> f64 {
        if !self.adjust || co <= SMALL {
            return delta_t;
        }
        (self.max_co * delta_t / co).min(delta_t.min(self.max_delta_t))
    }

    /// Next step from the Courant numbers of the current step.
    ///
    /// Growth is damped to at most 20% per step while reductions take
    /// effect immediately, so `co * next / delta_t <= max_co` whenever
    /// `min_delta_t` does not bind. The mesh Courant number, when given
    /// and checked, bounds the step the same way.
    pub fn next_delta_t(&self, delta_t: f64, co: f64, alpha_co: f64, mesh_co: Option<f64>) -> f64 {
        if !self.adjust {
            return delta_t;
        }
        let f = (self.max_co / (co + SMALL)).min(self.max_alpha_co / (alpha_co + SMALL));
        let mut next = f.min(1.0 + 0.1 * f).min(1.2) * delta_t;
        next = next.min(self.max_delta_t);
        if let (Some(limit), Some(mco)) = (self.max_mesh_co, mesh_co) {
            if mco > SMALL {
                next = next.min(limit * delta_t / mco);
            }
        }
        next.max(self.min_delta_t)
    }
}

/// Local (per-cell) pseudo time stepping.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalTimeStepping {
    /// Flow Courant limit per cell.
    pub max_co: f64,
    /// Interface Courant limit per cell.
    pub max_alpha_co: f64,
    /// Largest local step.
    pub max_delta_t: f64,
    /// Neighbour smoothing coefficient.
    pub smoothing_coeff: f64,
    /// Allowed fractional drop of a rate per step.
    pub damping_coeff: f64,
}

impl LocalTimeStepping {
    /// Recompute the per-cell rates in place.
    ///
    /// `r_delta_t` holds the previous rates on entry; they damp the new
    /// ones when `damp` is set (every step after the first). Returns the
    /// global smallest and largest local time step.
    pub fn update_rates(
        &self,
        mesh: &PolyMesh,
        fields: &FieldStore,
        r_delta_t: &mut [f64],
        damp: bool,
        comm: &dyn Communicator,
    ) -> Result<(f64, f64), CommError> {
        let sum_phi = masked_sum_mag(mesh, fields.phi.values(), fields.face_mask.values());
        let vol = mesh.cell_volumes();
        let interface = interface_cells(mesh, fields.alpha1.values());
        let previous = r_delta_t.to_vec();

        for (i, r) in r_delta_t.iter_mut().enumerate() {
            let rate = sum_phi[i] / vol[i];
            *r = (1.0 / self.max_delta_t).max(rate / (2.0 * self.max_co));
            if interface[i] {
                *r = r.max(rate / (2.0 * self.max_alpha_co));
            }
        }

        fvc::smooth(mesh, r_delta_t, self.smoothing_coeff);

        if damp && self.damping_coeff < 1.0 {
            for (r, r0) in r_delta_t.iter_mut().zip(&previous) {
                *r = r.max((1.0 - self.damping_coeff) * r0);
            }
        }

        let local_max = r_delta_t.iter().copied().fold(0.0f64, f64::max);
        let local_min = r_delta_t.iter().copied().fold(f64::INFINITY, f64::min);
        let max_rate = comm.all_reduce_max(local_max)?;
        let min_rate = comm.all_reduce_min(local_min)?;
        Ok((1.0 / max_rate.max(SMALL), 1.0 / min_rate.max(SMALL)))
    }
}
