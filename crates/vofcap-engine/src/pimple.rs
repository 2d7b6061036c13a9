//! PIMPLE outer-iteration control.

use crate::config::PimpleControls;

/// Counts outer iterations and decides which one is final.
///
/// ```
/// use vofcap_engine::config::PimpleControls;
/// use vofcap_engine::PimpleControl;
///
/// let mut pimple = PimpleControl::new(&PimpleControls {
///     n_outer_correctors: 3,
///     ..PimpleControls::default()
/// });
/// let mut finals = Vec::new();
/// while pimple.next_outer() {
///     finals.push(pimple.is_final());
/// }
/// assert_eq!(finals, [false, false, true]);
/// ```
#[derive(Clone, Debug)]
pub struct PimpleControl {
    n_outer: u32,
    n_correctors: u32,
    outer_tolerance: Option<f64>,
    turb_on_final_only: bool,
    move_mesh_outer: bool,
    outer: u32,
}

impl PimpleControl {
    /// Control for one time step.
    pub fn new(cfg: &PimpleControls) -> Self {
        Self {
            n_outer: cfg.n_outer_correctors.max(1),
            n_correctors: cfg.n_correctors.max(1),
            outer_tolerance: cfg.outer_tolerance,
            turb_on_final_only: cfg.turb_on_final_iter_only,
            move_mesh_outer: cfg.move_mesh_outer_correctors,
            outer: 0,
        }
    }

    /// Start the next outer iteration; false once the step is done.
    pub fn next_outer(&mut self) -> bool {
        if self.outer >= self.n_outer {
            return false;
        }
        self.outer += 1;
        true
    }

    /// Current outer iteration, from 1.
    pub fn outer(&self) -> u32 {
        self.outer
    }

    /// True on the first outer iteration.
    pub fn first_iter(&self) -> bool {
        self.outer == 1
    }

    /// True on the last outer iteration of the step.
    pub fn is_final(&self) -> bool {
        self.outer >= self.n_outer
    }

    /// Pressure correctors per outer iteration.
    pub fn n_correctors(&self) -> u32 {
        self.n_correctors
    }

    /// Whether the mesh may move on this outer iteration.
    pub fn update_mesh(&self) -> bool {
        self.first_iter() || self.move_mesh_outer
    }

    /// Whether the turbulence model is corrected on this iteration.
    pub fn turb_corr(&self) -> bool {
        !self.turb_on_final_only || self.is_final()
    }

    /// Record the initial pressure residual of this iteration. Below the
    /// outer tolerance, the next iteration becomes the final one.
    pub fn record_residual(&mut self, initial: f64) {
        if let Some(tol) = self.outer_tolerance {
            // One more iteration runs with final settings.
            if initial < tol {
                self.n_outer = self.n_outer.min(self.outer + 1);
            }
        }
    }
}
