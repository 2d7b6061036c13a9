//! Momentum assembly and the optional velocity predictor.

use tracing::warn;
use vofcap_core::Vector;
use vofcap_fields::FieldStore;
use vofcap_fvm::{fvc, fvm, solve_vector, FvMatrix, GaussSeidel, SolverControls, SolverPerformance};
use vofcap_mesh::{MeshEngine, PolyMesh};
use vofcap_models::{ImmiscibleMixture, MrfZone, SourceSet, TurbulenceModel};

use crate::config::SolverConfig;
use crate::state::SimState;

/// Read-only models entering the momentum and pressure equations.
#[derive(Clone, Copy)]
pub struct MomentumModels<'a> {
    /// Two-phase mixture.
    pub mixture: &'a ImmiscibleMixture,
    /// Turbulence closure.
    pub turbulence: &'a dyn TurbulenceModel,
    /// Generic momentum sources.
    pub sources: &'a SourceSet,
    /// Rotating zones.
    pub mrf: &'a [MrfZone],
}

/// Face body force per unit area, `stf - ghf snGrad(rho)`.
pub fn face_body_force(
    mesh: &PolyMesh,
    fields: &FieldStore,
    mixture: &ImmiscibleMixture,
) -> Vec<f64> {
    let stf = mixture.surface_tension_force(mesh, &fields.alpha1);
    let sn_rho = fvc::sn_grad(mesh, &fields.rho);
    stf.iter()
        .zip(fields.ghf.values())
        .zip(sn_rho.values())
        .map(|((s, g), r)| s - g * r)
        .collect()
}

/// Value a constrained momentum row is pinned to: zero in holes, the donor
/// velocity in interpolated cells that have one.
fn pinned_velocity(engine: &dyn MeshEngine, fields: &FieldStore, cell: usize) -> Option<Vector> {
    if fields.cell_mask[cell] < 0.5 {
        Some(Vector::ZERO)
    } else if fields.interpolated_cells[cell] < 0.5 {
        engine.donor_velocity(cell)
    } else {
        None
    }
}

/// Result of one momentum stage.
#[derive(Clone, Debug)]
pub struct MomentumOutcome {
    /// Assembled, relaxed and constrained equation without the pressure
    /// and body-force terms; the pressure corrector takes `A` and `H`
    /// from it.
    pub eqn: FvMatrix<Vector>,
    /// Component solves, when the predictor ran.
    pub performance: Vec<SolverPerformance>,
    /// The predictor failed and `U` was left at its pre-solve values.
    pub solver_warning: bool,
}

/// Builds the momentum equation and optionally solves it.
#[derive(Clone, Debug, PartialEq)]
pub struct MomentumPredictor {
    predict: bool,
    relaxation: f64,
    controls: SolverControls,
}

impl MomentumPredictor {
    /// Settings taken from `cfg`.
    pub fn from_config(cfg: &SolverConfig) -> Self {
        Self {
            predict: cfg.pimple.momentum_predictor,
            relaxation: cfg.relaxation.u,
            controls: cfg.solvers.u.controls(),
        }
    }

    /// Assemble `ddt(rho, U) + div(rhoPhi, U) + stress = sources`.
    ///
    /// Relaxation is skipped on the final outer iteration. Hole rows are
    /// pinned to zero and interpolated rows to their donor velocity.
    pub fn assemble(
        &self,
        engine: &dyn MeshEngine,
        state: &SimState,
        models: &MomentumModels<'_>,
        final_iter: bool,
    ) -> FvMatrix<Vector> {
        let mesh = engine.mesh();
        let fields = &state.fields;
        let rho = fields.rho.values();
        let rho_old = fields.rho.old_time();

        let mut eqn = fvm::ddt(mesh, &state.r_delta_t, rho, rho_old, fields.u.old_time());
        eqn += &fvm::div_upwind(mesh, fields.rho_phi.values(), &fields.u);

        // Remove the mass imbalance of the discrete fluxes from the
        // convective term.
        let div_rho_phi = fvc::div(mesh, fields.rho_phi.values());
        let cont_err: Vec<f64> = (0..mesh.n_cells())
            .map(|i| -((rho[i] - rho_old[i]) * state.r_delta_t[i] + div_rho_phi[i]))
            .collect();
        eqn.add_sp(mesh, &cont_err);

        for zone in models.mrf {
            zone.add_coriolis(mesh, fields, &mut eqn);
        }
        eqn += &models.turbulence.div_dev_rho_reff(mesh, fields, models.mixture);
        models.sources.add_sup(mesh, fields, &mut eqn);

        let factor = if final_iter { 1.0 } else { self.relaxation };
        eqn.relax(factor, fields.u.values());

        for i in 0..mesh.n_cells() {
            if let Some(value) = pinned_velocity(engine, fields, i) {
                eqn.set_value(i, value);
            }
        }
        eqn
    }

    /// Assemble and, when enabled, solve with the pressure and body-force
    /// terms reconstructed from faces.
    pub fn predict(
        &self,
        engine: &dyn MeshEngine,
        state: &mut SimState,
        models: &MomentumModels<'_>,
        final_iter: bool,
    ) -> MomentumOutcome {
        let eqn = self.assemble(engine, state, models, final_iter);
        let mut outcome = MomentumOutcome {
            eqn,
            performance: Vec::new(),
            solver_warning: false,
        };
        if !self.predict {
            return outcome;
        }

        let mesh = engine.mesh();
        let fields = &mut state.fields;
        let body = face_body_force(mesh, fields, models.mixture);
        let sn_p = fvc::sn_grad(mesh, &fields.p_rgh);
        let face_force: Vec<f64> = body
            .iter()
            .zip(sn_p.values())
            .zip(mesh.mag_face_areas())
            .map(|((b, p), s)| (b - p) * s)
            .collect();
        let mut force = fvc::reconstruct(mesh, &face_force);
        for (i, f) in force.iter_mut().enumerate() {
            if pinned_velocity(engine, fields, i).is_some() {
                *f = Vector::ZERO;
            } else {
                *f *= fields.cell_mask[i];
            }
        }
        let mut full = outcome.eqn.clone();
        full.add_source(mesh, &force);

        let previous = fields.u.values().to_vec();
        let solver = GaussSeidel::default();
        match solve_vector(&solver, "U", &full, fields.u.values_mut(), &self.controls) {
            Ok(perfs) => outcome.performance = perfs,
            Err(e) => {
                warn!(error = %e, "momentum predictor failed; keeping previous velocity");
                fields.u.values_mut().copy_from_slice(&previous);
                outcome.solver_warning = true;
            }
        }
        models.sources.correct(mesh, fields);
        fields.u.correct_boundary_conditions(mesh);
        outcome
    }
}
