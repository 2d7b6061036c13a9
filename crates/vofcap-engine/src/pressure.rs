//! Pressure correction: the pressure equation, conservative flux and
//! velocity update.

use tracing::{debug, warn};
use vofcap_core::{CommError, Communicator, Vector, SMALL};
use vofcap_fvm::{
    fvc, fvm, FvMatrix, LinearSolver, Pcg, SolveError, SolverControls, SolverPerformance,
};
use vofcap_mesh::{MeshEngine, PolyMesh};

use crate::config::SolverConfig;
use crate::metrics::ContinuityErrors;
use crate::momentum::{face_body_force, MomentumModels};
use crate::overset::{make_relative, reference_cell};
use crate::state::SimState;

/// Result of one pressure corrector.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PressureOutcome {
    /// One entry per successful or non-converged non-orthogonal solve.
    pub performance: Vec<SolverPerformance>,
    /// Solves that did not converge or were singular.
    pub solver_warnings: u32,
    /// Continuity errors of the corrected flux.
    pub continuity: ContinuityErrors,
}

impl PressureOutcome {
    /// Initial residual of the first pressure solve.
    pub fn initial_residual(&self) -> Option<f64> {
        self.performance.first().map(|p| p.initial_residual)
    }
}

/// Pressure corrector settings.
#[derive(Clone, Debug, PartialEq)]
pub struct PressureCorrector {
    n_non_orth: u32,
    relaxation: f64,
    p_ref_cell: usize,
    p_ref_value: f64,
    controls: SolverControls,
    final_controls: SolverControls,
}

/// Face interpolation of a bare cell scalar; boundary faces take the
/// owner value.
fn interpolate_cells(mesh: &PolyMesh, cell: &[f64]) -> Vec<f64> {
    let owner = mesh.owner();
    let w = mesh.weights();
    let mut out = Vec::with_capacity(mesh.n_faces());
    for (f, &n) in mesh.neighbour().iter().enumerate() {
        out.push(cell[owner[f]] * w[f] + cell[n] * (1.0 - w[f]));
    }
    for f in mesh.n_internal_faces()..mesh.n_faces() {
        out.push(cell[owner[f]]);
    }
    out
}

impl PressureCorrector {
    /// Settings taken from `cfg`.
    pub fn from_config(cfg: &SolverConfig) -> Self {
        Self {
            n_non_orth: cfg.pimple.n_non_orth_correctors,
            relaxation: cfg.relaxation.p_rgh,
            p_ref_cell: cfg.pimple.p_ref_cell,
            p_ref_value: cfg.pimple.p_ref_value,
            controls: cfg.solvers.p_rgh.controls(),
            final_controls: cfg.solvers.p_rgh_final.controls(),
        }
    }

    /// Correct `p_rgh`, `phi`, `U`, `Uf` and `p` from the momentum
    /// equation `ueqn`.
    ///
    /// `final_iter` marks the final outer iteration and `final_corr` the
    /// last corrector within it; together they select the final solver
    /// settings. Failed solves are logged and counted, never fatal.
    pub fn correct(
        &self,
        engine: &dyn MeshEngine,
        state: &mut SimState,
        models: &MomentumModels<'_>,
        ueqn: &FvMatrix<Vector>,
        final_iter: bool,
        final_corr: bool,
        comm: &dyn Communicator,
    ) -> Result<PressureOutcome, CommError> {
        let mesh = engine.mesh();
        let fields = &mut state.fields;
        let mag_sf = mesh.mag_face_areas();
        let face_mask = fields.face_mask.values().to_vec();
        let cell_mask = fields.cell_mask.values().to_vec();
        let mut outcome = PressureOutcome::default();

        let r_au: Vec<f64> = ueqn.a(mesh).iter().map(|a| 1.0 / a).collect();
        let mut r_auf = interpolate_cells(mesh, &r_au);
        for (r, m) in r_auf.iter_mut().zip(&face_mask) {
            *r *= m;
        }

        let h = ueqn.h(mesh, fields.u.values());
        let mut hby_a = fields.u.clone();
        for (i, v) in hby_a.values_mut().iter_mut().enumerate() {
            *v = h[i] * (r_au[i] * cell_mask[i]);
        }
        hby_a.correct_boundary_conditions(mesh);

        let body = face_body_force(mesh, fields, models.mixture);
        let phig: Vec<f64> = (0..mesh.n_faces())
            .map(|f| body[f] * r_auf[f] * mag_sf[f])
            .collect();
        let mut phi_hby_a = fvc::flux(mesh, &hby_a).into_values();
        for (p, g) in phi_hby_a.iter_mut().zip(&phig) {
            *p += g;
        }
        for zone in models.mrf {
            zone.make_relative(mesh, &mut phi_hby_a);
        }
        for (p, m) in phi_hby_a.iter_mut().zip(&face_mask) {
            *p *= m;
        }

        let p_prev = fields.p_rgh.values().to_vec();
        let net_hby_a = fvc::surface_sum(mesh, &phi_hby_a);
        let reference = mesh
            .is_closed()
            .then(|| reference_cell(&cell_mask, self.p_ref_cell))
            .flatten();

        for pass in 0..=self.n_non_orth {
            let mut peqn = fvm::laplacian(mesh, &r_auf, &fields.p_rgh);
            for (b, d) in peqn.source_mut().iter_mut().zip(&net_hby_a) {
                *b += d;
            }
            for (i, m) in cell_mask.iter().enumerate() {
                if *m < 0.5 {
                    peqn.set_value(i, fields.p_rgh[i]);
                }
            }
            if let Some(r) = reference {
                peqn.set_reference(r, fields.p_rgh[r]);
            }

            let last_pass = pass == self.n_non_orth;
            let controls = if final_iter && final_corr && last_pass {
                &self.final_controls
            } else {
                &self.controls
            };
            let mut x = fields.p_rgh.values().to_vec();
            match Pcg.solve("p_rgh", &peqn, &mut x, controls) {
                Ok(perf) => {
                    outcome.performance.push(perf);
                    fields.p_rgh.values_mut().copy_from_slice(&x);
                }
                Err(SolveError::NotConverged { performance }) => {
                    warn!(
                        final_residual = performance.final_residual,
                        iterations = performance.iterations,
                        "pressure solve did not converge"
                    );
                    outcome.performance.push(performance);
                    outcome.solver_warnings += 1;
                    fields.p_rgh.values_mut().copy_from_slice(&x);
                }
                Err(e) => {
                    warn!(error = %e, "pressure solve failed; keeping previous pressure");
                    outcome.solver_warnings += 1;
                }
            }
            fields.p_rgh.correct_boundary_conditions(mesh);

            if last_pass {
                let sn = fvc::sn_grad(mesh, &fields.p_rgh);
                for (f, p) in fields.phi.values_mut().iter_mut().enumerate() {
                    *p = phi_hby_a[f] - r_auf[f] * mag_sf[f] * sn[f];
                }
            }
        }

        let relax = if final_iter { 1.0 } else { self.relaxation };
        if relax < 1.0 {
            for (p, p0) in fields.p_rgh.values_mut().iter_mut().zip(&p_prev) {
                *p = p0 + relax * (*p - p0);
            }
            fields.p_rgh.correct_boundary_conditions(mesh);
        }

        // Velocity from the relaxed pressure; interpolated cells keep
        // their donor values.
        let sn = fvc::sn_grad(mesh, &fields.p_rgh);
        let face_acc: Vec<f64> = (0..mesh.n_faces())
            .map(|f| {
                if r_auf[f] > SMALL {
                    phig[f] / r_auf[f] - sn[f] * mag_sf[f]
                } else {
                    0.0
                }
            })
            .collect();
        let acc = fvc::reconstruct(mesh, &face_acc);
        let hby_a = hby_a.values();
        for (i, u) in fields.u.values_mut().iter_mut().enumerate() {
            let m = cell_mask[i] * fields.interpolated_cells[i];
            *u = hby_a[i] + acc[i] * (r_au[i] * m);
        }
        fields.u.correct_boundary_conditions(mesh);
        models.sources.correct(mesh, fields);

        // Face velocity: interpolated, with the normal part from the flux.
        let mut uf = fvc::interpolate(mesh, &fields.u).into_values();
        let sf = mesh.face_areas();
        for (f, v) in uf.iter_mut().enumerate() {
            let a = mag_sf[f].max(SMALL);
            let n = sf[f] / a;
            *v += n * (fields.phi[f] / a - n.dot(*v));
        }
        fields.uf.values_mut().copy_from_slice(&uf);

        make_relative(engine, fields);

        update_static_pressure(mesh, fields);
        if let Some(r) = reference {
            let shift = self.p_ref_value - fields.p[r];
            for v in fields.p.values_mut() {
                *v += shift;
            }
            for v in fields.p.boundary_values_mut() {
                *v += shift;
            }
            for (i, v) in fields.p_rgh.values_mut().iter_mut().enumerate() {
                *v = fields.p[i] - fields.rho[i] * fields.gh[i];
            }
            fields.p_rgh.correct_boundary_conditions(mesh);
        }

        outcome.continuity = continuity_errors(
            mesh,
            fields.phi.values(),
            &cell_mask,
            state.time.delta_t,
            state.cumulative_continuity,
            comm,
        )?;
        state.cumulative_continuity = outcome.continuity.cumulative;
        debug!(
            local = outcome.continuity.local,
            global = outcome.continuity.global,
            cumulative = outcome.continuity.cumulative,
            "time step continuity errors"
        );
        Ok(outcome)
    }
}

/// `p = p_rgh + rho gh` on cells and boundary faces.
fn update_static_pressure(mesh: &PolyMesh, fields: &mut vofcap_fields::FieldStore) {
    for i in 0..mesh.n_cells() {
        fields.p[i] = fields.p_rgh[i] + fields.rho[i] * fields.gh[i];
    }
    let n_internal = mesh.n_internal_faces();
    for (b, v) in fields.p.boundary_values_mut().iter_mut().enumerate() {
        let f = n_internal + b;
        *v = fields.p_rgh.boundary_value(mesh, f)
            + fields.rho.boundary_value(mesh, f) * fields.gh.boundary_value(mesh, f);
    }
}

/// Volume-weighted continuity errors of `phi` over active cells.
pub fn continuity_errors(
    mesh: &PolyMesh,
    phi: &[f64],
    cell_mask: &[f64],
    delta_t: f64,
    cumulative: f64,
    comm: &dyn Communicator,
) -> Result<ContinuityErrors, CommError> {
    let div = fvc::div(mesh, phi);
    let vol = mesh.cell_volumes();
    let mut sum_abs = 0.0;
    let mut sum = 0.0;
    let mut total = 0.0;
    for i in 0..mesh.n_cells() {
        if cell_mask[i] > 0.5 {
            sum_abs += div[i].abs() * vol[i];
            sum += div[i] * vol[i];
            total += vol[i];
        }
    }
    let sum_abs = comm.all_reduce_sum(sum_abs)?;
    let sum = comm.all_reduce_sum(sum)?;
    let total = comm.all_reduce_sum(total)?.max(SMALL);
    let global = delta_t * sum / total;
    Ok(ContinuityErrors {
        local: delta_t * sum_abs / total,
        global,
        cumulative: cumulative + global,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vofcap_core::{SerialComm, TimeState};
    use vofcap_fields::FieldStore;
    use vofcap_mesh::{BlockMesh, OversetBoxMesh, StaticMesh};
    use vofcap_models::{ImmiscibleMixture, Laminar, SourceSet};
    use vofcap_test_utils::random_velocity;

    use crate::momentum::MomentumPredictor;
    use crate::overset::update_masks;

    fn prepare(
        engine: &dyn MeshEngine,
        alpha: impl Fn(Vector) -> f64,
    ) -> (SimState, ImmiscibleMixture) {
        let mesh = engine.mesh();
        let mut fields = FieldStore::new(mesh);
        for (i, c) in mesh.cell_centres().iter().enumerate() {
            fields.alpha1[i] = alpha(*c);
        }
        fields.alpha1.correct_boundary_conditions(mesh);
        update_masks(mesh, engine.cell_classes(), &mut fields);
        fields.update_geometric_depth(mesh, Vector::new(0.0, 0.0, -9.81), Vector::ZERO);
        let mut mix = ImmiscibleMixture::new(Default::default(), mesh);
        mix.correct(mesh, &mut fields);
        fields.store_old_times();
        (SimState::new(TimeState::new(0.0, 1.0, 1e-3), fields), mix)
    }

    fn run_corrector(
        engine: &dyn MeshEngine,
        state: &mut SimState,
        mix: &ImmiscibleMixture,
    ) -> PressureOutcome {
        let turb = Laminar::new(engine.mesh());
        let sources = SourceSet::new();
        let models = MomentumModels {
            mixture: mix,
            turbulence: &turb,
            sources: &sources,
            mrf: &[],
        };
        let mut cfg = SolverConfig::default();
        cfg.solvers.p_rgh_final.tolerance = 1e-12;
        let ueqn = MomentumPredictor::from_config(&cfg).assemble(engine, state, &models, true);
        PressureCorrector::from_config(&cfg)
            .correct(engine, state, &models, &ueqn, true, true, &SerialComm)
            .unwrap()
    }

    #[test]
    fn corrected_flux_is_divergence_free() {
        let engine = StaticMesh::new(
            BlockMesh::new([6, 6, 1], Vector::new(1.0, 1.0, 1.0 / 6.0)).build().unwrap(),
        );
        let (mut state, mix) = prepare(&engine, |_| 1.0);
        let mesh = engine.mesh();
        let u = random_velocity(mesh, 7, 1.0);
        state.fields.u.values_mut().copy_from_slice(&u);
        state.fields.u.correct_boundary_conditions(mesh);
        state.fields.store_old_times();
        let phi = fvc::flux(mesh, &state.fields.u);
        state.fields.phi.assign(&phi);

        let out = run_corrector(&engine, &mut state, &mix);
        assert_eq!(out.solver_warnings, 0);
        assert!(out.continuity.local < 1e-9, "{:?}", out.continuity);
        let div = fvc::div(mesh, state.fields.phi.values());
        assert!(div.iter().all(|d| d.abs() < 1e-6));
        assert_eq!(state.cumulative_continuity, out.continuity.cumulative);
    }

    #[test]
    fn stratified_fluid_stays_at_rest() {
        let engine = StaticMesh::new(
            BlockMesh::new([2, 2, 8], Vector::new(0.2, 0.2, 1.0)).build().unwrap(),
        );
        let (mut state, mix) = prepare(&engine, |c| if c.z < 0.5 { 1.0 } else { 0.0 });
        let out = run_corrector(&engine, &mut state, &mix);
        assert_eq!(out.solver_warnings, 0);
        for u in state.fields.u.values() {
            assert!(u.length() < 1e-5, "{u}");
        }
        // Closed tank: the static pressure is referenced at cell 0.
        assert!(state.fields.p[0].abs() < 1e-9);
        let (pmin, pmax) = state.fields.p.min_max();
        assert!(pmax - pmin > 1000.0);
    }

    #[test]
    fn holes_carry_no_flux_or_velocity() {
        let mesh = BlockMesh::new([8, 8, 1], Vector::new(1.0, 1.0, 0.125)).build().unwrap();
        let engine = OversetBoxMesh::new(
            mesh,
            Vector::new(0.5, 0.5, 0.0625),
            Vector::new(0.13, 0.13, 1.0),
            Vector::ZERO,
        )
        .unwrap();
        let (mut state, mix) = prepare(&engine, |_| 1.0);
        let mesh = engine.mesh();
        let u = random_velocity(mesh, 11, 0.5);
        state.fields.u.values_mut().copy_from_slice(&u);
        state.fields.u.correct_boundary_conditions(mesh);
        state.fields.store_old_times();
        let phi = fvc::flux(mesh, &state.fields.u);
        state.fields.phi.assign(&phi);

        run_corrector(&engine, &mut state, &mix);
        for (f, m) in state.fields.face_mask.values().iter().enumerate() {
            if *m < 0.5 {
                assert_eq!(state.fields.phi[f], 0.0);
            }
        }
        for (i, m) in state.fields.cell_mask.values().iter().enumerate() {
            if *m < 0.5 {
                assert_eq!(state.fields.u[i], Vector::ZERO);
            }
        }
    }

    #[test]
    fn continuity_ignores_hole_cells() {
        let mesh = BlockMesh::new([2, 1, 1], Vector::new(2.0, 1.0, 1.0)).build().unwrap();
        // Face 0 joins the two cells; an outflow of 1 from cell 0.
        let mut phi = vec![0.0; mesh.n_faces()];
        phi[0] = 1.0;
        let all = continuity_errors(&mesh, &phi, &[1.0, 1.0], 0.5, 0.0, &SerialComm).unwrap();
        assert_eq!(all.global, 0.0);
        assert!((all.local - 0.5).abs() < 1e-12);
        let masked = continuity_errors(&mesh, &phi, &[1.0, 0.0], 0.5, 0.25, &SerialComm).unwrap();
        assert!((masked.global - 0.5).abs() < 1e-12);
        assert!((masked.cumulative - 0.75).abs() < 1e-12);
    }
}
