//! Overset masks and flux repair after mesh changes.
//!
//! Masks are a pure function of the mesh engine's cell classification:
//! [`update_masks`] rebuilds them from scratch and nothing else writes
//! them. [`MaskManager::repair`] runs after every reported mesh change and
//! leaves `Uf`, `phi` and `U` consistent with the new masks.

use tracing::{debug, warn};
use vofcap_core::Vector;
use vofcap_fields::{pressure_bc, FieldStore, VolField};
use vofcap_fvm::{fvc, fvm, LinearSolver, Pcg, SolveError, SolverControls, SolverPerformance};
use vofcap_mesh::{CellClass, MeshChange, MeshEngine, PolyMesh};
use vofcap_models::ImmiscibleMixture;

use crate::config::SolverConfig;
use crate::state::SimState;

/// Subtract the mesh-motion flux from an already masked `phi`.
///
/// The motion flux is weighted by the face mask, so hole faces stay at
/// exactly zero.
pub fn make_relative(engine: &dyn MeshEngine, fields: &mut FieldStore) {
    if !engine.is_moving() {
        return;
    }
    if let Some(mesh_phi) = engine.mesh_phi() {
        let face_mask = fields.face_mask.values();
        for ((p, m), w) in fields.phi.values_mut().iter_mut().zip(mesh_phi).zip(face_mask) {
            *p -= m * w;
        }
    }
}

/// Rebuild the cell mask, interpolated-cell set and face mask.
pub fn update_masks(mesh: &PolyMesh, classes: &[CellClass], fields: &mut FieldStore) {
    for (i, class) in classes.iter().enumerate() {
        fields.cell_mask[i] = if *class == CellClass::Hole { 0.0 } else { 1.0 };
        fields.interpolated_cells[i] = if *class == CellClass::Interpolated { 0.0 } else { 1.0 };
    }
    fields.cell_mask.correct_boundary_conditions(mesh);
    fields.face_mask.assign(&fvc::local_min(mesh, &fields.cell_mask));
}

/// Face-wise minimum of per-cell values; boundary faces take the owner.
fn face_min(mesh: &PolyMesh, cell: &[f64]) -> Vec<f64> {
    let owner = mesh.owner();
    let mut out = Vec::with_capacity(mesh.n_faces());
    for (f, &n) in mesh.neighbour().iter().enumerate() {
        out.push(cell[owner[f]].min(cell[n]));
    }
    for f in mesh.n_internal_faces()..mesh.n_faces() {
        out.push(cell[owner[f]]);
    }
    out
}

/// First active cell at or after `preferred`, wrapping around.
pub fn reference_cell(cell_mask: &[f64], preferred: usize) -> Option<usize> {
    let n = cell_mask.len();
    (0..n)
        .map(|k| (preferred + k) % n)
        .find(|&i| cell_mask[i] > 0.5)
}

/// Make `phi` divergence-free on the active cells.
///
/// Solves `laplacian(faceMask, pcorr) = div(phi)` with `pcorr` pinned to
/// zero on hole cells and on fixed-pressure boundaries, then subtracts the
/// potential flux. Masked faces end with zero flux. A closed domain is
/// referenced at the first active cell from `ref_cell`.
pub fn correct_phi(
    mesh: &PolyMesh,
    fields: &mut FieldStore,
    ref_cell: usize,
    controls: &SolverControls,
) -> Result<SolverPerformance, SolveError> {
    fields.phi.scale_by(fields.face_mask.values());
    let face_mask = fields.face_mask.values();

    let mut pcorr = VolField::uniform("pcorr", mesh, 0.0, pressure_bc);
    let mut eqn = fvm::laplacian(mesh, face_mask, &pcorr);
    for (b, d) in eqn
        .source_mut()
        .iter_mut()
        .zip(fvc::surface_sum(mesh, fields.phi.values()))
    {
        *b += d;
    }
    for (i, m) in fields.cell_mask.values().iter().enumerate() {
        if *m < 0.5 {
            eqn.set_value(i, 0.0);
        }
    }
    if mesh.is_closed() {
        if let Some(r) = reference_cell(fields.cell_mask.values(), ref_cell) {
            eqn.set_reference(r, 0.0);
        }
    }

    let mut x = pcorr.values().to_vec();
    let result = Pcg.solve("pcorr", &eqn, &mut x, controls);
    if matches!(result, Err(SolveError::Singular { .. })) {
        return result;
    }
    // A non-converged solve still leaves its best iterate in `x`.
    pcorr.values_mut().copy_from_slice(&x);
    pcorr.correct_boundary_conditions(mesh);

    let sn = fvc::sn_grad(mesh, &pcorr);
    let mag_sf = mesh.mag_face_areas();
    for (f, p) in fields.phi.values_mut().iter_mut().enumerate() {
        *p -= face_mask[f] * mag_sf[f] * sn[f];
    }
    result
}

/// Outcome of one mask repair.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RepairReport {
    /// The cached phase-flux correction was discarded.
    pub corr0_cleared: bool,
    /// Hole cells after the change.
    pub holes: usize,
    /// Interpolated cells after the change.
    pub interpolated: usize,
    /// Faces inactive at the old time whose face velocity was rebuilt.
    pub reblended_faces: usize,
    /// Flux-correction solve, when it ran.
    pub correct_phi: Option<SolverPerformance>,
    /// The flux correction failed to converge or was singular.
    pub solver_warning: bool,
}

/// Repairs masks and fluxes after mesh changes.
#[derive(Clone, Debug, PartialEq)]
pub struct MaskManager {
    gravity: Vector,
    reference_point: Vector,
    correct_phi: bool,
    p_ref_cell: usize,
    pcorr: SolverControls,
}

impl MaskManager {
    /// Settings taken from `cfg`.
    pub fn from_config(cfg: &SolverConfig) -> Self {
        Self {
            gravity: cfg.gravity,
            reference_point: cfg.reference_point,
            correct_phi: cfg.pimple.correct_phi,
            p_ref_cell: cfg.pimple.p_ref_cell,
            pcorr: cfg.solvers.pcorr.controls(),
        }
    }

    /// Run the flux correction when configured; logs failures.
    pub fn correct_phi(
        &self,
        mesh: &PolyMesh,
        fields: &mut FieldStore,
    ) -> (Option<SolverPerformance>, bool) {
        if !self.correct_phi {
            return (None, false);
        }
        match correct_phi(mesh, fields, self.p_ref_cell, &self.pcorr) {
            Ok(perf) => (Some(perf), false),
            Err(SolveError::NotConverged { performance }) => {
                warn!(
                    residual = performance.final_residual,
                    iterations = performance.iterations,
                    "flux correction did not converge"
                );
                (Some(performance), true)
            }
            Err(e) => {
                warn!(error = %e, "flux correction skipped");
                (None, true)
            }
        }
    }

    /// Bring masks, face velocity and flux in line with the mesh after
    /// `change`.
    ///
    /// Runs in a fixed order: masks, correction cache, hydrostatic
    /// potentials, face-velocity blending across the old and new masks,
    /// flux rebuild, flux correction, mixture update, and finally zeroing
    /// of every masked face and cell before the flux is made relative to
    /// the mesh motion. Calling it twice without an intervening mesh
    /// change leaves the state unchanged.
    pub fn repair(
        &self,
        engine: &dyn MeshEngine,
        change: MeshChange,
        state: &mut SimState,
        mixture: &mut ImmiscibleMixture,
    ) -> RepairReport {
        let mesh = engine.mesh();
        let mut report = RepairReport::default();
        let fields = &mut state.fields;

        // 1. Masks from the new classification.
        update_masks(mesh, engine.cell_classes(), fields);
        report.holes = fields.cell_mask.values().iter().filter(|m| **m < 0.5).count();
        report.interpolated = fields.interpolated_cells.iter().filter(|m| **m < 0.5).count();

        // 2. A topology change invalidates face-indexed caches.
        if change.topology_changed && state.alpha_phi1_corr0.take().is_some() {
            report.corr0_cleared = true;
        }

        // 3. Hydrostatic potentials at the new centroids.
        fields.update_geometric_depth(mesh, self.gravity, self.reference_point);

        // 4-6. Keep Uf where the old mask was active, rebuild it elsewhere;
        // boundary faces always follow the cell velocity.
        engine.exchange_vectors(fields.u.values_mut());
        fields.u.correct_boundary_conditions(mesh);
        let face_mask_old = face_min(mesh, fields.cell_mask.old_time());
        let u_int = fvc::interpolate(mesh, &fields.u);
        let n_internal = mesh.n_internal_faces();
        for (f, uf) in fields.uf.values_mut().iter_mut().enumerate() {
            if f >= n_internal {
                *uf = u_int[f];
                continue;
            }
            let m = face_mask_old[f];
            if m < 1.0 {
                report.reblended_faces += 1;
            }
            *uf = *uf * m + u_int[f] * (1.0 - m);
        }

        // 7. Flux from the face velocity.
        fields.phi.assign(&fvc::face_flux(mesh, &fields.uf));

        // 8. Divergence-free flux on the new active set.
        let (perf, failed) = self.correct_phi(mesh, fields);
        report.correct_phi = perf;
        report.solver_warning = failed;

        // 9. Mixture properties on the new cell set.
        mixture.correct(mesh, fields);

        // 10. Flux relative to the moving mesh; nothing moves through or
        // inside a hole.
        fields.phi.scale_by(fields.face_mask.values());
        make_relative(engine, fields);
        fields.uf.scale_by(fields.face_mask.values());
        fields.u.scale_by(fields.cell_mask.values());
        fields.u.correct_boundary_conditions(mesh);

        debug!(
            holes = report.holes,
            interpolated = report.interpolated,
            reblended_faces = report.reblended_faces,
            topology_changed = change.topology_changed,
            "masks repaired"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vofcap_core::TimeState;
    use vofcap_mesh::{BlockMesh, OversetBoxMesh, PatchKind, Side};

    fn engine() -> OversetBoxMesh {
        let mesh = BlockMesh::new([8, 8, 1], Vector::new(1.0, 1.0, 0.125))
            .build()
            .unwrap();
        OversetBoxMesh::new(
            mesh,
            Vector::new(0.5, 0.5, 0.0625),
            Vector::new(0.13, 0.13, 1.0),
            Vector::ZERO,
        )
        .unwrap()
    }

    #[test]
    fn masks_follow_classification() {
        let e = engine();
        let mut fields = FieldStore::new(e.mesh());
        update_masks(e.mesh(), e.cell_classes(), &mut fields);
        for (i, c) in e.cell_classes().iter().enumerate() {
            assert_eq!(fields.cell_mask[i] == 0.0, *c == CellClass::Hole);
            assert_eq!(fields.interpolated_cells[i] == 0.0, *c == CellClass::Interpolated);
        }
        let owner = e.mesh().owner();
        for (f, &n) in e.mesh().neighbour().iter().enumerate() {
            let expect = fields.cell_mask[owner[f]].min(fields.cell_mask[n]);
            assert_eq!(fields.face_mask[f], expect);
        }
    }

    #[test]
    fn reference_cell_skips_holes() {
        assert_eq!(reference_cell(&[0.0, 0.0, 1.0, 1.0], 0), Some(2));
        assert_eq!(reference_cell(&[1.0, 0.0, 0.0], 1), Some(0));
        assert_eq!(reference_cell(&[0.0, 0.0], 0), None);
    }

    #[test]
    fn correct_phi_removes_divergence() {
        let mesh = BlockMesh::new([6, 4, 1], Vector::new(1.5, 1.0, 0.25))
            .patch(Side::YMax, PatchKind::FixedPressure)
            .build()
            .unwrap();
        let mut fields = FieldStore::new(&mesh);
        for (f, p) in fields.phi.values_mut().iter_mut().enumerate() {
            if mesh.is_internal(f) {
                *p = ((f * 7 % 5) as f64 - 2.0) * 0.01;
            }
        }
        let controls = SolverControls {
            tolerance: 1e-12,
            rel_tol: 0.0,
            max_iter: 500,
        };
        correct_phi(&mesh, &mut fields, 0, &controls).unwrap();
        let div = fvc::surface_sum(&mesh, fields.phi.values());
        assert!(div.iter().all(|d| d.abs() < 1e-9), "{div:?}");
    }

    /// The overset box with a uniform swept flux on every face.
    struct SweptHoles {
        inner: OversetBoxMesh,
        mesh_phi: Vec<f64>,
    }

    impl MeshEngine for SweptHoles {
        fn mesh(&self) -> &PolyMesh {
            self.inner.mesh()
        }

        fn cell_classes(&self) -> &[CellClass] {
            self.inner.cell_classes()
        }

        fn update(&mut self, time: &TimeState) -> Result<MeshChange, vofcap_mesh::MeshError> {
            self.inner.update(time)
        }

        fn is_moving(&self) -> bool {
            true
        }

        fn mesh_phi(&self) -> Option<&[f64]> {
            Some(&self.mesh_phi)
        }
    }

    #[test]
    fn moving_mesh_leaves_hole_faces_without_flux() {
        let inner = engine();
        let mesh_phi = vec![0.02; inner.mesh().n_faces()];
        let e = SweptHoles { inner, mesh_phi };
        let mut fields = FieldStore::new(e.mesh());
        fields.u.values_mut().fill(Vector::new(0.3, -0.1, 0.0));
        fields.store_old_times();
        let mut state = SimState::new(TimeState::new(0.0, 1.0, 0.1), fields);
        let mut mix = ImmiscibleMixture::new(Default::default(), e.mesh());
        let cfg = SolverConfig {
            u_cap_period: Some(1),
            ..SolverConfig::default()
        };
        MaskManager::from_config(&cfg).repair(&e, MeshChange::MOVED, &mut state, &mut mix);

        let f = &state.fields;
        let mut open_faces = 0;
        for (fi, m) in f.face_mask.values().iter().enumerate() {
            if *m == 0.0 {
                assert_eq!(f.phi[fi], 0.0, "hole face {fi}");
            } else {
                open_faces += 1;
            }
        }
        assert!(open_faces > 0);
    }

    #[test]
    fn repair_zeroes_holes() {
        let e = engine();
        let mut fields = FieldStore::new(e.mesh());
        fields.u.values_mut().fill(Vector::new(0.3, -0.1, 0.0));
        fields.store_old_times();
        let mut state = SimState::new(TimeState::new(0.0, 1.0, 0.1), fields);
        let mut mix = ImmiscibleMixture::new(Default::default(), e.mesh());
        let cfg = SolverConfig {
            u_cap_period: Some(1),
            ..SolverConfig::default()
        };
        let report =
            MaskManager::from_config(&cfg).repair(&e, MeshChange::MOVED, &mut state, &mut mix);
        assert!(report.holes > 0);
        let f = &state.fields;
        for i in 0..e.mesh().n_cells() {
            if f.cell_mask[i] == 0.0 {
                assert_eq!(f.u[i], Vector::ZERO);
            }
        }
        for (fi, m) in f.face_mask.values().iter().enumerate() {
            if *m == 0.0 {
                assert_eq!(f.phi[fi], 0.0);
            }
        }
    }
}
