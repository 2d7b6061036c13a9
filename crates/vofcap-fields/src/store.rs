//! The solver's field store.

use indexmap::IndexMap;
use vofcap_core::Vector;
use vofcap_mesh::{PatchKind, PolyMesh};

use crate::bc::Bc;
use crate::error::FieldError;
use crate::record::FieldRecord;
use crate::surface::SurfaceField;
use crate::vol::VolField;

/// Velocity condition for a patch kind.
pub fn velocity_bc(kind: PatchKind) -> Bc<Vector> {
    match kind {
        PatchKind::Wall => Bc::FixedValue(Vector::ZERO),
        PatchKind::Slip => Bc::Slip,
        PatchKind::FixedPressure => Bc::ZeroGradient,
    }
}

/// Phase-fraction condition for a patch kind; open boundaries admit gas.
pub fn alpha_bc(kind: PatchKind) -> Bc<f64> {
    match kind {
        PatchKind::Wall | PatchKind::Slip => Bc::ZeroGradient,
        PatchKind::FixedPressure => Bc::FixedValue(0.0),
    }
}

/// Reduced-pressure condition for a patch kind.
pub fn pressure_bc(kind: PatchKind) -> Bc<f64> {
    match kind {
        PatchKind::Wall | PatchKind::Slip => Bc::ZeroGradient,
        PatchKind::FixedPressure => Bc::FixedValue(0.0),
    }
}

/// Every per-cell and per-face field of the two-phase solver.
///
/// Fields are public so that each stage can borrow exactly the fields it
/// reads and writes. Masks live here too but are only ever recomputed from
/// the mesh classification, never edited in place.
#[derive(Clone, Debug)]
pub struct FieldStore {
    /// Cell velocity.
    pub u: VolField<Vector>,
    /// Face velocity, used to rebuild fluxes across mesh changes.
    pub uf: SurfaceField<Vector>,
    /// Volumetric face flux, relative to mesh motion.
    pub phi: SurfaceField<f64>,
    /// Phase-1 volume fraction.
    pub alpha1: VolField<f64>,
    /// Phase-2 volume fraction, always `1 - alpha1`.
    pub alpha2: VolField<f64>,
    /// Mixture density.
    pub rho: VolField<f64>,
    /// Mass flux consistent with the phase flux.
    pub rho_phi: SurfaceField<f64>,
    /// Static pressure.
    pub p: VolField<f64>,
    /// Pressure less the hydrostatic contribution `rho * gh`.
    pub p_rgh: VolField<f64>,
    /// Gravity potential `g · (C - reference)` at cells.
    pub gh: VolField<f64>,
    /// Gravity potential at faces.
    pub ghf: SurfaceField<f64>,
    /// `0` on hole cells, `1` elsewhere.
    pub cell_mask: VolField<f64>,
    /// `0` on interpolated cells, `1` elsewhere.
    pub interpolated_cells: Vec<f64>,
    /// Face-wise minimum of the adjacent cell masks.
    pub face_mask: SurfaceField<f64>,
}

impl FieldStore {
    /// Zero velocity and pressure, all phase 2, unmasked.
    pub fn new(mesh: &PolyMesh) -> Self {
        let nf = mesh.n_faces();
        let nc = mesh.n_cells();
        Self {
            u: VolField::uniform("U", mesh, Vector::ZERO, velocity_bc),
            uf: SurfaceField::uniform("Uf", nf, Vector::ZERO),
            phi: SurfaceField::uniform("phi", nf, 0.0),
            alpha1: VolField::uniform("alpha1", mesh, 0.0, alpha_bc),
            alpha2: VolField::uniform("alpha2", mesh, 1.0, |_| Bc::Calculated),
            rho: VolField::uniform("rho", mesh, 0.0, |_| Bc::Calculated),
            rho_phi: SurfaceField::uniform("rhoPhi", nf, 0.0),
            p: VolField::uniform("p", mesh, 0.0, |_| Bc::Calculated),
            p_rgh: VolField::uniform("p_rgh", mesh, 0.0, pressure_bc),
            gh: VolField::uniform("gh", mesh, 0.0, |_| Bc::Calculated),
            ghf: SurfaceField::uniform("ghf", nf, 0.0),
            cell_mask: VolField::uniform("cellMask", mesh, 1.0, |_| Bc::ZeroGradient),
            interpolated_cells: vec![1.0; nc],
            face_mask: SurfaceField::uniform("faceMask", nf, 1.0),
        }
    }

    /// Recompute `gh` and `ghf` from the current centroids.
    pub fn update_geometric_depth(&mut self, mesh: &PolyMesh, g: Vector, reference: Vector) {
        for (v, c) in self.gh.values_mut().iter_mut().zip(mesh.cell_centres()) {
            *v = g.dot(*c - reference);
        }
        let n_internal = mesh.n_internal_faces();
        let face_centres = mesh.face_centres();
        for (f, v) in self.ghf.values_mut().iter_mut().enumerate() {
            *v = g.dot(face_centres[f] - reference);
        }
        for (b, v) in self.gh.boundary_values_mut().iter_mut().enumerate() {
            *v = g.dot(face_centres[n_internal + b] - reference);
        }
    }

    /// Set `alpha2 = 1 - alpha1` on cells and boundary faces.
    pub fn update_alpha2(&mut self) {
        for (a2, a1) in self.alpha2.values_mut().iter_mut().zip(self.alpha1.values()) {
            *a2 = 1.0 - *a1;
        }
        for (a2, a1) in self
            .alpha2
            .boundary_values_mut()
            .iter_mut()
            .zip(self.alpha1.boundary_values())
        {
            *a2 = 1.0 - *a1;
        }
    }

    /// Snapshot the old-time level of every transported field.
    pub fn store_old_times(&mut self) {
        self.u.store_old_time();
        self.alpha1.store_old_time();
        self.alpha2.store_old_time();
        self.rho.store_old_time();
        self.p_rgh.store_old_time();
        self.cell_mask.store_old_time();
    }

    // ── Checkpoint records ──────────────────────────────────────

    /// Named records of every persisted field, in a fixed order.
    ///
    /// Masks and geometric fields are derived from the mesh and are not
    /// persisted.
    pub fn to_records(&self) -> IndexMap<String, FieldRecord> {
        let mut out = IndexMap::new();
        out.insert(self.u.name().to_string(), FieldRecord::from_vol(&self.u));
        out.insert(self.uf.name().to_string(), FieldRecord::from_surface(&self.uf));
        out.insert(self.phi.name().to_string(), FieldRecord::from_surface(&self.phi));
        out.insert(self.alpha1.name().to_string(), FieldRecord::from_vol(&self.alpha1));
        out.insert(self.alpha2.name().to_string(), FieldRecord::from_vol(&self.alpha2));
        out.insert(self.rho.name().to_string(), FieldRecord::from_vol(&self.rho));
        out.insert(
            self.rho_phi.name().to_string(),
            FieldRecord::from_surface(&self.rho_phi),
        );
        out.insert(self.p.name().to_string(), FieldRecord::from_vol(&self.p));
        out.insert(self.p_rgh.name().to_string(), FieldRecord::from_vol(&self.p_rgh));
        out
    }

    /// Overwrite every persisted field from `records`.
    ///
    /// All records are validated before any field is touched, so a failed
    /// restore leaves the store unchanged.
    pub fn restore_records(
        &mut self,
        records: &IndexMap<String, FieldRecord>,
    ) -> Result<(), FieldError> {
        let mut staged = self.clone();
        {
            let FieldStore {
                u,
                uf,
                phi,
                alpha1,
                alpha2,
                rho,
                rho_phi,
                p,
                p_rgh,
                ..
            } = &mut staged;
            lookup(records, u.name())?.restore_vol(u)?;
            lookup(records, uf.name())?.restore_surface(uf)?;
            lookup(records, phi.name())?.restore_surface(phi)?;
            lookup(records, alpha1.name())?.restore_vol(alpha1)?;
            lookup(records, alpha2.name())?.restore_vol(alpha2)?;
            lookup(records, rho.name())?.restore_vol(rho)?;
            lookup(records, rho_phi.name())?.restore_surface(rho_phi)?;
            lookup(records, p.name())?.restore_vol(p)?;
            lookup(records, p_rgh.name())?.restore_vol(p_rgh)?;
        }
        *self = staged;
        Ok(())
    }
}

fn lookup<'a>(
    records: &'a IndexMap<String, FieldRecord>,
    name: &str,
) -> Result<&'a FieldRecord, FieldError> {
    records.get(name).ok_or_else(|| FieldError::MissingField {
        name: name.to_string(),
    })
}
