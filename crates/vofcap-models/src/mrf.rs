//! Moving reference frame zones.

use vofcap_core::Vector;
use vofcap_fields::FieldStore;
use vofcap_fvm::FvMatrix;
use vofcap_mesh::PolyMesh;

/// A set of cells solved in a frame rotating with `omega` about `origin`.
///
/// Fluxes on faces owned by zone cells are made relative to the frame
/// velocity `omega × (Cf - origin)`, and the momentum equation gains the
/// Coriolis acceleration `rho omega × U`.
#[derive(Clone, Debug)]
pub struct MrfZone {
    /// Point on the rotation axis.
    pub origin: Vector,
    /// Angular velocity vector.
    pub omega: Vector,
    in_zone: Vec<bool>,
}

impl MrfZone {
    /// Zone made of `cells`.
    pub fn new(mesh: &PolyMesh, origin: Vector, omega: Vector, cells: &[usize]) -> Self {
        let mut in_zone = vec![false; mesh.n_cells()];
        for &c in cells.iter().filter(|c| **c < mesh.n_cells()) {
            in_zone[c] = true;
        }
        Self {
            origin,
            omega,
            in_zone,
        }
    }

    /// True for zone cells.
    pub fn contains(&self, cell: usize) -> bool {
        self.in_zone.get(cell).copied().unwrap_or(false)
    }

    fn frame_flux(&self, mesh: &PolyMesh, f: usize) -> f64 {
        let v = self.omega.cross(mesh.face_centres()[f] - self.origin);
        v.dot(mesh.face_areas()[f])
    }

    /// Move the Coriolis term to the right-hand side of `eqn`.
    pub fn add_coriolis(&self, mesh: &PolyMesh, fields: &FieldStore, eqn: &mut FvMatrix<Vector>) {
        let vol = mesh.cell_volumes();
        for (i, b) in eqn.source_mut().iter_mut().enumerate() {
            if self.in_zone[i] {
                *b -= self.omega.cross(fields.u[i]) * (fields.rho[i] * vol[i]);
            }
        }
    }

    /// Subtract the frame flux on faces owned by zone cells.
    pub fn make_relative(&self, mesh: &PolyMesh, phi: &mut [f64]) {
        let owner = mesh.owner();
        for (f, p) in phi.iter_mut().enumerate() {
            if self.in_zone[owner[f]] {
                *p -= self.frame_flux(mesh, f);
            }
        }
    }

    /// Inverse of [`make_relative`](MrfZone::make_relative).
    pub fn make_absolute(&self, mesh: &PolyMesh, phi: &mut [f64]) {
        let owner = mesh.owner();
        for (f, p) in phi.iter_mut().enumerate() {
            if self.in_zone[owner[f]] {
                *p += self.frame_flux(mesh, f);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vofcap_mesh::BlockMesh;

    fn mesh() -> PolyMesh {
        BlockMesh::new([3, 3, 1], Vector::new(3.0, 3.0, 1.0))
            .build()
            .unwrap()
    }

    #[test]
    fn solid_body_rotation_is_at_rest_in_the_frame() {
        let mesh = mesh();
        let origin = Vector::new(1.5, 1.5, 0.5);
        let omega = Vector::new(0.0, 0.0, 2.0);
        let zone = MrfZone::new(&mesh, origin, omega, &(0..9).collect::<Vec<_>>());
        let mut phi: Vec<f64> = (0..mesh.n_faces())
            .map(|f| {
                omega
                    .cross(mesh.face_centres()[f] - origin)
                    .dot(mesh.face_areas()[f])
            })
            .collect();
        let absolute = phi.clone();
        zone.make_relative(&mesh, &mut phi);
        assert!(phi.iter().all(|p| p.abs() < 1e-12));
        zone.make_absolute(&mesh, &mut phi);
        for (a, b) in phi.iter().zip(&absolute) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn coriolis_only_acts_inside_the_zone() {
        let mesh = mesh();
        let mut fields = FieldStore::new(&mesh);
        fields.u.values_mut().fill(Vector::X);
        fields.rho.values_mut().fill(1.0);
        let zone = MrfZone::new(&mesh, Vector::ZERO, Vector::Z, &[4]);
        let mut eqn = FvMatrix::new(&mesh);
        zone.add_coriolis(&mesh, &fields, &mut eqn);
        assert_eq!(eqn.source()[4], -Vector::Y);
        assert_eq!(eqn.source()[0], Vector::ZERO);
        assert!(zone.contains(4) && !zone.contains(3));
    }
}
