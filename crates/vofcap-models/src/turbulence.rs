//! Turbulence closures for the mixture momentum equation.

use glam::DMat3;
use vofcap_core::Vector;
use vofcap_fields::{FieldStore, VolField};
use vofcap_fvm::{fvc, fvm, FvMatrix};
use vofcap_mesh::PolyMesh;

use crate::mixture::ImmiscibleMixture;

/// A closure supplying the effective stress of the mixture.
///
/// The momentum predictor adds [`div_dev_rho_reff`] to the left-hand side
/// of its equation. [`correct`] is called by the outer loop once per outer
/// iteration, or only on the final one, depending on configuration.
///
/// [`div_dev_rho_reff`]: TurbulenceModel::div_dev_rho_reff
/// [`correct`]: TurbulenceModel::correct
pub trait TurbulenceModel: Send {
    /// Model name for logs.
    fn name(&self) -> &str;

    /// Update the model state from the current velocity.
    fn correct(&mut self, mesh: &PolyMesh, fields: &FieldStore);

    /// Turbulent kinematic viscosity per cell.
    fn nu_t(&self) -> &[f64];

    /// Stress divergence `-div(mu_eff grad U) - div(mu_eff dev2(grad U^T))`.
    fn div_dev_rho_reff(
        &self,
        mesh: &PolyMesh,
        fields: &FieldStore,
        mixture: &ImmiscibleMixture,
    ) -> FvMatrix<Vector> {
        let mu = mixture.mu(&fields.alpha1);
        let nu_t = self.nu_t();
        let mu_eff: Vec<f64> = (0..mesh.n_cells())
            .map(|i| mu[i] + fields.rho[i] * nu_t.get(i).copied().unwrap_or(0.0))
            .collect();
        stress_divergence(mesh, &fields.u, &mu_eff)
    }
}

fn stress_divergence(mesh: &PolyMesh, u: &VolField<Vector>, mu_eff: &[f64]) -> FvMatrix<Vector> {
    let owner = mesh.owner();
    let w = mesh.weights();
    let mu_f: Vec<f64> = (0..mesh.n_faces())
        .map(|f| {
            if mesh.is_internal(f) {
                mu_eff[owner[f]] * w[f] + mu_eff[mesh.neighbour()[f]] * (1.0 - w[f])
            } else {
                mu_eff[owner[f]]
            }
        })
        .collect();
    let mut eqn = -fvm::laplacian(mesh, &mu_f, u);

    // Explicit transpose part; `G * Sf` is `Sf · grad(U)^T` in glam's
    // column layout.
    let grad = fvc::grad_vector(mesh, u);
    let sf = mesh.face_areas();
    let mut face = vec![Vector::ZERO; mesh.n_faces()];
    for (f, t) in face.iter_mut().enumerate() {
        let g: DMat3 = if mesh.is_internal(f) {
            grad[owner[f]] * w[f] + grad[mesh.neighbour()[f]] * (1.0 - w[f])
        } else {
            grad[owner[f]]
        };
        let tr = g.x_axis.x + g.y_axis.y + g.z_axis.z;
        *t = (g * sf[f] - sf[f] * (2.0 / 3.0 * tr)) * mu_f[f];
    }
    let source = eqn.source_mut();
    for (f, &n) in mesh.neighbour().iter().enumerate() {
        source[owner[f]] += face[f];
        source[n] -= face[f];
    }
    for f in mesh.n_internal_faces()..mesh.n_faces() {
        source[owner[f]] += face[f];
    }
    eqn
}

// ── Laminar ─────────────────────────────────────────────────────

/// No turbulence: the mixture's molecular viscosity only.
#[derive(Clone, Debug, Default)]
pub struct Laminar {
    nu_t: Vec<f64>,
}

impl Laminar {
    /// Laminar model on `mesh`.
    pub fn new(mesh: &PolyMesh) -> Self {
        Self {
            nu_t: vec![0.0; mesh.n_cells()],
        }
    }
}

impl TurbulenceModel for Laminar {
    fn name(&self) -> &str {
        "laminar"
    }

    fn correct(&mut self, mesh: &PolyMesh, _fields: &FieldStore) {
        self.nu_t.resize(mesh.n_cells(), 0.0);
    }

    fn nu_t(&self) -> &[f64] {
        &self.nu_t
    }
}

// ── Smagorinsky ─────────────────────────────────────────────────

/// Smagorinsky sub-grid model, `nu_t = (Cs Δ)² |S|` with `Δ = V^(1/3)`.
#[derive(Clone, Debug)]
pub struct Smagorinsky {
    /// Model constant.
    pub cs: f64,
    nu_t: Vec<f64>,
}

impl Smagorinsky {
    /// Default constant `Cs = 0.17`.
    pub const DEFAULT_CS: f64 = 0.17;

    /// Smagorinsky model on `mesh`.
    pub fn new(mesh: &PolyMesh, cs: f64) -> Self {
        Self {
            cs,
            nu_t: vec![0.0; mesh.n_cells()],
        }
    }
}

impl TurbulenceModel for Smagorinsky {
    fn name(&self) -> &str {
        "Smagorinsky"
    }

    fn correct(&mut self, mesh: &PolyMesh, fields: &FieldStore) {
        let grad = fvc::grad_vector(mesh, &fields.u);
        self.nu_t = grad
            .iter()
            .zip(mesh.cell_volumes())
            .map(|(g, v)| {
                let s = (*g + g.transpose()) * 0.5;
                let ss = s.x_axis.length_squared()
                    + s.y_axis.length_squared()
                    + s.z_axis.length_squared();
                let delta = v.cbrt();
                (self.cs * delta).powi(2) * (2.0 * ss).sqrt()
            })
            .collect();
    }

    fn nu_t(&self) -> &[f64] {
        &self.nu_t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixture::PhaseProperties;
    use vofcap_mesh::BlockMesh;

    fn mesh() -> PolyMesh {
        BlockMesh::new([4, 4, 1], Vector::new(1.0, 1.0, 0.25))
            .build()
            .unwrap()
    }

    #[test]
    fn uniform_flow_produces_no_eddy_viscosity() {
        let mesh = mesh();
        let mut fields = FieldStore::new(&mesh);
        fields.u.values_mut().fill(Vector::new(1.0, 0.0, 0.0));
        fields.u.boundary_values_mut().fill(Vector::new(1.0, 0.0, 0.0));
        let mut model = Smagorinsky::new(&mesh, Smagorinsky::DEFAULT_CS);
        model.correct(&mesh, &fields);
        assert!(model.nu_t().iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn shear_produces_positive_eddy_viscosity() {
        let mesh = mesh();
        let mut fields = FieldStore::new(&mesh);
        for (u, c) in fields.u.values_mut().iter_mut().zip(mesh.cell_centres()) {
            *u = Vector::new(c.y, 0.0, 0.0);
        }
        fields.u.correct_boundary_conditions(&mesh);
        let mut model = Smagorinsky::new(&mesh, Smagorinsky::DEFAULT_CS);
        model.correct(&mesh, &fields);
        // Interior cells see the exact shear rate of one.
        let delta = (mesh.cell_volumes()[5]).cbrt();
        let expected = (0.17 * delta).powi(2);
        assert!((model.nu_t()[5] - expected).abs() < 1e-12);
    }

    #[test]
    fn laminar_stress_is_a_negative_laplacian() {
        let mesh = mesh();
        let mut fields = FieldStore::new(&mesh);
        let mut mix = ImmiscibleMixture::new(PhaseProperties::default(), &mesh);
        mix.correct(&mesh, &mut fields);
        let mut model = Laminar::new(&mesh);
        model.correct(&mesh, &fields);
        let eqn = model.div_dev_rho_reff(&mesh, &fields, &mix);
        assert!(eqn.diag().iter().all(|d| *d > 0.0));
        assert!(eqn.upper().iter().all(|u| *u < 0.0));
    }
}
