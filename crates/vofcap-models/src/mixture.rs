//! Incompressible two-phase mixture.

use serde::{Deserialize, Serialize};
use vofcap_core::{Vector, VSMALL};
use vofcap_fields::{FieldStore, VolField};
use vofcap_fvm::fvc;
use vofcap_mesh::PolyMesh;

/// Constant properties of the two phases and their interface.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseProperties {
    /// Phase-1 density.
    pub rho1: f64,
    /// Phase-2 density.
    pub rho2: f64,
    /// Phase-1 kinematic viscosity.
    pub nu1: f64,
    /// Phase-2 kinematic viscosity.
    pub nu2: f64,
    /// Surface tension coefficient.
    pub sigma: f64,
}

impl Default for PhaseProperties {
    /// Water and air at room temperature.
    fn default() -> Self {
        Self {
            rho1: 1000.0,
            rho2: 1.0,
            nu1: 1e-6,
            nu2: 1.48e-5,
            sigma: 0.07,
        }
    }
}

/// Mixture of two immiscible, constant-density phases.
///
/// [`correct`](ImmiscibleMixture::correct) recomputes density and the
/// interface geometry (unit normal flux and curvature) from the current
/// phase fraction. Everything else is read from those cached values.
#[derive(Clone, Debug)]
pub struct ImmiscibleMixture {
    props: PhaseProperties,
    /// Stabilisation for the interface normal where `grad(alpha1)` vanishes.
    delta_n: f64,
    n_hatf: Vec<f64>,
    curvature: Vec<f64>,
}

impl ImmiscibleMixture {
    /// Mixture on `mesh` with flat interface state.
    pub fn new(props: PhaseProperties, mesh: &PolyMesh) -> Self {
        let mean_vol = mesh.total_volume() / mesh.n_cells().max(1) as f64;
        Self {
            props,
            delta_n: 1e-8 / mean_vol.cbrt(),
            n_hatf: vec![0.0; mesh.n_faces()],
            curvature: vec![0.0; mesh.n_cells()],
        }
    }

    /// Phase properties.
    pub fn properties(&self) -> &PhaseProperties {
        &self.props
    }

    /// Phase-1 density.
    pub fn rho1(&self) -> f64 {
        self.props.rho1
    }

    /// Phase-2 density.
    pub fn rho2(&self) -> f64 {
        self.props.rho2
    }

    /// Refresh `alpha2`, `rho` and the interface geometry.
    ///
    /// Geometry arrays are resized when the mesh has changed.
    pub fn correct(&mut self, mesh: &PolyMesh, fields: &mut FieldStore) {
        fields.update_alpha2();
        let (rho1, rho2) = (self.props.rho1, self.props.rho2);
        let mix = |a1: f64| a1 * rho1 + (1.0 - a1) * rho2;
        for (r, a1) in fields.rho.values_mut().iter_mut().zip(fields.alpha1.values()) {
            *r = mix(*a1);
        }
        for (r, a1) in fields
            .rho
            .boundary_values_mut()
            .iter_mut()
            .zip(fields.alpha1.boundary_values())
        {
            *r = mix(*a1);
        }
        self.calculate_curvature(mesh, &fields.alpha1);
    }

    fn calculate_curvature(&mut self, mesh: &PolyMesh, alpha1: &VolField<f64>) {
        let grad = fvc::grad(mesh, alpha1);
        let owner = mesh.owner();
        let w = mesh.weights();
        let sf = mesh.face_areas();
        self.n_hatf.resize(mesh.n_faces(), 0.0);
        for f in 0..mesh.n_faces() {
            let gf: Vector = if mesh.is_internal(f) {
                grad[owner[f]] * w[f] + grad[mesh.neighbour()[f]] * (1.0 - w[f])
            } else {
                grad[owner[f]]
            };
            let n_hat = gf / (gf.length() + self.delta_n);
            self.n_hatf[f] = n_hat.dot(sf[f]);
        }
        self.curvature = fvc::div(mesh, &self.n_hatf)
            .into_iter()
            .map(|k| -k)
            .collect();
    }

    /// Interface unit normal projected on each face area vector.
    pub fn n_hatf(&self) -> &[f64] {
        &self.n_hatf
    }

    /// Interface curvature per cell, `-div(n_hat)`.
    pub fn curvature(&self) -> &[f64] {
        &self.curvature
    }

    /// Face surface-tension force `sigma * K_f * snGrad(alpha1)`.
    pub fn surface_tension_force(&self, mesh: &PolyMesh, alpha1: &VolField<f64>) -> Vec<f64> {
        let sn = fvc::sn_grad(mesh, alpha1);
        let owner = mesh.owner();
        let w = mesh.weights();
        let k = &self.curvature;
        (0..mesh.n_faces())
            .map(|f| {
                let kf = if mesh.is_internal(f) {
                    k[owner[f]] * w[f] + k[mesh.neighbour()[f]] * (1.0 - w[f])
                } else {
                    k[owner[f]]
                };
                self.props.sigma * kf * sn[f]
            })
            .collect()
    }

    /// Dynamic viscosity per cell, with `alpha1` clipped to `[0, 1]`.
    pub fn mu(&self, alpha1: &VolField<f64>) -> Vec<f64> {
        let p = &self.props;
        alpha1
            .values()
            .iter()
            .map(|a| {
                let a = a.clamp(0.0, 1.0);
                a * p.rho1 * p.nu1 + (1.0 - a) * p.rho2 * p.nu2
            })
            .collect()
    }

    /// Kinematic mixture viscosity per cell.
    pub fn nu(&self, alpha1: &VolField<f64>) -> Vec<f64> {
        let p = &self.props;
        self.mu(alpha1)
            .into_iter()
            .zip(alpha1.values())
            .map(|(mu, a)| {
                let a = a.clamp(0.0, 1.0);
                mu / (a * p.rho1 + (1.0 - a) * p.rho2).max(VSMALL)
            })
            .collect()
    }
}
