//! Implicit finite-volume operators.

use vofcap_core::FieldValue;
use vofcap_fields::{Bc, VolField};
use vofcap_mesh::PolyMesh;

use crate::matrix::FvMatrix;

/// Euler implicit time derivative `d(rho x)/dt`.
///
/// `r_delta_t` holds one reciprocal time step per cell so that local time
/// stepping and uniform stepping share one path. Pass unit densities for a
/// plain `dx/dt`.
pub fn ddt<T: FieldValue>(
    mesh: &PolyMesh,
    r_delta_t: &[f64],
    rho: &[f64],
    rho_old: &[f64],
    x_old: &[T],
) -> FvMatrix<T> {
    let mut m = FvMatrix::new(mesh);
    let vol = mesh.cell_volumes();
    for i in 0..mesh.n_cells() {
        let c = r_delta_t[i] * vol[i];
        m.diag_mut()[i] = c * rho[i];
        m.source_mut()[i] = x_old[i] * (c * rho_old[i]);
    }
    m
}

/// First-order upwind convection `div(flux, x)`.
///
/// Fixed-value boundaries always convect their boundary value; other
/// boundaries convect the cell value on outflow and the boundary value on
/// inflow.
pub fn div_upwind<T: FieldValue>(
    mesh: &PolyMesh,
    flux: &[f64],
    field: &VolField<T>,
) -> FvMatrix<T> {
    let mut m = FvMatrix::new(mesh);
    let owner = mesh.owner();
    for (f, &n) in mesh.neighbour().iter().enumerate() {
        let o = owner[f];
        let phi = flux[f];
        if phi >= 0.0 {
            m.diag_mut()[o] += phi;
            m.lower_mut()[f] -= phi;
        } else {
            m.upper_mut()[f] += phi;
            m.diag_mut()[n] -= phi;
        }
    }
    for f in mesh.n_internal_faces()..mesh.n_faces() {
        let o = owner[f];
        let phi = flux[f];
        let xb = field.boundary_value(mesh, f);
        match field.face_bc(mesh, f) {
            Bc::FixedValue(_) => m.source_mut()[o] -= xb * phi,
            _ if phi >= 0.0 => m.diag_mut()[o] += phi,
            _ => m.source_mut()[o] -= xb * phi,
        }
    }
    m
}

/// Laplacian `div(gamma grad x)` with face diffusivity `gamma_f`.
///
/// Fixed-value and calculated boundaries contribute through their boundary
/// value; zero-gradient and slip boundaries add nothing.
pub fn laplacian<T: FieldValue>(
    mesh: &PolyMesh,
    gamma_f: &[f64],
    field: &VolField<T>,
) -> FvMatrix<T> {
    let mut m = FvMatrix::new(mesh);
    let owner = mesh.owner();
    let mag_sf = mesh.mag_face_areas();
    let dc = mesh.delta_coeffs();
    for (f, &n) in mesh.neighbour().iter().enumerate() {
        let c = gamma_f[f] * mag_sf[f] * dc[f];
        m.upper_mut()[f] += c;
        m.lower_mut()[f] += c;
        m.diag_mut()[owner[f]] -= c;
        m.diag_mut()[n] -= c;
    }
    for f in mesh.n_internal_faces()..mesh.n_faces() {
        if matches!(field.face_bc(mesh, f), Bc::FixedValue(_) | Bc::Calculated) {
            let c = gamma_f[f] * mag_sf[f] * dc[f];
            let o = owner[f];
            m.diag_mut()[o] -= c;
            m.source_mut()[o] -= field.boundary_value(mesh, f) * c;
        }
    }
    m
}
