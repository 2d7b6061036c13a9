//! Explicit finite-volume operators.
//!
//! Every function evaluates its result from current field values; none of
//! them assemble a matrix. Face results cover all faces, internal first.

use glam::DMat3;
use vofcap_core::{FieldValue, Vector, VSMALL};
use vofcap_fields::{SurfaceField, VolField};
use vofcap_mesh::PolyMesh;

/// Linear interpolation of a cell field to faces.
///
/// Boundary faces take the field's boundary value.
pub fn interpolate<T: FieldValue>(mesh: &PolyMesh, field: &VolField<T>) -> SurfaceField<T> {
    let w = mesh.weights();
    let owner = mesh.owner();
    let vals = field.values();
    let mut out = Vec::with_capacity(mesh.n_faces());
    for (f, &n) in mesh.neighbour().iter().enumerate() {
        out.push(vals[owner[f]] * w[f] + vals[n] * (1.0 - w[f]));
    }
    out.extend_from_slice(field.boundary_values());
    SurfaceField::from_values(format!("interpolate({})", field.name()), out)
}

/// Face-wise minimum of the two adjacent cell values.
pub fn local_min(mesh: &PolyMesh, field: &VolField<f64>) -> SurfaceField<f64> {
    let owner = mesh.owner();
    let vals = field.values();
    let mut out = Vec::with_capacity(mesh.n_faces());
    for (f, &n) in mesh.neighbour().iter().enumerate() {
        out.push(vals[owner[f]].min(vals[n]));
    }
    out.extend_from_slice(field.boundary_values());
    SurfaceField::from_values(format!("localMin({})", field.name()), out)
}

/// Face-normal gradient, uncorrected.
pub fn sn_grad(mesh: &PolyMesh, field: &VolField<f64>) -> SurfaceField<f64> {
    let owner = mesh.owner();
    let dc = mesh.delta_coeffs();
    let vals = field.values();
    let n_internal = mesh.n_internal_faces();
    let mut out = Vec::with_capacity(mesh.n_faces());
    for (f, &n) in mesh.neighbour().iter().enumerate() {
        out.push((vals[n] - vals[owner[f]]) * dc[f]);
    }
    for (b, vb) in field.boundary_values().iter().enumerate() {
        let f = n_internal + b;
        out.push((vb - vals[owner[f]]) * dc[f]);
    }
    SurfaceField::from_values(format!("snGrad({})", field.name()), out)
}

/// Volumetric flux `Sf · U_f` of a cell vector field.
pub fn flux(mesh: &PolyMesh, field: &VolField<Vector>) -> SurfaceField<f64> {
    let uf = interpolate(mesh, field);
    face_flux(mesh, &uf)
}

/// Volumetric flux `Sf · Uf` of a face vector field.
pub fn face_flux(mesh: &PolyMesh, uf: &SurfaceField<Vector>) -> SurfaceField<f64> {
    let vals = mesh
        .face_areas()
        .iter()
        .zip(uf.values())
        .map(|(sf, u)| sf.dot(*u))
        .collect();
    SurfaceField::from_values(format!("flux({})", uf.name()), vals)
}

/// Net outflow of a face quantity from each cell.
pub fn surface_sum(mesh: &PolyMesh, phi: &[f64]) -> Vec<f64> {
    let owner = mesh.owner();
    let mut out = vec![0.0; mesh.n_cells()];
    for (f, &n) in mesh.neighbour().iter().enumerate() {
        out[owner[f]] += phi[f];
        out[n] -= phi[f];
    }
    for f in mesh.n_internal_faces()..mesh.n_faces() {
        out[owner[f]] += phi[f];
    }
    out
}

/// Sum of face-quantity magnitudes around each cell.
pub fn surface_sum_mag(mesh: &PolyMesh, phi: &[f64]) -> Vec<f64> {
    let owner = mesh.owner();
    let mut out = vec![0.0; mesh.n_cells()];
    for (f, &n) in mesh.neighbour().iter().enumerate() {
        out[owner[f]] += phi[f].abs();
        out[n] += phi[f].abs();
    }
    for f in mesh.n_internal_faces()..mesh.n_faces() {
        out[owner[f]] += phi[f].abs();
    }
    out
}

/// Divergence of a face flux, per unit volume.
pub fn div(mesh: &PolyMesh, phi: &[f64]) -> Vec<f64> {
    let mut out = surface_sum(mesh, phi);
    for (v, vol) in out.iter_mut().zip(mesh.cell_volumes()) {
        *v /= vol;
    }
    out
}

/// Gauss gradient of a scalar with linear face interpolation.
pub fn grad(mesh: &PolyMesh, field: &VolField<f64>) -> Vec<Vector> {
    let vf = interpolate(mesh, field);
    let owner = mesh.owner();
    let sf = mesh.face_areas();
    let mut out = vec![Vector::ZERO; mesh.n_cells()];
    for (f, &n) in mesh.neighbour().iter().enumerate() {
        let c = sf[f] * vf[f];
        out[owner[f]] += c;
        out[n] -= c;
    }
    for f in mesh.n_internal_faces()..mesh.n_faces() {
        out[owner[f]] += sf[f] * vf[f];
    }
    for (g, vol) in out.iter_mut().zip(mesh.cell_volumes()) {
        *g /= *vol;
    }
    out
}

/// Gauss gradient of a vector, `G[i][j] = d u_j / d x_i`.
///
/// Stored column-major as `glam` does: column `j` is the gradient of
/// component `j`.
pub fn grad_vector(mesh: &PolyMesh, field: &VolField<Vector>) -> Vec<DMat3> {
    let uf = interpolate(mesh, field);
    let owner = mesh.owner();
    let sf = mesh.face_areas();
    let outer = |s: Vector, u: Vector| DMat3::from_cols(s * u.x, s * u.y, s * u.z);
    let mut out = vec![DMat3::ZERO; mesh.n_cells()];
    for (f, &n) in mesh.neighbour().iter().enumerate() {
        let c = outer(sf[f], uf[f]);
        out[owner[f]] += c;
        out[n] -= c;
    }
    for f in mesh.n_internal_faces()..mesh.n_faces() {
        out[owner[f]] += outer(sf[f], uf[f]);
    }
    for (g, vol) in out.iter_mut().zip(mesh.cell_volumes()) {
        *g = *g * (1.0 / *vol);
    }
    out
}

/// Least-squares cell vector whose face-normal components best match a
/// face flux per unit area.
///
/// Solves `(Σ Sf Sf / |Sf|) U = Σ (Sf / |Sf|) flux` per cell. A face flux
/// that is itself `Sf · U` for uniform `U` is reconstructed exactly.
pub fn reconstruct(mesh: &PolyMesh, flux: &[f64]) -> Vec<Vector> {
    let owner = mesh.owner();
    let sf = mesh.face_areas();
    let mag_sf = mesh.mag_face_areas();
    let n_cells = mesh.n_cells();
    let mut tensor = vec![DMat3::ZERO; n_cells];
    let mut rhs = vec![Vector::ZERO; n_cells];

    let mut add = |cell: usize, f: usize| {
        let s = sf[f];
        let inv = 1.0 / mag_sf[f].max(VSMALL);
        tensor[cell] += DMat3::from_cols(s * (s.x * inv), s * (s.y * inv), s * (s.z * inv));
        rhs[cell] += s * (flux[f] * inv);
    };
    for (f, &n) in mesh.neighbour().iter().enumerate() {
        add(owner[f], f);
        add(n, f);
    }
    for f in mesh.n_internal_faces()..mesh.n_faces() {
        add(owner[f], f);
    }

    tensor
        .iter()
        .zip(&rhs)
        .map(|(t, b)| {
            let det = t.determinant();
            if det.abs() > VSMALL {
                t.inverse() * *b
            } else {
                Vector::ZERO
            }
        })
        .collect()
}

/// Spread large values to neighbours so adjacent cells differ by at most
/// a factor `1 + coeff`.
///
/// Used to smooth local time-step rates: a cell never keeps a rate below
/// `neighbour / (1 + coeff)`.
pub fn smooth(mesh: &PolyMesh, field: &mut [f64], coeff: f64) {
    let ratio = 1.0 + coeff;
    let owner = mesh.owner();
    let neighbour = mesh.neighbour();
    // Each sweep propagates the constraint at least one face further.
    for _ in 0..mesh.n_cells() {
        let mut changed = false;
        for (f, &n) in neighbour.iter().enumerate() {
            let o = owner[f];
            if field[o] < field[n] / ratio {
                field[o] = field[n] / ratio;
                changed = true;
            } else if field[n] < field[o] / ratio {
                field[n] = field[o] / ratio;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}
