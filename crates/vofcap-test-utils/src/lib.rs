//! Test meshes, initial fields and mock mesh engines for vofcap
//! development.
//!
//! Everything here is deterministic: random fields are drawn from a
//! seeded ChaCha8 generator so a failing test replays exactly.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod engines;

use std::f64::consts::PI;

use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use vofcap_core::Vector;
use vofcap_fields::FieldStore;
use vofcap_mesh::{BlockMesh, PatchKind, PolyMesh, Side};

pub use engines::{ScriptedMeshEngine, ScriptedStep};

// ── Meshes ──────────────────────────────────────────────────────

/// Closed box of `cells` divisions spanning `size`, all walls.
pub fn closed_tank(cells: [usize; 3], size: Vector) -> PolyMesh {
    BlockMesh::new(cells, size)
        .build()
        .expect("tank dimensions are positive")
}

/// Box open to the atmosphere at the top (`z` max).
pub fn open_tank(cells: [usize; 3], size: Vector) -> PolyMesh {
    BlockMesh::new(cells, size)
        .patch(Side::ZMax, PatchKind::FixedPressure)
        .build()
        .expect("tank dimensions are positive")
}

// ── Initial fields ──────────────────────────────────────────────

/// Liquid column in the corner `x < width`, `z < height`; gas elsewhere.
pub fn dam_break(mesh: &PolyMesh, width: f64, height: f64) -> FieldStore {
    let mut fields = FieldStore::new(mesh);
    for (i, c) in mesh.cell_centres().iter().enumerate() {
        fields.alpha1[i] = if c.x < width && c.z < height { 1.0 } else { 0.0 };
    }
    fields.alpha1.correct_boundary_conditions(mesh);
    fields.update_alpha2();
    fields
}

/// Liquid below `level`, gas above.
pub fn still_water(mesh: &PolyMesh, level: f64) -> FieldStore {
    dam_break(mesh, f64::INFINITY, level)
}

/// Set `alpha1 = 1` inside the square of half-width `half` around
/// `centre` in the `x`-`y` plane, 0 elsewhere.
pub fn square_blob(mesh: &PolyMesh, fields: &mut FieldStore, centre: Vector, half: f64) {
    for (i, c) in mesh.cell_centres().iter().enumerate() {
        let inside = (c.x - centre.x).abs() < half && (c.y - centre.y).abs() < half;
        fields.alpha1[i] = if inside { 1.0 } else { 0.0 };
    }
    fields.alpha1.correct_boundary_conditions(mesh);
    fields.update_alpha2();
}

/// Divergence-free face flux of the vortex with stream function
/// `amplitude sin(pi x) sin(pi y)` on the unit square.
///
/// `spacing` is the cell size of the block the mesh was built from. The
/// stream function vanishes on the square's edges, so boundary fluxes are
/// zero and the flux around every cell sums to zero up to round-off.
pub fn rotating_flux(mesh: &PolyMesh, spacing: Vector, amplitude: f64) -> Vec<f64> {
    let psi = |x: f64, y: f64| amplitude * (PI * x).sin() * (PI * y).sin();
    let half = spacing * 0.5;
    mesh.face_centres()
        .iter()
        .zip(mesh.face_areas())
        .map(|(c, sf)| {
            let n = sf.normalize_or_zero();
            if n.x.abs() > 0.5 {
                n.x.signum() * (psi(c.x, c.y + half.y) - psi(c.x, c.y - half.y)) * spacing.z
            } else if n.y.abs() > 0.5 {
                -n.y.signum() * (psi(c.x + half.x, c.y) - psi(c.x - half.x, c.y)) * spacing.z
            } else {
                0.0
            }
        })
        .collect()
}

// ── Random fields ───────────────────────────────────────────────

fn unit_interval(rng: &mut ChaCha8Rng) -> f64 {
    (rng.next_u64() >> 11) as f64 / (1u64 << 53) as f64
}

/// Cell velocities with components uniform in `[-amplitude, amplitude]`.
pub fn random_velocity(mesh: &PolyMesh, seed: u64, amplitude: f64) -> Vec<Vector> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..mesh.n_cells())
        .map(|_| {
            let mut c = || (2.0 * unit_interval(&mut rng) - 1.0) * amplitude;
            Vector::new(c(), c(), c())
        })
        .collect()
}

/// Phase fractions uniform in `[0, 1]`, with about a third of the cells
/// snapped to exactly 0 or 1.
pub fn random_fraction(mesh: &PolyMesh, seed: u64) -> Vec<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..mesh.n_cells())
        .map(|_| {
            let a = unit_interval(&mut rng);
            match rng.next_u32() % 6 {
                0 => 0.0,
                1 => 1.0,
                _ => a,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dam_break_fills_the_corner() {
        let mesh = closed_tank([4, 1, 4], Vector::new(1.0, 0.25, 1.0));
        let f = dam_break(&mesh, 0.5, 0.5);
        let liquid = f.alpha1.values().iter().filter(|a| **a == 1.0).count();
        assert_eq!(liquid, 4);
        assert_eq!(f.alpha2[0], 0.0);
    }

    #[test]
    fn rotating_flux_is_solenoidal() {
        let n = 10;
        let h = 1.0 / n as f64;
        let mesh = closed_tank([n, n, 1], Vector::new(1.0, 1.0, h));
        let phi = rotating_flux(&mesh, Vector::splat(h), 1.0);
        let owner = mesh.owner();
        let mut net = vec![0.0; mesh.n_cells()];
        for (f, &nb) in mesh.neighbour().iter().enumerate() {
            net[owner[f]] += phi[f];
            net[nb] -= phi[f];
        }
        for f in mesh.n_internal_faces()..mesh.n_faces() {
            assert!(phi[f].abs() < 1e-15);
            net[owner[f]] += phi[f];
        }
        assert!(net.iter().all(|s| s.abs() < 1e-14));
        assert!(phi.iter().any(|p| p.abs() > 1e-3));
    }

    #[test]
    fn random_fields_are_seeded() {
        let mesh = closed_tank([3, 3, 1], Vector::ONE);
        assert_eq!(random_velocity(&mesh, 3, 1.0), random_velocity(&mesh, 3, 1.0));
        assert_ne!(random_velocity(&mesh, 3, 1.0), random_velocity(&mesh, 4, 1.0));
        let a = random_fraction(&mesh, 9);
        assert!(a.iter().all(|v| (0.0..=1.0).contains(v)));
    }
}
