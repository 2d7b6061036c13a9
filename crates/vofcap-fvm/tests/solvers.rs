//! Integration test: linear solvers on assembled Laplacians.
//!
//! A one-dimensional Laplacian with fixed end values has a linear exact
//! solution, so both solvers can be checked against it for any end
//! values, including the uniform case where both ends agree.

use proptest::prelude::*;
use vofcap_core::Vector;
use vofcap_fields::{Bc, VolField};
use vofcap_fvm::{fvm, FvMatrix, GaussSeidel, LinearSolver, Pcg, SolverControls};
use vofcap_mesh::{BlockMesh, PatchKind, PolyMesh, Side};

fn channel(n: usize) -> PolyMesh {
    BlockMesh::new([n, 1, 1], Vector::new(1.0, 0.1, 0.1))
        .patch(Side::XMin, PatchKind::FixedPressure)
        .patch(Side::XMax, PatchKind::FixedPressure)
        .build()
        .unwrap()
}

fn laplacian(mesh: &PolyMesh, left: f64, right: f64) -> FvMatrix<f64> {
    let mut p = VolField::uniform("p", mesh, 0.0, |k| match k {
        PatchKind::FixedPressure => Bc::FixedValue(0.0),
        _ => Bc::ZeroGradient,
    });
    p.set_bc(Side::XMin as usize, Bc::FixedValue(left));
    p.set_bc(Side::XMax as usize, Bc::FixedValue(right));
    p.correct_boundary_conditions(mesh);
    fvm::laplacian(mesh, &vec![1.0; mesh.n_faces()], &p)
}

const CONTROLS: SolverControls = SolverControls {
    tolerance: 1e-10,
    rel_tol: 0.0,
    max_iter: 500,
};

#[test]
fn equal_end_values_give_a_uniform_field() {
    let mesh = channel(12);
    let m = laplacian(&mesh, 2.5, 2.5);
    let mut x = vec![0.0; mesh.n_cells()];
    Pcg.solve("p", &m, &mut x, &CONTROLS).unwrap();
    assert!(x.iter().all(|v| (v - 2.5).abs() < 1e-6), "{x:?}");

    // Starting from the answer needs no iterations.
    let perf = Pcg.solve("p", &m, &mut x, &CONTROLS).unwrap();
    assert!(perf.converged);
}

#[test]
fn gauss_seidel_matches_pcg() {
    let mesh = channel(8);
    let m = laplacian(&mesh, -1.0, 3.0);
    let mut x1 = vec![0.0; mesh.n_cells()];
    let mut x2 = vec![0.0; mesh.n_cells()];
    Pcg.solve("p", &m, &mut x1, &CONTROLS).unwrap();
    GaussSeidel::default().solve("p", &m, &mut x2, &CONTROLS).unwrap();
    for (a, b) in x1.iter().zip(&x2) {
        assert!((a - b).abs() < 1e-6);
    }
}

proptest! {
    #[test]
    fn pcg_solves_negative_definite_laplacian(
        left in -5.0f64..5.0,
        right in -5.0f64..5.0,
        n in 3usize..20,
    ) {
        let mesh = channel(n);
        let m = laplacian(&mesh, left, right);
        let mut x = vec![0.0; mesh.n_cells()];
        Pcg.solve("p", &m, &mut x, &CONTROLS).unwrap();
        for (c, xi) in mesh.cell_centres().iter().zip(&x) {
            let exact = left + (right - left) * c.x;
            prop_assert!((xi - exact).abs() < 1e-6, "x({}) = {} vs {}", c.x, xi, exact);
        }
    }
}
