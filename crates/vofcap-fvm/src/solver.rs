//! Linear solvers for assembled finite-volume equations.

use tracing::debug;
use vofcap_core::{FieldValue, Vector, VSMALL};

use crate::error::SolveError;
use crate::matrix::FvMatrix;

/// Stopping criteria for one solve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolverControls {
    /// Absolute normalised residual at which to stop.
    pub tolerance: f64,
    /// Stop once the residual has fallen by this factor; `0` disables.
    pub rel_tol: f64,
    /// Iteration budget.
    pub max_iter: usize,
}

impl Default for SolverControls {
    fn default() -> Self {
        Self {
            tolerance: 1e-7,
            rel_tol: 0.0,
            max_iter: 1000,
        }
    }
}

impl SolverControls {
    /// `current` is the normalised residual; `relative` the residual
    /// against the source, which decides when the normalisation collapses.
    fn converged(&self, initial: f64, current: f64, relative: f64) -> bool {
        current <= self.tolerance
            || relative <= self.tolerance
            || (self.rel_tol > 0.0 && current <= self.rel_tol * initial)
    }
}

/// Residual history of one solve.
#[derive(Clone, Debug, PartialEq)]
pub struct SolverPerformance {
    /// Solver name.
    pub solver: &'static str,
    /// Field (and component) solved for.
    pub field: String,
    /// Normalised residual before the first iteration.
    pub initial_residual: f64,
    /// Normalised residual after the last iteration.
    pub final_residual: f64,
    /// Iterations performed.
    pub iterations: usize,
    /// Whether the stopping criteria were met.
    pub converged: bool,
}

/// A solver for `A x = b`.
///
/// `x` holds the initial guess on entry and the best iterate on exit,
/// including when the solve fails to converge. A singular matrix leaves
/// `x` untouched.
pub trait LinearSolver: Send + Sync {
    /// Short solver name used in logs.
    fn name(&self) -> &'static str;

    /// Solve for `x`.
    fn solve(
        &self,
        field: &str,
        matrix: &FvMatrix<f64>,
        x: &mut [f64],
        controls: &SolverControls,
    ) -> Result<SolverPerformance, SolveError>;
}

fn finish(perf: SolverPerformance) -> Result<SolverPerformance, SolveError> {
    debug!(
        solver = perf.solver,
        field = %perf.field,
        initial_residual = perf.initial_residual,
        final_residual = perf.final_residual,
        iterations = perf.iterations,
        "linear solve"
    );
    if perf.converged {
        Ok(perf)
    } else {
        Err(SolveError::NotConverged { performance: perf })
    }
}

// ── Pcg ─────────────────────────────────────────────────────────

/// Conjugate gradients with a diagonal (Jacobi) preconditioner.
///
/// For symmetric matrices only. A negative-definite system, as assembled
/// by a Laplacian, is solved through its negation.
#[derive(Clone, Copy, Debug, Default)]
pub struct Pcg;

impl LinearSolver for Pcg {
    fn name(&self) -> &'static str {
        "PCG"
    }

    fn solve(
        &self,
        field: &str,
        matrix: &FvMatrix<f64>,
        x: &mut [f64],
        controls: &SolverControls,
    ) -> Result<SolverPerformance, SolveError> {
        matrix.check_diagonal(field)?;
        let n = x.len();
        let sign = if matrix.diag().iter().sum::<f64>() < 0.0 {
            -1.0
        } else {
            1.0
        };
        let diag: Vec<f64> = matrix.diag().iter().map(|d| sign * d).collect();

        let initial = matrix.normalised_residual(x);
        let mut perf = SolverPerformance {
            solver: self.name(),
            field: field.to_string(),
            initial_residual: initial,
            final_residual: initial,
            iterations: 0,
            converged: controls.converged(initial, initial, matrix.relative_residual(x)),
        };
        if perf.converged {
            return finish(perf);
        }

        let ax = matrix.mul(x);
        let mut r: Vec<f64> = (0..n).map(|i| sign * (matrix.source()[i] - ax[i])).collect();
        let mut p = vec![0.0; n];
        let mut rz_old = 0.0;
        let mut best = x.to_vec();

        while perf.iterations < controls.max_iter {
            let z: Vec<f64> = r.iter().zip(&diag).map(|(r, d)| r / d).collect();
            let rz: f64 = r.iter().zip(&z).map(|(a, b)| a * b).sum();
            if perf.iterations == 0 {
                p.copy_from_slice(&z);
            } else {
                let beta = rz / rz_old;
                for (p, z) in p.iter_mut().zip(&z) {
                    *p = z + beta * *p;
                }
            }
            rz_old = rz;

            let q: Vec<f64> = matrix.mul(&p).iter().map(|q| sign * q).collect();
            let pq: f64 = p.iter().zip(&q).map(|(a, b)| a * b).sum();
            if pq.abs() < VSMALL {
                break;
            }
            let alpha = rz / pq;
            for i in 0..n {
                x[i] += alpha * p[i];
                r[i] -= alpha * q[i];
            }
            perf.iterations += 1;

            let res = matrix.normalised_residual(x);
            if !res.is_finite() {
                x.copy_from_slice(&best);
                break;
            }
            best.copy_from_slice(x);
            perf.final_residual = res;
            if controls.converged(initial, res, matrix.relative_residual(x)) {
                perf.converged = true;
                break;
            }
        }
        finish(perf)
    }
}

// ── GaussSeidel ─────────────────────────────────────────────────

/// Symmetric Gauss-Seidel smoother, usable on asymmetric matrices.
#[derive(Clone, Copy, Debug)]
pub struct GaussSeidel {
    /// Sweeps between residual checks.
    pub sweeps_per_check: usize,
}

impl Default for GaussSeidel {
    fn default() -> Self {
        Self {
            sweeps_per_check: 1,
        }
    }
}

impl GaussSeidel {
    fn sweep(matrix: &FvMatrix<f64>, x: &mut [f64], rows: impl Iterator<Item = usize>) {
        let addr = matrix.addressing();
        let (lower, upper) = (addr.lower(), addr.upper());
        for i in rows {
            let mut s = matrix.source()[i];
            for &f in addr.row_faces(i) {
                if lower[f] == i {
                    s -= matrix.upper()[f] * x[upper[f]];
                } else {
                    s -= matrix.lower()[f] * x[lower[f]];
                }
            }
            x[i] = s / matrix.diag()[i];
        }
    }
}

impl LinearSolver for GaussSeidel {
    fn name(&self) -> &'static str {
        "GaussSeidel"
    }

    fn solve(
        &self,
        field: &str,
        matrix: &FvMatrix<f64>,
        x: &mut [f64],
        controls: &SolverControls,
    ) -> Result<SolverPerformance, SolveError> {
        matrix.check_diagonal(field)?;
        let n = x.len();
        let initial = matrix.normalised_residual(x);
        let mut perf = SolverPerformance {
            solver: self.name(),
            field: field.to_string(),
            initial_residual: initial,
            final_residual: initial,
            iterations: 0,
            converged: controls.converged(initial, initial, matrix.relative_residual(x)),
        };
        let mut best = x.to_vec();
        while !perf.converged && perf.iterations < controls.max_iter {
            for _ in 0..self.sweeps_per_check.max(1) {
                Self::sweep(matrix, x, 0..n);
                Self::sweep(matrix, x, (0..n).rev());
            }
            perf.iterations += self.sweeps_per_check.max(1);
            let res = matrix.normalised_residual(x);
            if !res.is_finite() {
                x.copy_from_slice(&best);
                break;
            }
            best.copy_from_slice(x);
            perf.final_residual = res;
            perf.converged = controls.converged(initial, res, matrix.relative_residual(x));
        }
        finish(perf)
    }
}

// ── Vector equations ────────────────────────────────────────────

/// Solve a vector equation one component at a time.
///
/// Every component is attempted even when an earlier one fails to
/// converge; the first failure is returned after all components have
/// been written back. A singular matrix returns before touching `x`.
pub fn solve_vector(
    solver: &dyn LinearSolver,
    field: &str,
    matrix: &FvMatrix<Vector>,
    x: &mut [Vector],
    controls: &SolverControls,
) -> Result<Vec<SolverPerformance>, SolveError> {
    matrix.check_diagonal(field)?;
    let mut perfs = Vec::with_capacity(3);
    let mut failure = None;
    for cmpt in 0..<Vector as FieldValue>::COMPONENTS {
        let m = matrix.component(cmpt);
        let mut xc: Vec<f64> = x.iter().map(|v| v.component(cmpt)).collect();
        let name = format!("{field}.{}", ["x", "y", "z"][cmpt]);
        match solver.solve(&name, &m, &mut xc, controls) {
            Ok(p) => perfs.push(p),
            Err(SolveError::NotConverged { performance }) => {
                perfs.push(performance.clone());
                failure.get_or_insert(SolveError::NotConverged { performance });
            }
            Err(e) => return Err(e),
        }
        for (v, c) in x.iter_mut().zip(&xc) {
            v.set_component(cmpt, *c);
        }
    }
    match failure {
        Some(e) => Err(e),
        None => Ok(perfs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vofcap_mesh::{BlockMesh, PolyMesh};

    fn mesh() -> PolyMesh {
        BlockMesh::new([6, 5, 1], Vector::new(6.0, 5.0, 1.0))
            .build()
            .unwrap()
    }

    fn spd(mesh: &PolyMesh) -> FvMatrix<f64> {
        let mut m = FvMatrix::new(mesh);
        for f in 0..mesh.n_internal_faces() {
            m.upper_mut()[f] = -1.0;
            m.lower_mut()[f] = -1.0;
        }
        for (i, d) in m.diag_mut().iter_mut().enumerate() {
            *d = 4.5 + (i % 3) as f64;
        }
        m
    }

    #[test]
    fn pcg_and_gauss_seidel_agree() {
        let mesh = mesh();
        let mut m = spd(&mesh);
        let exact: Vec<f64> = (0..mesh.n_cells()).map(|i| (i as f64).sin()).collect();
        let b = m.mul(&exact);
        m.source_mut().copy_from_slice(&b);
        let controls = SolverControls {
            tolerance: 1e-12,
            rel_tol: 0.0,
            max_iter: 500,
        };

        let mut x1 = vec![0.0; mesh.n_cells()];
        let p1 = Pcg.solve("x", &m, &mut x1, &controls).unwrap();
        let mut x2 = vec![0.0; mesh.n_cells()];
        let p2 = GaussSeidel::default()
            .solve("x", &m, &mut x2, &controls)
            .unwrap();
        assert!(p1.converged && p2.converged);
        for i in 0..mesh.n_cells() {
            assert!((x1[i] - exact[i]).abs() < 1e-9);
            assert!((x2[i] - exact[i]).abs() < 1e-9);
        }
    }

    #[test]
    fn uniform_exact_start_is_converged() {
        // Row sums of one make A x_ref equal to b, so the normalising
        // factor is pure rounding noise.
        let mesh = mesh();
        let mut m = FvMatrix::new(&mesh);
        for f in 0..mesh.n_internal_faces() {
            m.upper_mut()[f] = -0.1;
            m.lower_mut()[f] = -0.1;
        }
        let mut diag = vec![1.0; mesh.n_cells()];
        let addr = m.addressing();
        for (&l, &u) in addr.lower().iter().zip(addr.upper()) {
            diag[l] += 0.1;
            diag[u] += 0.1;
        }
        m.diag_mut().copy_from_slice(&diag);
        let x_exact = vec![0.7; mesh.n_cells()];
        m.source_mut().fill(0.7);
        let controls = SolverControls {
            tolerance: 1e-12,
            rel_tol: 0.0,
            max_iter: 50,
        };

        for solver in [&Pcg as &dyn LinearSolver, &GaussSeidel::default()] {
            let mut x = x_exact.clone();
            let perf = solver.solve("x", &m, &mut x, &controls).unwrap();
            assert_eq!(perf.iterations, 0, "{}", solver.name());
            assert_eq!(x, x_exact);
        }
    }

    #[test]
    fn exhausted_budget_reports_not_converged() {
        let mesh = mesh();
        let mut m = spd(&mesh);
        m.source_mut().iter_mut().for_each(|b| *b = 1.0);
        let controls = SolverControls {
            tolerance: 1e-14,
            rel_tol: 0.0,
            max_iter: 1,
        };
        let mut x = vec![0.0; mesh.n_cells()];
        match GaussSeidel::default().solve("x", &m, &mut x, &controls) {
            Err(SolveError::NotConverged { performance }) => {
                assert_eq!(performance.iterations, 1);
                assert!(performance.final_residual < performance.initial_residual);
            }
            other => panic!("expected NotConverged, got {other:?}"),
        }
        // Best iterate is kept.
        assert!(x.iter().any(|v| *v != 0.0));
    }

    #[test]
    fn singular_vector_solve_leaves_unknown_untouched() {
        let mesh = mesh();
        let m: FvMatrix<Vector> = FvMatrix::new(&mesh);
        let mut x = vec![Vector::ONE; mesh.n_cells()];
        match solve_vector(&Pcg, "U", &m, &mut x, &SolverControls::default()) {
            Err(SolveError::Singular { row: 0, .. }) => {}
            other => panic!("expected Singular, got {other:?}"),
        }
        assert!(x.iter().all(|v| *v == Vector::ONE));
    }

    #[test]
    fn vector_solve_handles_each_component() {
        let mesh = mesh();
        let s = spd(&mesh);
        let mut m: FvMatrix<Vector> = FvMatrix::new(&mesh);
        m.diag_mut().copy_from_slice(s.diag());
        m.upper_mut().copy_from_slice(s.upper());
        m.lower_mut().copy_from_slice(s.lower());
        let exact: Vec<Vector> = (0..mesh.n_cells())
            .map(|i| Vector::new(i as f64, -(i as f64), 0.5))
            .collect();
        let b = m.mul(&exact);
        m.source_mut().copy_from_slice(&b);
        let mut x = vec![Vector::ZERO; mesh.n_cells()];
        let perfs = solve_vector(
            &GaussSeidel::default(),
            "U",
            &m,
            &mut x,
            &SolverControls {
                tolerance: 1e-13,
                rel_tol: 0.0,
                max_iter: 1000,
            },
        )
        .unwrap();
        assert_eq!(perfs.len(), 3);
        assert_eq!(perfs[1].field, "U.y");
        for (a, b) in x.iter().zip(&exact) {
            assert!((*a - *b).length() < 1e-8);
        }
    }
}
