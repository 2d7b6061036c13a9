//! LDU finite-volume matrices.

use std::ops::{AddAssign, Neg, SubAssign};
use std::sync::Arc;

use vofcap_core::{FieldValue, Vector};
use vofcap_mesh::{LduAddressing, PolyMesh};

use crate::error::SolveError;

/// An assembled finite-volume equation `A x = b`.
///
/// Row `i` reads
/// `diag[i] x[i] + Σ upper[f] x[upper_addr[f]] + Σ lower[f] x[lower_addr[f]] = source[i]`,
/// where `upper[f]` sits in the owner row of internal face `f` and
/// `lower[f]` in the neighbour row. All terms are volume-integrated.
/// Boundary contributions are folded into `diag` and `source` during
/// assembly.
#[derive(Clone, Debug)]
pub struct FvMatrix<T: FieldValue> {
    addr: Arc<LduAddressing>,
    diag: Vec<f64>,
    upper: Vec<f64>,
    lower: Vec<f64>,
    source: Vec<T>,
}

impl<T: FieldValue> FvMatrix<T> {
    /// Empty equation on `mesh`.
    pub fn new(mesh: &PolyMesh) -> Self {
        Self::with_addressing(mesh.ldu().clone())
    }

    /// Empty equation on shared addressing.
    pub fn with_addressing(addr: Arc<LduAddressing>) -> Self {
        let n = addr.size();
        let nf = addr.lower().len();
        Self {
            addr,
            diag: vec![0.0; n],
            upper: vec![0.0; nf],
            lower: vec![0.0; nf],
            source: vec![T::zero(); n],
        }
    }

    /// Matrix addressing.
    pub fn addressing(&self) -> &Arc<LduAddressing> {
        &self.addr
    }

    /// Diagonal coefficients.
    pub fn diag(&self) -> &[f64] {
        &self.diag
    }

    /// Mutable diagonal coefficients.
    pub fn diag_mut(&mut self) -> &mut [f64] {
        &mut self.diag
    }

    /// Owner-row coefficients of internal faces.
    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    /// Mutable owner-row coefficients.
    pub fn upper_mut(&mut self) -> &mut [f64] {
        &mut self.upper
    }

    /// Neighbour-row coefficients of internal faces.
    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    /// Mutable neighbour-row coefficients.
    pub fn lower_mut(&mut self) -> &mut [f64] {
        &mut self.lower
    }

    /// Right-hand side.
    pub fn source(&self) -> &[T] {
        &self.source
    }

    /// Mutable right-hand side.
    pub fn source_mut(&mut self) -> &mut [T] {
        &mut self.source
    }

    /// True when `upper == lower`.
    pub fn is_symmetric(&self) -> bool {
        self.upper == self.lower
    }

    // ── Explicit and implicit source terms ──────────────────────

    /// Move an explicit per-volume term to the right-hand side:
    /// `A x = b + s V`.
    pub fn add_source(&mut self, mesh: &PolyMesh, s: &[T]) {
        for ((b, s), v) in self.source.iter_mut().zip(s).zip(mesh.cell_volumes()) {
            *b += *s * *v;
        }
    }

    /// Add an implicit per-volume term `c x` to the left-hand side.
    pub fn add_sp(&mut self, mesh: &PolyMesh, c: &[f64]) {
        for ((d, c), v) in self.diag.iter_mut().zip(c).zip(mesh.cell_volumes()) {
            *d += c * v;
        }
    }

    // ── Manipulation ────────────────────────────────────────────

    /// Under-relax the equation towards `x_prev`.
    ///
    /// The diagonal is first raised to the sum of off-diagonal magnitudes
    /// where it falls short, then divided by `factor`; the difference is
    /// balanced on the right-hand side so the converged solution is
    /// unchanged.
    pub fn relax(&mut self, factor: f64, x_prev: &[T]) {
        if factor >= 1.0 || factor <= 0.0 {
            return;
        }
        let mut sum_off = vec![0.0; self.diag.len()];
        for (f, (&l, &u)) in self.addr.lower().iter().zip(self.addr.upper()).enumerate() {
            sum_off[l] += self.upper[f].abs();
            sum_off[u] += self.lower[f].abs();
        }
        for i in 0..self.diag.len() {
            let d0 = self.diag[i];
            let d = d0.abs().max(sum_off[i]).copysign(d0) / factor;
            self.source[i] += x_prev[i] * (d - d0);
            self.diag[i] = d;
        }
    }

    /// Pin `cell` to `value`.
    ///
    /// The row becomes `d x = d value` and the column coupling of every
    /// neighbour is moved to its right-hand side, so the constraint holds
    /// exactly whatever the solver.
    pub fn set_value(&mut self, cell: usize, value: T) {
        let lower_addr = self.addr.lower();
        let upper_addr = self.addr.upper();
        for &f in self.addr.row_faces(cell) {
            if lower_addr[f] == cell {
                let nb = upper_addr[f];
                self.source[nb] -= value * self.lower[f];
            } else {
                let nb = lower_addr[f];
                self.source[nb] -= value * self.upper[f];
            }
            self.upper[f] = 0.0;
            self.lower[f] = 0.0;
        }
        if self.diag[cell] == 0.0 {
            self.diag[cell] = 1.0;
        }
        self.source[cell] = value * self.diag[cell];
    }

    /// Fix the level of a pure-Neumann problem by doubling one diagonal.
    pub fn set_reference(&mut self, cell: usize, value: T) {
        self.source[cell] += value * self.diag[cell];
        self.diag[cell] += self.diag[cell];
    }

    // ── Derived quantities ──────────────────────────────────────

    /// Diagonal per unit volume.
    pub fn a(&self, mesh: &PolyMesh) -> Vec<f64> {
        self.diag
            .iter()
            .zip(mesh.cell_volumes())
            .map(|(d, v)| d / v)
            .collect()
    }

    /// Off-diagonal and source part evaluated at `x`, per unit volume:
    /// `(b - Σ a_nb x_nb) / V`.
    pub fn h(&self, mesh: &PolyMesh, x: &[T]) -> Vec<T> {
        let mut h = self.source.clone();
        for (f, (&l, &u)) in self.addr.lower().iter().zip(self.addr.upper()).enumerate() {
            h[l] -= x[u] * self.upper[f];
            h[u] -= x[l] * self.lower[f];
        }
        for (h, v) in h.iter_mut().zip(mesh.cell_volumes()) {
            *h = *h * (1.0 / v);
        }
        h
    }

    /// `A x`.
    pub fn mul(&self, x: &[T]) -> Vec<T> {
        let mut y: Vec<T> = self.diag.iter().zip(x).map(|(d, x)| *x * *d).collect();
        for (f, (&l, &u)) in self.addr.lower().iter().zip(self.addr.upper()).enumerate() {
            y[l] += x[u] * self.upper[f];
            y[u] += x[l] * self.lower[f];
        }
        y
    }

    /// First row with a zero diagonal.
    pub fn check_diagonal(&self, field: &str) -> Result<(), SolveError> {
        match self.diag.iter().position(|d| *d == 0.0) {
            Some(row) => Err(SolveError::Singular {
                field: field.to_string(),
                row,
            }),
            None => Ok(()),
        }
    }

    /// Scalar equation for component `i` of the unknown.
    pub fn component(&self, i: usize) -> FvMatrix<f64> {
        FvMatrix {
            addr: self.addr.clone(),
            diag: self.diag.clone(),
            upper: self.upper.clone(),
            lower: self.lower.clone(),
            source: self.source.iter().map(|s| s.component(i)).collect(),
        }
    }
}

impl FvMatrix<f64> {
    /// Normalised residual `Σ|b - A x| / norm`.
    ///
    /// The normalisation compares `A x` and `b` against `A` applied to the
    /// mean of `x`, so a uniform offset in `x` does not change the result.
    pub fn normalised_residual(&self, x: &[f64]) -> f64 {
        let ax = self.mul(x);
        let n = x.len().max(1) as f64;
        let x_ref = x.iter().sum::<f64>() / n;
        let mut row_sum = self.diag.clone();
        for (f, (&l, &u)) in self.addr.lower().iter().zip(self.addr.upper()).enumerate() {
            row_sum[l] += self.upper[f];
            row_sum[u] += self.lower[f];
        }
        let mut norm = 0.0;
        let mut res = 0.0;
        for i in 0..x.len() {
            let a_ref = row_sum[i] * x_ref;
            norm += (ax[i] - a_ref).abs() + (self.source[i] - a_ref).abs();
            res += (self.source[i] - ax[i]).abs();
        }
        res / (norm + vofcap_core::SMALL)
    }

    /// Residual relative to the source, `sum |b - A x| / sum |b|`.
    ///
    /// Stays meaningful when the solution is uniform and the normalised
    /// residual divides rounding noise by a vanishing factor.
    pub fn relative_residual(&self, x: &[f64]) -> f64 {
        let ax = self.mul(x);
        let res: f64 = self.source.iter().zip(&ax).map(|(b, a)| (b - a).abs()).sum();
        let scale: f64 = self.source.iter().map(|b| b.abs()).sum();
        res / (scale + vofcap_core::SMALL)
    }
}

impl FvMatrix<Vector> {
    /// Pin `cell` to zero in every component.
    pub fn set_zero(&mut self, cell: usize) {
        self.set_value(cell, Vector::ZERO);
    }
}

impl<T: FieldValue> AddAssign<&FvMatrix<T>> for FvMatrix<T> {
    fn add_assign(&mut self, rhs: &FvMatrix<T>) {
        for (a, b) in self.diag.iter_mut().zip(&rhs.diag) {
            *a += b;
        }
        for (a, b) in self.upper.iter_mut().zip(&rhs.upper) {
            *a += b;
        }
        for (a, b) in self.lower.iter_mut().zip(&rhs.lower) {
            *a += b;
        }
        for (a, b) in self.source.iter_mut().zip(&rhs.source) {
            *a += *b;
        }
    }
}

impl<T: FieldValue> SubAssign<&FvMatrix<T>> for FvMatrix<T> {
    fn sub_assign(&mut self, rhs: &FvMatrix<T>) {
        for (a, b) in self.diag.iter_mut().zip(&rhs.diag) {
            *a -= b;
        }
        for (a, b) in self.upper.iter_mut().zip(&rhs.upper) {
            *a -= b;
        }
        for (a, b) in self.lower.iter_mut().zip(&rhs.lower) {
            *a -= b;
        }
        for (a, b) in self.source.iter_mut().zip(&rhs.source) {
            *a -= *b;
        }
    }
}

impl<T: FieldValue> Neg for FvMatrix<T> {
    type Output = FvMatrix<T>;

    fn neg(mut self) -> FvMatrix<T> {
        self.diag.iter_mut().for_each(|d| *d = -*d);
        self.upper.iter_mut().for_each(|d| *d = -*d);
        self.lower.iter_mut().for_each(|d| *d = -*d);
        self.source.iter_mut().for_each(|s| *s = -*s);
        self
    }
}
