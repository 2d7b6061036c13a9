//! Scalar and vector field values.

use std::fmt::Debug;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// Three-component double precision vector used for velocities and geometry.
pub type Vector = glam::DVec3;

/// A value that can be stored per cell or per face.
///
/// Implemented for `f64` (pressure, phase fraction, fluxes) and
/// [`Vector`] (velocity). Discretisation operators are written once
/// against this trait and solve vector equations component by component.
pub trait FieldValue:
    Copy
    + Debug
    + Default
    + PartialEq
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Neg<Output = Self>
    + Mul<f64, Output = Self>
    + AddAssign
    + SubAssign
{
    /// Number of scalar components.
    const COMPONENTS: usize;

    /// Additive identity.
    fn zero() -> Self {
        Self::default()
    }

    /// Euclidean magnitude.
    fn mag(self) -> f64;

    /// Component `i`, `i < COMPONENTS`.
    fn component(self, i: usize) -> f64;

    /// Overwrite component `i`.
    fn set_component(&mut self, i: usize, v: f64);

    /// Remove the component along the unit normal `n`.
    ///
    /// Scalars have no direction and are returned unchanged.
    fn remove_normal(self, n: Vector) -> Self;

    /// True when every component is finite.
    fn is_finite(self) -> bool;
}

impl FieldValue for f64 {
    const COMPONENTS: usize = 1;

    fn mag(self) -> f64 {
        self.abs()
    }

    fn component(self, _i: usize) -> f64 {
        self
    }

    fn set_component(&mut self, _i: usize, v: f64) {
        *self = v;
    }

    fn remove_normal(self, _n: Vector) -> Self {
        self
    }

    fn is_finite(self) -> bool {
        f64::is_finite(self)
    }
}

impl FieldValue for Vector {
    const COMPONENTS: usize = 3;

    fn mag(self) -> f64 {
        self.length()
    }

    fn component(self, i: usize) -> f64 {
        self[i]
    }

    fn set_component(&mut self, i: usize, v: f64) {
        self[i] = v;
    }

    fn remove_normal(self, n: Vector) -> Self {
        self - n * n.dot(self)
    }

    fn is_finite(self) -> bool {
        Vector::is_finite(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_components_round_trip() {
        let mut v = Vector::new(1.0, 2.0, 3.0);
        assert_eq!(<Vector as FieldValue>::COMPONENTS, 3);
        assert_eq!(v.component(1), 2.0);
        v.set_component(2, -4.0);
        assert_eq!(v, Vector::new(1.0, 2.0, -4.0));
    }

    #[test]
    fn remove_normal_leaves_tangential_part() {
        let v = Vector::new(3.0, 4.0, 0.0);
        let t = v.remove_normal(Vector::X);
        assert_eq!(t, Vector::new(0.0, 4.0, 0.0));
        assert_eq!(2.5_f64.remove_normal(Vector::X), 2.5);
    }

    #[test]
    fn scalar_magnitude_is_absolute_value() {
        assert_eq!(FieldValue::mag(-3.0_f64), 3.0);
        assert!(!FieldValue::is_finite(f64::NAN));
    }
}
