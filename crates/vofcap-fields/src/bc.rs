//! Patch boundary conditions.

/// Boundary condition applied on every face of one patch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Bc<T> {
    /// Boundary value is fixed.
    FixedValue(T),
    /// Boundary value equals the adjacent cell value.
    ZeroGradient,
    /// Adjacent cell value with its normal component removed; scalars
    /// behave as [`Bc::ZeroGradient`].
    Slip,
    /// Boundary value is set directly by whoever owns the field.
    Calculated,
}

impl<T> Bc<T> {
    /// True when the boundary value does not depend on the cell value.
    pub fn is_fixed(&self) -> bool {
        matches!(self, Bc::FixedValue(_))
    }
}
