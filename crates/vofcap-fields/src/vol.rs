//! Cell-centred fields.

use std::ops::{Index, IndexMut};

use vofcap_core::FieldValue;
use vofcap_mesh::{PatchKind, PolyMesh};

use crate::bc::Bc;
use crate::error::FieldError;

/// A cell-centred field with boundary values and an optional old-time copy.
///
/// `values()` are the cell values. `boundary_values()` hold one value per
/// boundary face, indexed by `face - mesh.n_internal_faces()`, and are
/// refreshed from the cell values by
/// [`correct_boundary_conditions`](VolField::correct_boundary_conditions).
#[derive(Clone, Debug, PartialEq)]
pub struct VolField<T: FieldValue> {
    name: String,
    internal: Vec<T>,
    boundary: Vec<T>,
    bcs: Vec<Bc<T>>,
    old: Option<Vec<T>>,
}

impl<T: FieldValue> VolField<T> {
    /// Build a field from explicit cell values and one condition per patch.
    pub fn new(
        name: impl Into<String>,
        mesh: &PolyMesh,
        internal: Vec<T>,
        bcs: Vec<Bc<T>>,
    ) -> Result<Self, FieldError> {
        let name = name.into();
        if internal.len() != mesh.n_cells() {
            return Err(FieldError::LengthMismatch {
                field: name,
                expected: mesh.n_cells(),
                found: internal.len(),
            });
        }
        if bcs.len() != mesh.patches().len() {
            return Err(FieldError::LengthMismatch {
                field: format!("{name} (patch conditions)"),
                expected: mesh.patches().len(),
                found: bcs.len(),
            });
        }
        let mut field = Self {
            name,
            internal,
            boundary: vec![T::zero(); mesh.n_boundary_faces()],
            bcs,
            old: None,
        };
        field.correct_boundary_conditions(mesh);
        Ok(field)
    }

    /// Uniform field whose patch conditions are chosen from the patch kind.
    pub fn uniform(
        name: impl Into<String>,
        mesh: &PolyMesh,
        value: T,
        bc_for: impl Fn(PatchKind) -> Bc<T>,
    ) -> Self {
        let bcs = mesh.patches().iter().map(|p| bc_for(p.kind)).collect();
        let mut field = Self {
            name: name.into(),
            internal: vec![value; mesh.n_cells()],
            boundary: vec![value; mesh.n_boundary_faces()],
            bcs,
            old: None,
        };
        field.correct_boundary_conditions(mesh);
        field
    }

    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cell values.
    pub fn values(&self) -> &[T] {
        &self.internal
    }

    /// Mutable cell values. Boundary values are stale until the next
    /// [`correct_boundary_conditions`](VolField::correct_boundary_conditions).
    pub fn values_mut(&mut self) -> &mut [T] {
        &mut self.internal
    }

    /// Boundary face values.
    pub fn boundary_values(&self) -> &[T] {
        &self.boundary
    }

    /// Mutable boundary face values, for [`Bc::Calculated`] patches.
    pub fn boundary_values_mut(&mut self) -> &mut [T] {
        &mut self.boundary
    }

    /// Value on boundary face `face` (a global face index).
    pub fn boundary_value(&self, mesh: &PolyMesh, face: usize) -> T {
        self.boundary[face - mesh.n_internal_faces()]
    }

    /// Condition on patch `patch`.
    pub fn bc(&self, patch: usize) -> &Bc<T> {
        &self.bcs[patch]
    }

    /// Condition on the patch owning boundary face `face`.
    pub fn face_bc(&self, mesh: &PolyMesh, face: usize) -> &Bc<T> {
        &self.bcs[mesh.face_patch(face)]
    }

    /// Replace the condition on patch `patch`.
    pub fn set_bc(&mut self, patch: usize, bc: Bc<T>) {
        self.bcs[patch] = bc;
    }

    /// Overwrite the cell values and refresh the boundary.
    pub fn assign(&mut self, mesh: &PolyMesh, values: &[T]) -> Result<(), FieldError> {
        if values.len() != self.internal.len() {
            return Err(FieldError::LengthMismatch {
                field: self.name.clone(),
                expected: self.internal.len(),
                found: values.len(),
            });
        }
        self.internal.copy_from_slice(values);
        self.correct_boundary_conditions(mesh);
        Ok(())
    }

    /// Re-evaluate boundary values from the cell values.
    pub fn correct_boundary_conditions(&mut self, mesh: &PolyMesh) {
        let n_internal = mesh.n_internal_faces();
        let owner = mesh.owner();
        for (patch, bc) in mesh.patches().iter().zip(&self.bcs) {
            for face in patch.faces() {
                let b = face - n_internal;
                let cell = self.internal[owner[face]];
                match bc {
                    Bc::FixedValue(v) => self.boundary[b] = *v,
                    Bc::ZeroGradient => self.boundary[b] = cell,
                    Bc::Slip => self.boundary[b] = cell.remove_normal(mesh.unit_normal(face)),
                    Bc::Calculated => {}
                }
            }
        }
    }

    // ── Time history ────────────────────────────────────────────

    /// Copy the current cell values to the old-time level.
    pub fn store_old_time(&mut self) {
        match &mut self.old {
            Some(old) => old.copy_from_slice(&self.internal),
            None => self.old = Some(self.internal.clone()),
        }
    }

    /// Old-time cell values; the current values if none were stored.
    pub fn old_time(&self) -> &[T] {
        self.old.as_deref().unwrap_or(&self.internal)
    }

    /// True once [`store_old_time`](VolField::store_old_time) has run.
    pub fn has_old_time(&self) -> bool {
        self.old.is_some()
    }

    // ── Bulk operations ─────────────────────────────────────────

    /// Multiply every cell value by the matching scalar.
    pub fn scale_by(&mut self, factors: &[f64]) {
        for (v, s) in self.internal.iter_mut().zip(factors) {
            *v = *v * *s;
        }
    }

    /// Smallest and largest cell value of the first component.
    pub fn min_max(&self) -> (f64, f64) {
        self.internal.iter().fold((f64::MAX, f64::MIN), |(lo, hi), v| {
            let c = v.component(0);
            (lo.min(c), hi.max(c))
        })
    }
}

impl<T: FieldValue> Index<usize> for VolField<T> {
    type Output = T;

    fn index(&self, cell: usize) -> &T {
        &self.internal[cell]
    }
}

impl<T: FieldValue> IndexMut<usize> for VolField<T> {
    fn index_mut(&mut self, cell: usize) -> &mut T {
        &mut self.internal[cell]
    }
}
