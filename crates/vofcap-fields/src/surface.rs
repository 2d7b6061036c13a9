//! Face fields.

use std::ops::{Index, IndexMut};

use vofcap_core::FieldValue;

/// One value per face, internal faces first.
#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceField<T: FieldValue> {
    name: String,
    values: Vec<T>,
}

impl<T: FieldValue> SurfaceField<T> {
    /// Uniform field over `n_faces` faces.
    pub fn uniform(name: impl Into<String>, n_faces: usize, value: T) -> Self {
        Self {
            name: name.into(),
            values: vec![value; n_faces],
        }
    }

    /// Field from existing face values.
    pub fn from_values(name: impl Into<String>, values: Vec<T>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Face values.
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Mutable face values.
    pub fn values_mut(&mut self) -> &mut [T] {
        &mut self.values
    }

    /// Number of faces.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True for a field over zero faces.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Multiply every face value by the matching scalar.
    pub fn scale_by(&mut self, factors: &[f64]) {
        for (v, s) in self.values.iter_mut().zip(factors) {
            *v = *v * *s;
        }
    }

    /// Take over the values of `other`, keeping this field's name.
    pub fn assign(&mut self, other: &SurfaceField<T>) {
        self.values.clone_from(&other.values);
    }

    /// Consume the field, returning its values.
    pub fn into_values(self) -> Vec<T> {
        self.values
    }
}

impl<T: FieldValue> Index<usize> for SurfaceField<T> {
    type Output = T;

    fn index(&self, face: usize) -> &T {
        &self.values[face]
    }
}

impl<T: FieldValue> IndexMut<usize> for SurfaceField<T> {
    fn index_mut(&mut self, face: usize) -> &mut T {
        &mut self.values[face]
    }
}
