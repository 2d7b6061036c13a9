//! Flat, named field records used for checkpointing.

use vofcap_core::FieldValue;

use crate::error::FieldError;
use crate::surface::SurfaceField;
use crate::vol::VolField;

/// Storage shape of a field record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Cell scalar with boundary values.
    VolScalar,
    /// Cell vector with boundary values.
    VolVector,
    /// Face scalar.
    SurfaceScalar,
    /// Face vector.
    SurfaceVector,
}

impl FieldKind {
    /// Wire tag.
    pub fn tag(self) -> u8 {
        match self {
            FieldKind::VolScalar => 0,
            FieldKind::VolVector => 1,
            FieldKind::SurfaceScalar => 2,
            FieldKind::SurfaceVector => 3,
        }
    }

    /// Kind for a wire tag.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(FieldKind::VolScalar),
            1 => Some(FieldKind::VolVector),
            2 => Some(FieldKind::SurfaceScalar),
            3 => Some(FieldKind::SurfaceVector),
            _ => None,
        }
    }

    /// Scalar components per stored value.
    pub fn components(self) -> usize {
        match self {
            FieldKind::VolScalar | FieldKind::SurfaceScalar => 1,
            FieldKind::VolVector | FieldKind::SurfaceVector => 3,
        }
    }
}

/// Field values flattened to `f64` components.
///
/// Cell fields store their cell values followed by their boundary values.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldRecord {
    /// Storage shape.
    pub kind: FieldKind,
    /// Flattened components.
    pub data: Vec<f64>,
}

fn kind_of<T: FieldValue>(vol: bool) -> FieldKind {
    match (vol, T::COMPONENTS) {
        (true, 1) => FieldKind::VolScalar,
        (true, _) => FieldKind::VolVector,
        (false, 1) => FieldKind::SurfaceScalar,
        (false, _) => FieldKind::SurfaceVector,
    }
}

fn flatten<T: FieldValue>(out: &mut Vec<f64>, values: &[T]) {
    for v in values {
        for i in 0..T::COMPONENTS {
            out.push(v.component(i));
        }
    }
}

fn unflatten<T: FieldValue>(target: &mut [T], data: &[f64]) {
    for (v, chunk) in target.iter_mut().zip(data.chunks_exact(T::COMPONENTS)) {
        for (i, c) in chunk.iter().enumerate() {
            v.set_component(i, *c);
        }
    }
}

impl FieldRecord {
    /// Record of a cell field.
    pub fn from_vol<T: FieldValue>(field: &VolField<T>) -> Self {
        let n = field.values().len() + field.boundary_values().len();
        let mut data = Vec::with_capacity(n * T::COMPONENTS);
        flatten(&mut data, field.values());
        flatten(&mut data, field.boundary_values());
        Self {
            kind: kind_of::<T>(true),
            data,
        }
    }

    /// Record of a face field.
    pub fn from_surface<T: FieldValue>(field: &SurfaceField<T>) -> Self {
        let mut data = Vec::with_capacity(field.len() * T::COMPONENTS);
        flatten(&mut data, field.values());
        Self {
            kind: kind_of::<T>(false),
            data,
        }
    }

    fn check<T: FieldValue>(&self, name: &str, vol: bool, values: usize) -> Result<(), FieldError> {
        let expected = kind_of::<T>(vol);
        if self.kind != expected {
            return Err(FieldError::KindMismatch {
                field: name.to_string(),
                expected,
                found: self.kind,
            });
        }
        if self.data.len() != values * T::COMPONENTS {
            return Err(FieldError::LengthMismatch {
                field: name.to_string(),
                expected: values * T::COMPONENTS,
                found: self.data.len(),
            });
        }
        Ok(())
    }

    /// Overwrite a cell field, cell and boundary values both.
    pub fn restore_vol<T: FieldValue>(&self, field: &mut VolField<T>) -> Result<(), FieldError> {
        let n_cells = field.values().len();
        let n_boundary = field.boundary_values().len();
        self.check::<T>(field.name(), true, n_cells + n_boundary)?;
        let split = n_cells * T::COMPONENTS;
        unflatten(field.values_mut(), &self.data[..split]);
        unflatten(field.boundary_values_mut(), &self.data[split..]);
        Ok(())
    }

    /// Overwrite a face field.
    pub fn restore_surface<T: FieldValue>(
        &self,
        field: &mut SurfaceField<T>,
    ) -> Result<(), FieldError> {
        self.check::<T>(field.name(), false, field.len())?;
        unflatten(field.values_mut(), &self.data);
        Ok(())
    }
}
