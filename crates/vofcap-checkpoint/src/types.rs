//! In-memory checkpoint representation.

use indexmap::IndexMap;
use vofcap_core::TimeState;
use vofcap_fields::{FieldError, FieldKind, FieldRecord, FieldStore};
use vofcap_mesh::PolyMesh;

use crate::error::CheckpointError;

/// Time state and mesh size at the moment of the checkpoint.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CheckpointHeader {
    /// Physical time.
    pub time: f64,
    /// Time step index.
    pub time_index: u64,
    /// Step used to reach `time`.
    pub delta_t: f64,
    /// Step before that.
    pub delta_t0: f64,
    /// Cells in the mesh.
    pub n_cells: u64,
    /// Faces in the mesh.
    pub n_faces: u64,
}

/// A complete checkpoint: header plus named field records.
#[derive(Clone, Debug, PartialEq)]
pub struct Checkpoint {
    /// Time and shape.
    pub header: CheckpointHeader,
    /// Persisted fields in store order.
    pub fields: IndexMap<String, FieldRecord>,
}

impl Checkpoint {
    /// Capture the current state.
    pub fn capture(time: &TimeState, mesh: &PolyMesh, fields: &FieldStore) -> Self {
        Self {
            header: CheckpointHeader {
                time: time.value,
                time_index: time.index,
                delta_t: time.delta_t,
                delta_t0: time.delta_t0,
                n_cells: mesh.n_cells() as u64,
                n_faces: mesh.n_faces() as u64,
            },
            fields: fields.to_records(),
        }
    }

    /// Overwrite `time` and `fields` from this checkpoint.
    ///
    /// The mesh size is checked first and every record is validated before
    /// anything is written, so on error neither argument has changed.
    /// The end time of `time` is kept.
    pub fn restore(
        &self,
        mesh: &PolyMesh,
        time: &mut TimeState,
        fields: &mut FieldStore,
    ) -> Result<(), CheckpointError> {
        let h = &self.header;
        if h.n_cells != mesh.n_cells() as u64 || h.n_faces != mesh.n_faces() as u64 {
            return Err(CheckpointError::ShapeMismatch {
                expected_cells: mesh.n_cells() as u64,
                expected_faces: mesh.n_faces() as u64,
                found_cells: h.n_cells,
                found_faces: h.n_faces,
            });
        }
        fields.restore_records(&self.fields)?;
        time.value = h.time;
        time.index = h.time_index;
        time.delta_t = h.delta_t;
        time.delta_t0 = h.delta_t0;
        Ok(())
    }

    // ── Solver-state records ────────────────────────────────────

    /// Store per-cell solver state under `name`.
    ///
    /// Saved as a cell scalar whose boundary values copy the owner cell.
    pub fn insert_cell_scalars(&mut self, mesh: &PolyMesh, name: &str, values: &[f64]) {
        let owner = mesh.owner();
        let mut data = values.to_vec();
        let boundary = mesh.n_internal_faces()..mesh.n_faces();
        data.extend(boundary.map(|f| values[owner[f]]));
        self.fields.insert(
            name.to_string(),
            FieldRecord {
                kind: FieldKind::VolScalar,
                data,
            },
        );
    }

    /// Store per-face solver state under `name`.
    pub fn insert_face_scalars(&mut self, name: &str, values: &[f64]) {
        self.fields.insert(
            name.to_string(),
            FieldRecord {
                kind: FieldKind::SurfaceScalar,
                data: values.to_vec(),
            },
        );
    }

    /// Cell values stored under `name`, if present.
    pub fn cell_scalars(
        &self,
        mesh: &PolyMesh,
        name: &str,
    ) -> Result<Option<&[f64]>, CheckpointError> {
        let expected = mesh.n_cells() + mesh.n_boundary_faces();
        Ok(self
            .record(name, FieldKind::VolScalar, expected)?
            .map(|data| &data[..mesh.n_cells()]))
    }

    /// Face values stored under `name`, if present.
    pub fn face_scalars(
        &self,
        mesh: &PolyMesh,
        name: &str,
    ) -> Result<Option<&[f64]>, CheckpointError> {
        self.record(name, FieldKind::SurfaceScalar, mesh.n_faces())
    }

    fn record(
        &self,
        name: &str,
        kind: FieldKind,
        len: usize,
    ) -> Result<Option<&[f64]>, CheckpointError> {
        let Some(record) = self.fields.get(name) else {
            return Ok(None);
        };
        if record.kind != kind {
            return Err(FieldError::KindMismatch {
                field: name.to_string(),
                expected: kind,
                found: record.kind,
            }
            .into());
        }
        if record.data.len() != len {
            return Err(FieldError::LengthMismatch {
                field: name.to_string(),
                expected: len,
                found: record.data.len(),
            }
            .into());
        }
        Ok(Some(&record.data))
    }
}
