//! Rigidly translating mesh.

use vofcap_core::{TimeState, Vector};

use crate::engine::{CellClass, MeshChange, MeshEngine};
use crate::error::MeshError;
use crate::poly::PolyMesh;

/// A mesh translating at constant velocity.
///
/// Cell volumes are unchanged, so the swept face flux `Sf · v` sums to
/// zero around every cell and the geometric conservation law holds
/// exactly.
#[derive(Clone, Debug)]
pub struct TranslatingMesh {
    mesh: PolyMesh,
    classes: Vec<CellClass>,
    velocity: Vector,
    mesh_phi: Vec<f64>,
    last_time: f64,
}

impl TranslatingMesh {
    /// Move `mesh` at `velocity`, starting at `start_time`.
    pub fn new(mesh: PolyMesh, velocity: Vector, start_time: f64) -> Self {
        let mesh_phi = mesh.face_areas().iter().map(|sf| sf.dot(velocity)).collect();
        let classes = vec![CellClass::Active; mesh.n_cells()];
        Self {
            mesh,
            classes,
            velocity,
            mesh_phi,
            last_time: start_time,
        }
    }
}

impl MeshEngine for TranslatingMesh {
    fn mesh(&self) -> &PolyMesh {
        &self.mesh
    }

    fn cell_classes(&self) -> &[CellClass] {
        &self.classes
    }

    fn update(&mut self, time: &TimeState) -> Result<MeshChange, MeshError> {
        let dt = time.value - self.last_time;
        if !dt.is_finite() || dt < 0.0 {
            return Err(MeshError::MotionFailed {
                time_index: time.index,
                reason: format!("cannot move mesh by a time interval of {dt}"),
            });
        }
        if dt == 0.0 {
            return Ok(MeshChange::NONE);
        }
        self.mesh.translate(self.velocity * dt);
        self.last_time = time.value;
        Ok(MeshChange::MOVED)
    }

    fn is_moving(&self) -> bool {
        true
    }

    fn mesh_phi(&self) -> Option<&[f64]> {
        Some(&self.mesh_phi)
    }
}
