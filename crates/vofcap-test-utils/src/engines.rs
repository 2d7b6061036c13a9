//! Mesh engines driven by a script instead of a motion solver.

use std::collections::BTreeMap;

use vofcap_core::{TimeState, Vector};
use vofcap_mesh::{CellClass, MeshChange, MeshEngine, MeshError, PolyMesh};

/// What a [`ScriptedMeshEngine`] does at one time index.
#[derive(Clone, Debug, PartialEq)]
pub enum ScriptedStep {
    /// Report `change`, switching to `classes` when given.
    Change {
        change: MeshChange,
        classes: Option<Vec<CellClass>>,
    },
    /// Fail the update.
    Fail(MeshError),
}

/// A static mesh whose updates follow a per-step script.
///
/// Steps without an entry report [`MeshChange::NONE`]. Every call to
/// `update` is recorded so tests can assert how often the orchestrator
/// moved the mesh.
#[derive(Clone, Debug)]
pub struct ScriptedMeshEngine {
    mesh: PolyMesh,
    classes: Vec<CellClass>,
    script: BTreeMap<u64, ScriptedStep>,
    donor: Vector,
    calls: Vec<u64>,
}

impl ScriptedMeshEngine {
    /// Engine over `mesh` with every cell active and no scripted steps.
    pub fn new(mesh: PolyMesh) -> Self {
        let classes = vec![CellClass::Active; mesh.n_cells()];
        Self {
            mesh,
            classes,
            script: BTreeMap::new(),
            donor: Vector::ZERO,
            calls: Vec::new(),
        }
    }

    /// Start from `classes` instead of all-active.
    pub fn with_classes(mut self, classes: Vec<CellClass>) -> Self {
        assert_eq!(classes.len(), self.mesh.n_cells());
        self.classes = classes;
        self
    }

    /// Report `change` at `index`, optionally reclassifying cells.
    pub fn change_at(
        mut self,
        index: u64,
        change: MeshChange,
        classes: Option<Vec<CellClass>>,
    ) -> Self {
        self.script.insert(index, ScriptedStep::Change { change, classes });
        self
    }

    /// Fail the update at `index`.
    pub fn fail_at(mut self, index: u64) -> Self {
        let err = MeshError::MotionFailed {
            time_index: index,
            reason: "scripted failure".to_string(),
        };
        self.script.insert(index, ScriptedStep::Fail(err));
        self
    }

    /// Velocity handed to interpolated cells.
    pub fn with_donor_velocity(mut self, donor: Vector) -> Self {
        self.donor = donor;
        self
    }

    /// Time indices at which `update` was called, in call order.
    pub fn calls(&self) -> &[u64] {
        &self.calls
    }
}

impl MeshEngine for ScriptedMeshEngine {
    fn mesh(&self) -> &PolyMesh {
        &self.mesh
    }

    fn cell_classes(&self) -> &[CellClass] {
        &self.classes
    }

    fn update(&mut self, time: &TimeState) -> Result<MeshChange, MeshError> {
        self.calls.push(time.index);
        match self.script.get(&time.index) {
            None => Ok(MeshChange::NONE),
            Some(ScriptedStep::Fail(e)) => Err(e.clone()),
            Some(ScriptedStep::Change { change, classes }) => {
                if let Some(c) = classes {
                    self.classes.clone_from(c);
                }
                Ok(*change)
            }
        }
    }

    fn donor_velocity(&self, cell: usize) -> Option<Vector> {
        (self.classes.get(cell) == Some(&CellClass::Interpolated)).then_some(self.donor)
    }
}

/// Hole cells for every cell index in `holes`, active elsewhere.
pub fn classes_with_holes(n_cells: usize, holes: &[usize]) -> Vec<CellClass> {
    let mut classes = vec![CellClass::Active; n_cells];
    for &h in holes {
        classes[h] = CellClass::Hole;
    }
    classes
}
