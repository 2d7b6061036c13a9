//! The mesh-engine interface consumed by the solver.

use vofcap_core::{TimeState, Vector};

use crate::error::MeshError;
use crate::poly::PolyMesh;

/// Overset classification of a cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CellClass {
    /// Solved normally.
    #[default]
    Active,
    /// Covered by another body; excluded from every equation.
    Hole,
    /// Fringe cell whose values are supplied by a donor.
    Interpolated,
}

/// What a mesh update changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MeshChange {
    /// Geometry or classification changed; masks and fluxes need repair.
    pub changed: bool,
    /// Connectivity changed; cached face-based data is invalid.
    pub topology_changed: bool,
}

impl MeshChange {
    /// Nothing changed.
    pub const NONE: MeshChange = MeshChange {
        changed: false,
        topology_changed: false,
    };

    /// Geometry moved, connectivity kept.
    pub const MOVED: MeshChange = MeshChange {
        changed: true,
        topology_changed: false,
    };

    /// Connectivity changed.
    pub const TOPOLOGY: MeshChange = MeshChange {
        changed: true,
        topology_changed: true,
    };
}

/// External mesh motion and topology engine.
///
/// The solver owns one engine for the duration of a run. Each outer
/// iteration that is allowed to move the mesh calls
/// [`update`](MeshEngine::update); the returned [`MeshChange`] decides
/// whether the mask manager must rebuild masks and repair fluxes.
///
/// Any error returned from `update` is fatal for the run.
pub trait MeshEngine: Send {
    /// Current geometry and addressing.
    fn mesh(&self) -> &PolyMesh;

    /// Current classification, one entry per cell.
    fn cell_classes(&self) -> &[CellClass];

    /// Advance the mesh to `time.value`.
    fn update(&mut self, time: &TimeState) -> Result<MeshChange, MeshError>;

    /// True when faces sweep volume, i.e. fluxes must be made relative.
    fn is_moving(&self) -> bool {
        false
    }

    /// Volumetric flux swept by each face during the last update.
    fn mesh_phi(&self) -> Option<&[f64]> {
        None
    }

    /// Velocity imposed on an interpolated cell by its donor.
    fn donor_velocity(&self, _cell: usize) -> Option<Vector> {
        None
    }

    /// Refresh partition-boundary copies of a scalar cell field.
    fn exchange_scalars(&self, _values: &mut [f64]) {}

    /// Refresh partition-boundary copies of a vector cell field.
    fn exchange_vectors(&self, _values: &mut [Vector]) {}
}

// ── StaticMesh ──────────────────────────────────────────────────

/// A mesh that never moves and has no overset regions.
#[derive(Clone, Debug)]
pub struct StaticMesh {
    mesh: PolyMesh,
    classes: Vec<CellClass>,
}

impl StaticMesh {
    /// Wrap a fixed mesh.
    pub fn new(mesh: PolyMesh) -> Self {
        let classes = vec![CellClass::Active; mesh.n_cells()];
        Self { mesh, classes }
    }
}

impl MeshEngine for StaticMesh {
    fn mesh(&self) -> &PolyMesh {
        &self.mesh
    }

    fn cell_classes(&self) -> &[CellClass] {
        &self.classes
    }

    fn update(&mut self, _time: &TimeState) -> Result<MeshChange, MeshError> {
        Ok(MeshChange::NONE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockMesh;

    #[test]
    fn static_mesh_never_changes() {
        let mesh = BlockMesh::new([2, 2, 1], Vector::ONE).build().unwrap();
        let mut engine = StaticMesh::new(mesh);
        let t = TimeState::new(0.0, 1.0, 0.1);
        assert_eq!(engine.update(&t).unwrap(), MeshChange::NONE);
        assert!(engine
            .cell_classes()
            .iter()
            .all(|c| *c == CellClass::Active));
        assert!(engine.mesh_phi().is_none());
    }
}
