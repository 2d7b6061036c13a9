//! Overset reference engine: a box-shaped body moving through a fixed
//! background mesh.
//!
//! Background cells whose centre lies inside the body are holes. Cells
//! sharing a face with a hole form the interpolation fringe and take the
//! body velocity as their donor value. The background geometry itself
//! never moves, so fluxes need no relative correction; only the
//! classification changes.

use tracing::debug;
use vofcap_core::{TimeState, Vector};

use crate::engine::{CellClass, MeshChange, MeshEngine};
use crate::error::MeshError;
use crate::poly::PolyMesh;

/// Background mesh with a translating box-shaped hole.
#[derive(Clone, Debug)]
pub struct OversetBoxMesh {
    mesh: PolyMesh,
    classes: Vec<CellClass>,
    initial_centre: Vector,
    half_extent: Vector,
    velocity: Vector,
    centre: Vector,
    /// Steps at which the engine reports a connectivity change even when
    /// the hole set is unchanged (e.g. a donor search rebuild).
    topology_events: Vec<u64>,
}

impl OversetBoxMesh {
    /// Place a box of half-size `half_extent` at `centre`, moving at
    /// `velocity`.
    pub fn new(
        mesh: PolyMesh,
        centre: Vector,
        half_extent: Vector,
        velocity: Vector,
    ) -> Result<Self, MeshError> {
        let classes = classify(&mesh, centre, half_extent);
        check_active(&classes, 0)?;
        Ok(Self {
            mesh,
            classes,
            initial_centre: centre,
            half_extent,
            velocity,
            centre,
            topology_events: Vec::new(),
        })
    }

    /// Report a topology change at each of the given time indices.
    pub fn with_topology_events(mut self, events: impl IntoIterator<Item = u64>) -> Self {
        self.topology_events = events.into_iter().collect();
        self
    }

    /// Current body centre.
    pub fn centre(&self) -> Vector {
        self.centre
    }

    /// Body velocity.
    pub fn velocity(&self) -> Vector {
        self.velocity
    }
}

impl MeshEngine for OversetBoxMesh {
    fn mesh(&self) -> &PolyMesh {
        &self.mesh
    }

    fn cell_classes(&self) -> &[CellClass] {
        &self.classes
    }

    fn update(&mut self, time: &TimeState) -> Result<MeshChange, MeshError> {
        let centre = self.initial_centre + self.velocity * time.value;
        if !centre.is_finite() {
            return Err(MeshError::MotionFailed {
                time_index: time.index,
                reason: format!("body centre became {centre}"),
            });
        }
        let classes = classify(&self.mesh, centre, self.half_extent);
        check_active(&classes, time.index)?;

        let holes_changed = classes
            .iter()
            .zip(&self.classes)
            .any(|(a, b)| (*a == CellClass::Hole) != (*b == CellClass::Hole));
        let classes_changed = classes != self.classes;
        let moved = centre != self.centre;
        let scheduled = self.topology_events.contains(&time.index);

        self.centre = centre;
        self.classes = classes;

        let change = MeshChange {
            changed: moved || classes_changed || scheduled,
            topology_changed: holes_changed || scheduled,
        };
        debug!(
            time_index = time.index,
            changed = change.changed,
            topology_changed = change.topology_changed,
            "overset body at {}",
            self.centre
        );
        Ok(change)
    }

    fn donor_velocity(&self, cell: usize) -> Option<Vector> {
        (self.classes.get(cell) == Some(&CellClass::Interpolated)).then_some(self.velocity)
    }
}

fn classify(mesh: &PolyMesh, centre: Vector, half_extent: Vector) -> Vec<CellClass> {
    let mut classes: Vec<CellClass> = mesh
        .cell_centres()
        .iter()
        .map(|c| {
            let d = (*c - centre).abs();
            if d.cmplt(half_extent).all() {
                CellClass::Hole
            } else {
                CellClass::Active
            }
        })
        .collect();

    let owner = mesh.owner();
    for (f, &n) in mesh.neighbour().iter().enumerate() {
        let o = owner[f];
        match (classes[o], classes[n]) {
            (CellClass::Hole, CellClass::Active) => classes[n] = CellClass::Interpolated,
            (CellClass::Active, CellClass::Hole) => classes[o] = CellClass::Interpolated,
            _ => {}
        }
    }
    classes
}

fn check_active(classes: &[CellClass], time_index: u64) -> Result<(), MeshError> {
    if classes.iter().any(|c| *c == CellClass::Active) {
        Ok(())
    } else {
        Err(MeshError::TopologyFailed {
            time_index,
            reason: "overset body covers every background cell".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockMesh;

    fn background() -> (BlockMesh, PolyMesh) {
        let block = BlockMesh::new([8, 8, 1], Vector::new(8.0, 8.0, 1.0));
        let mesh = block.build().unwrap();
        (block, mesh)
    }

    #[test]
    fn hole_is_surrounded_by_fringe() {
        let (block, mesh) = background();
        let engine = OversetBoxMesh::new(
            mesh,
            Vector::new(4.0, 4.0, 0.5),
            Vector::new(1.0, 1.0, 1.0),
            Vector::ZERO,
        )
        .unwrap();
        let classes = engine.cell_classes();
        // Centres at 3.5 and 4.5 fall inside |d| < 1.
        assert_eq!(classes[block.cell_id(3, 3, 0)], CellClass::Hole);
        assert_eq!(classes[block.cell_id(4, 4, 0)], CellClass::Hole);
        assert_eq!(classes[block.cell_id(2, 3, 0)], CellClass::Interpolated);
        assert_eq!(classes[block.cell_id(3, 5, 0)], CellClass::Interpolated);
        assert_eq!(classes[block.cell_id(2, 2, 0)], CellClass::Active);
        assert_eq!(
            engine.donor_velocity(block.cell_id(2, 3, 0)),
            Some(Vector::ZERO)
        );
        assert_eq!(engine.donor_velocity(block.cell_id(0, 0, 0)), None);
    }

    #[test]
    fn moving_body_reports_topology_when_holes_shift() {
        let (_, mesh) = background();
        let mut engine = OversetBoxMesh::new(
            mesh,
            Vector::new(2.0, 4.0, 0.5),
            Vector::new(1.0, 1.0, 1.0),
            Vector::new(1.0, 0.0, 0.0),
        )
        .unwrap();
        let mut t = TimeState::new(0.0, 10.0, 0.25);
        t.advance();
        // 0.25 of a cell: centre moves, hole set does not.
        let change = engine.update(&t).unwrap();
        assert!(change.changed);
        assert!(!change.topology_changed);
        t.set_delta_t(1.0);
        t.advance();
        let change = engine.update(&t).unwrap();
        assert!(change.topology_changed);
    }

    #[test]
    fn scheduled_event_forces_topology_change() {
        let (_, mesh) = background();
        let mut engine = OversetBoxMesh::new(
            mesh,
            Vector::new(4.0, 4.0, 0.5),
            Vector::splat(1.0),
            Vector::ZERO,
        )
        .unwrap()
        .with_topology_events([2]);
        let mut t = TimeState::new(0.0, 10.0, 0.1);
        t.advance();
        assert_eq!(engine.update(&t).unwrap(), MeshChange::NONE);
        t.advance();
        assert_eq!(engine.update(&t).unwrap(), MeshChange::TOPOLOGY);
    }

    #[test]
    fn body_covering_everything_is_fatal() {
        let (_, mesh) = background();
        match OversetBoxMesh::new(mesh, Vector::splat(4.0), Vector::splat(100.0), Vector::ZERO) {
            Err(MeshError::TopologyFailed { .. }) => {}
            other => panic!("expected TopologyFailed, got {other:?}"),
        }
    }
}
