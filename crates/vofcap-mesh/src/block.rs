//! Structured cuboid mesh generator.

use vofcap_core::Vector;

use crate::error::MeshError;
use crate::poly::{Patch, PatchKind, PolyMesh};

/// One of the six sides of a cuboid block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    /// Face at minimum x.
    XMin,
    /// Face at maximum x.
    XMax,
    /// Face at minimum y.
    YMin,
    /// Face at maximum y.
    YMax,
    /// Face at minimum z.
    ZMin,
    /// Face at maximum z.
    ZMax,
}

impl Side {
    /// All sides in patch order.
    pub const ALL: [Side; 6] = [
        Side::XMin,
        Side::XMax,
        Side::YMin,
        Side::YMax,
        Side::ZMin,
        Side::ZMax,
    ];

    /// Patch name used for this side.
    pub fn name(self) -> &'static str {
        match self {
            Side::XMin => "xMin",
            Side::XMax => "xMax",
            Side::YMin => "yMin",
            Side::YMax => "yMax",
            Side::ZMin => "zMin",
            Side::ZMax => "zMax",
        }
    }

    fn axis(self) -> usize {
        match self {
            Side::XMin | Side::XMax => 0,
            Side::YMin | Side::YMax => 1,
            Side::ZMin | Side::ZMax => 2,
        }
    }

    fn is_max(self) -> bool {
        matches!(self, Side::XMax | Side::YMax | Side::ZMax)
    }
}

/// Builder for a uniform hexahedral block.
///
/// Cells are numbered `i + nx * (j + ny * k)`. Every side defaults to a
/// no-slip [`PatchKind::Wall`].
///
/// ```
/// use vofcap_core::Vector;
/// use vofcap_mesh::{BlockMesh, PatchKind, Side};
///
/// let mesh = BlockMesh::new([4, 4, 1], Vector::new(1.0, 1.0, 0.1))
///     .patch(Side::YMax, PatchKind::FixedPressure)
///     .build()
///     .unwrap();
/// assert_eq!(mesh.n_cells(), 16);
/// assert!(!mesh.is_closed());
/// ```
#[derive(Clone, Debug)]
pub struct BlockMesh {
    cells: [usize; 3],
    size: Vector,
    origin: Vector,
    kinds: [PatchKind; 6],
}

impl BlockMesh {
    /// Block of `cells` divisions spanning `size`, anchored at the origin.
    pub fn new(cells: [usize; 3], size: Vector) -> Self {
        Self {
            cells,
            size,
            origin: Vector::ZERO,
            kinds: [PatchKind::Wall; 6],
        }
    }

    /// Move the minimum corner of the block.
    pub fn origin(mut self, origin: Vector) -> Self {
        self.origin = origin;
        self
    }

    /// Set the kind of the patch on `side`.
    pub fn patch(mut self, side: Side, kind: PatchKind) -> Self {
        self.kinds[side as usize] = kind;
        self
    }

    /// Cell index of block coordinates `(i, j, k)`.
    pub fn cell_id(&self, i: usize, j: usize, k: usize) -> usize {
        i + self.cells[0] * (j + self.cells[1] * k)
    }

    /// Generate the mesh.
    pub fn build(&self) -> Result<PolyMesh, MeshError> {
        let [nx, ny, nz] = self.cells;
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(MeshError::InvalidGeometry {
                reason: format!("block divisions {:?} must all be positive", self.cells),
            });
        }
        if !(self.size.min_element() > 0.0) {
            return Err(MeshError::InvalidGeometry {
                reason: format!("block size {} must be positive", self.size),
            });
        }

        let d = self.size / Vector::new(nx as f64, ny as f64, nz as f64);
        let n = [nx, ny, nz];
        let cell_vol = d.x * d.y * d.z;
        let face_area = [d.y * d.z, d.x * d.z, d.x * d.y];

        let mut cell_centres = Vec::with_capacity(nx * ny * nz);
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    cell_centres.push(self.centre(i, j, k, d));
                }
            }
        }
        let cell_volumes = vec![cell_vol; cell_centres.len()];

        let mut face_centres = Vec::new();
        let mut face_areas = Vec::new();
        let mut owner = Vec::new();
        let mut neighbour = Vec::new();

        // Internal faces, one sweep per axis.
        for axis in 0..3 {
            let mut unit = Vector::ZERO;
            unit[axis] = 1.0;
            for k in 0..nz {
                for j in 0..ny {
                    for i in 0..nx {
                        let ijk = [i, j, k];
                        if ijk[axis] + 1 == n[axis] {
                            continue;
                        }
                        let mut next = ijk;
                        next[axis] += 1;
                        let o = self.cell_id(i, j, k);
                        let nb = self.cell_id(next[0], next[1], next[2]);
                        owner.push(o);
                        neighbour.push(nb);
                        face_centres.push(cell_centres[o] + unit * (0.5 * d[axis]));
                        face_areas.push(unit * face_area[axis]);
                    }
                }
            }
        }

        let mut patches = Vec::with_capacity(6);
        for side in Side::ALL {
            let axis = side.axis();
            let start = owner.len();
            let mut unit = Vector::ZERO;
            unit[axis] = if side.is_max() { 1.0 } else { -1.0 };
            let layer = if side.is_max() { n[axis] - 1 } else { 0 };
            for k in 0..nz {
                for j in 0..ny {
                    for i in 0..nx {
                        if [i, j, k][axis] != layer {
                            continue;
                        }
                        let o = self.cell_id(i, j, k);
                        owner.push(o);
                        face_centres.push(cell_centres[o] + unit * (0.5 * d[axis]));
                        face_areas.push(unit * face_area[axis]);
                    }
                }
            }
            patches.push(Patch {
                name: side.name().to_string(),
                kind: self.kinds[side as usize],
                start,
                size: owner.len() - start,
            });
        }

        PolyMesh::new(
            cell_centres,
            cell_volumes,
            face_centres,
            face_areas,
            owner,
            neighbour,
            patches,
        )
    }

    fn centre(&self, i: usize, j: usize, k: usize, d: Vector) -> Vector {
        self.origin + Vector::new(i as f64 + 0.5, j as f64 + 0.5, k as f64 + 0.5) * d
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn face_counts_match_structured_block() {
        let mesh = BlockMesh::new([3, 4, 2], Vector::new(3.0, 4.0, 2.0))
            .build()
            .unwrap();
        assert_eq!(mesh.n_cells(), 24);
        // (nx-1)ny nz + nx(ny-1)nz + nx ny(nz-1)
        assert_eq!(mesh.n_internal_faces(), 2 * 4 * 2 + 3 * 3 * 2 + 3 * 4);
        // 2(ny nz + nx nz + nx ny)
        assert_eq!(mesh.n_boundary_faces(), 2 * (8 + 6 + 12));
        assert_eq!(mesh.patches().len(), 6);
    }

    #[test]
    fn closed_surface_area_sums_to_zero() {
        let mesh = BlockMesh::new([3, 3, 3], Vector::splat(1.0)).build().unwrap();
        for c in 0..mesh.n_cells() {
            let mut sum = Vector::ZERO;
            for &f in mesh.cell_faces(c) {
                let sf = mesh.face_areas()[f];
                sum += if mesh.owner()[f] == c { sf } else { -sf };
            }
            assert!(sum.length() < 1e-14, "cell {c} surface not closed: {sum}");
        }
    }

    #[test]
    fn volumes_sum_to_block_volume() {
        let mesh = BlockMesh::new([5, 2, 1], Vector::new(1.0, 0.5, 0.1))
            .origin(Vector::new(-1.0, 0.0, 0.0))
            .build()
            .unwrap();
        assert!((mesh.total_volume() - 0.05).abs() < 1e-14);
        assert!((mesh.cell_centres()[0].x + 0.9).abs() < 1e-14);
    }

    #[test]
    fn zero_divisions_are_rejected() {
        match BlockMesh::new([0, 1, 1], Vector::ONE).build() {
            Err(MeshError::InvalidGeometry { .. }) => {}
            other => panic!("expected InvalidGeometry, got {other:?}"),
        }
    }

    #[test]
    fn patch_kinds_follow_builder() {
        let mesh = BlockMesh::new([2, 2, 1], Vector::ONE)
            .patch(Side::YMax, PatchKind::FixedPressure)
            .patch(Side::ZMin, PatchKind::Slip)
            .build()
            .unwrap();
        let kinds: Vec<_> = mesh.patches().iter().map(|p| p.kind).collect();
        assert_eq!(kinds[Side::YMax as usize], PatchKind::FixedPressure);
        assert_eq!(kinds[Side::ZMin as usize], PatchKind::Slip);
        assert_eq!(kinds[Side::XMin as usize], PatchKind::Wall);
    }
}
