//! Face-addressed polyhedral mesh.

use std::sync::Arc;

use smallvec::SmallVec;
use vofcap_core::{Vector, VSMALL};

use crate::error::MeshError;

/// Physical role of a boundary patch.
///
/// The kind decides which boundary conditions the solver attaches to each
/// field on that patch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PatchKind {
    /// No-slip wall: fixed zero velocity, zero-gradient scalars.
    Wall,
    /// Free-slip wall or symmetry plane: zero normal velocity.
    Slip,
    /// Open boundary at fixed reduced pressure (atmosphere).
    FixedPressure,
}

/// A contiguous range of boundary faces sharing one [`PatchKind`].
#[derive(Clone, Debug, PartialEq)]
pub struct Patch {
    /// Patch name, unique within a mesh.
    pub name: String,
    /// Physical role.
    pub kind: PatchKind,
    /// First face of the patch.
    pub start: usize,
    /// Number of faces.
    pub size: usize,
}

impl Patch {
    /// Face range covered by this patch.
    pub fn faces(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.size
    }
}

/// Matrix addressing over internal faces.
///
/// Face `f` couples row `lower()[f]` (the owner) with row `upper()[f]`
/// (the neighbour). Shared by every matrix assembled on one mesh.
#[derive(Clone, Debug, PartialEq)]
pub struct LduAddressing {
    lower: Vec<usize>,
    upper: Vec<usize>,
    cell_faces: Vec<SmallVec<[usize; 6]>>,
}

impl LduAddressing {
    fn new(n_cells: usize, owner: &[usize], neighbour: &[usize]) -> Self {
        let mut cell_faces: Vec<SmallVec<[usize; 6]>> = vec![SmallVec::new(); n_cells];
        for (f, &n) in neighbour.iter().enumerate() {
            cell_faces[owner[f]].push(f);
            cell_faces[n].push(f);
        }
        Self {
            lower: owner[..neighbour.len()].to_vec(),
            upper: neighbour.to_vec(),
            cell_faces,
        }
    }

    /// Number of rows.
    pub fn size(&self) -> usize {
        self.cell_faces.len()
    }

    /// Owner row of each internal face.
    pub fn lower(&self) -> &[usize] {
        &self.lower
    }

    /// Neighbour row of each internal face.
    pub fn upper(&self) -> &[usize] {
        &self.upper
    }

    /// Internal faces touching `row`.
    pub fn row_faces(&self, row: usize) -> &[usize] {
        &self.cell_faces[row]
    }
}

/// Unstructured finite-volume mesh in owner/neighbour form.
///
/// Faces `0..n_internal_faces()` join an owner and a neighbour cell with
/// `owner < neighbour`, and their area vector points out of the owner.
/// The remaining faces belong to exactly one patch and have only an owner.
/// Interpolation weights and normal-distance coefficients are computed
/// once on construction; [`translate`](PolyMesh::translate) leaves them
/// unchanged.
#[derive(Clone, Debug)]
pub struct PolyMesh {
    cell_centres: Vec<Vector>,
    cell_volumes: Vec<f64>,
    face_centres: Vec<Vector>,
    face_areas: Vec<Vector>,
    mag_face_areas: Vec<f64>,
    owner: Vec<usize>,
    neighbour: Vec<usize>,
    patches: Vec<Patch>,
    /// Patch index of each boundary face, offset by `n_internal_faces`.
    face_patch: Vec<usize>,
    cell_faces: Vec<SmallVec<[usize; 6]>>,
    ldu: Arc<LduAddressing>,
    delta_coeffs: Vec<f64>,
    weights: Vec<f64>,
}

impl PolyMesh {
    /// Build a mesh from raw geometry and addressing.
    ///
    /// `owner` has one entry per face, `neighbour` one per internal face.
    /// Patches must tile the boundary faces in order.
    pub fn new(
        cell_centres: Vec<Vector>,
        cell_volumes: Vec<f64>,
        face_centres: Vec<Vector>,
        face_areas: Vec<Vector>,
        owner: Vec<usize>,
        neighbour: Vec<usize>,
        patches: Vec<Patch>,
    ) -> Result<Self, MeshError> {
        let n_cells = cell_centres.len();
        let n_faces = face_centres.len();
        let n_internal = neighbour.len();

        if n_cells == 0 {
            return Err(invalid("mesh has no cells"));
        }
        if cell_volumes.len() != n_cells {
            return Err(invalid(format!(
                "{} cell volumes for {n_cells} cells",
                cell_volumes.len()
            )));
        }
        if face_areas.len() != n_faces || owner.len() != n_faces {
            return Err(invalid("face centres, areas and owners differ in length"));
        }
        if n_internal > n_faces {
            return Err(invalid("more neighbours than faces"));
        }
        if let Some(c) = cell_volumes.iter().position(|v| !(*v > 0.0)) {
            return Err(invalid(format!("cell {c} has non-positive volume")));
        }
        for (f, (&o, &n)) in owner.iter().zip(&neighbour).enumerate() {
            if o >= n || n >= n_cells {
                return Err(invalid(format!(
                    "internal face {f} has owner {o} and neighbour {n}"
                )));
            }
        }
        if let Some(f) = owner.iter().position(|&o| o >= n_cells) {
            return Err(invalid(format!("face {f} owner out of range")));
        }

        let mut face_patch = Vec::with_capacity(n_faces - n_internal);
        let mut next = n_internal;
        for (i, p) in patches.iter().enumerate() {
            if p.start != next {
                return Err(invalid(format!(
                    "patch '{}' starts at {} but the previous patch ends at {next}",
                    p.name, p.start
                )));
            }
            face_patch.extend(std::iter::repeat(i).take(p.size));
            next += p.size;
        }
        if next != n_faces {
            return Err(invalid(format!(
                "patches cover faces up to {next} of {n_faces}"
            )));
        }

        let mut cell_faces: Vec<SmallVec<[usize; 6]>> = vec![SmallVec::new(); n_cells];
        for (f, &o) in owner.iter().enumerate() {
            cell_faces[o].push(f);
        }
        for (f, &n) in neighbour.iter().enumerate() {
            cell_faces[n].push(f);
        }

        let mag_face_areas = face_areas.iter().map(|s| s.length()).collect();
        let ldu = Arc::new(LduAddressing::new(n_cells, &owner, &neighbour));

        let mut mesh = Self {
            cell_centres,
            cell_volumes,
            face_centres,
            face_areas,
            mag_face_areas,
            owner,
            neighbour,
            patches,
            face_patch,
            cell_faces,
            ldu,
            delta_coeffs: Vec::new(),
            weights: Vec::new(),
        };
        mesh.update_interpolation_factors()?;
        Ok(mesh)
    }

    fn update_interpolation_factors(&mut self) -> Result<(), MeshError> {
        let n_faces = self.n_faces();
        let mut delta_coeffs = Vec::with_capacity(n_faces);
        let mut weights = Vec::with_capacity(n_faces);
        for f in 0..n_faces {
            let n = self.face_areas[f] / self.mag_face_areas[f].max(VSMALL);
            let p = self.cell_centres[self.owner[f]];
            let cf = self.face_centres[f];
            if f < self.n_internal_faces() {
                let nb = self.cell_centres[self.neighbour[f]];
                let d = n.dot(nb - p);
                if !(d > 0.0) {
                    return Err(invalid(format!(
                        "face {f} normal does not point from owner to neighbour"
                    )));
                }
                delta_coeffs.push(1.0 / d);
                weights.push(n.dot(nb - cf) / d);
            } else {
                let d = n.dot(cf - p);
                if !(d > 0.0) {
                    return Err(invalid(format!("boundary face {f} normal points inward")));
                }
                delta_coeffs.push(1.0 / d);
                weights.push(1.0);
            }
        }
        self.delta_coeffs = delta_coeffs;
        self.weights = weights;
        Ok(())
    }

    // ── Sizes ───────────────────────────────────────────────────

    /// Number of cells.
    pub fn n_cells(&self) -> usize {
        self.cell_centres.len()
    }

    /// Number of faces, internal and boundary.
    pub fn n_faces(&self) -> usize {
        self.face_centres.len()
    }

    /// Number of internal faces.
    pub fn n_internal_faces(&self) -> usize {
        self.neighbour.len()
    }

    /// Number of boundary faces.
    pub fn n_boundary_faces(&self) -> usize {
        self.n_faces() - self.n_internal_faces()
    }

    /// True when `face` joins two cells.
    pub fn is_internal(&self, face: usize) -> bool {
        face < self.neighbour.len()
    }

    // ── Addressing ──────────────────────────────────────────────

    /// Owner cell of every face.
    pub fn owner(&self) -> &[usize] {
        &self.owner
    }

    /// Neighbour cell of every internal face.
    pub fn neighbour(&self) -> &[usize] {
        &self.neighbour
    }

    /// Faces of `cell`, owned and neighboured.
    pub fn cell_faces(&self, cell: usize) -> &[usize] {
        &self.cell_faces[cell]
    }

    /// Shared matrix addressing.
    pub fn ldu(&self) -> &Arc<LduAddressing> {
        &self.ldu
    }

    /// Boundary patches in face order.
    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    /// Patch index of a boundary face.
    pub fn face_patch(&self, face: usize) -> usize {
        self.face_patch[face - self.n_internal_faces()]
    }

    /// Kind of the patch a boundary face belongs to.
    pub fn face_patch_kind(&self, face: usize) -> PatchKind {
        self.patches[self.face_patch(face)].kind
    }

    /// True when no patch fixes the pressure level.
    pub fn is_closed(&self) -> bool {
        !self
            .patches
            .iter()
            .any(|p| p.kind == PatchKind::FixedPressure && p.size > 0)
    }

    // ── Geometry ────────────────────────────────────────────────

    /// Cell centroids.
    pub fn cell_centres(&self) -> &[Vector] {
        &self.cell_centres
    }

    /// Cell volumes.
    pub fn cell_volumes(&self) -> &[f64] {
        &self.cell_volumes
    }

    /// Sum of all cell volumes.
    pub fn total_volume(&self) -> f64 {
        self.cell_volumes.iter().sum()
    }

    /// Face centroids.
    pub fn face_centres(&self) -> &[Vector] {
        &self.face_centres
    }

    /// Face area vectors `Sf`, pointing out of the owner.
    pub fn face_areas(&self) -> &[Vector] {
        &self.face_areas
    }

    /// Face area magnitudes `|Sf|`.
    pub fn mag_face_areas(&self) -> &[f64] {
        &self.mag_face_areas
    }

    /// Unit normal of `face`.
    pub fn unit_normal(&self, face: usize) -> Vector {
        self.face_areas[face] / self.mag_face_areas[face].max(VSMALL)
    }

    /// Reciprocal normal distance across each face.
    ///
    /// Owner-to-neighbour centre distance for internal faces, owner
    /// centre to face centre for boundary faces.
    pub fn delta_coeffs(&self) -> &[f64] {
        &self.delta_coeffs
    }

    /// Owner weight of linear face interpolation; `1` on boundary faces.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Rigidly shift every cell and face centroid by `delta`.
    pub fn translate(&mut self, delta: Vector) {
        for c in &mut self.cell_centres {
            *c += delta;
        }
        for c in &mut self.face_centres {
            *c += delta;
        }
    }
}

fn invalid(reason: impl Into<String>) -> MeshError {
    MeshError::InvalidGeometry {
        reason: reason.into(),
    }
}
