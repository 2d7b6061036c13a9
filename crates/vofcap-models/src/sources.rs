//! Generic momentum sources.

use vofcap_core::Vector;
use vofcap_fields::FieldStore;
use vofcap_fvm::FvMatrix;
use vofcap_mesh::PolyMesh;

/// A source term added to the momentum equation.
pub trait MomentumSource: Send {
    /// Name for logs.
    fn name(&self) -> &str;

    /// Add the source to `eqn`, whose right-hand side is the source side.
    fn add_sup(&self, mesh: &PolyMesh, fields: &FieldStore, eqn: &mut FvMatrix<Vector>);

    /// Post-solve correction of the velocity. Most sources have none.
    fn correct(&self, _mesh: &PolyMesh, _fields: &mut FieldStore) {}
}

/// Restrict a source to selected cells, or apply everywhere.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CellSelection {
    /// Every cell.
    #[default]
    All,
    /// Listed cells only.
    Cells(Vec<usize>),
}

impl CellSelection {
    fn for_each(&self, n_cells: usize, mut f: impl FnMut(usize)) {
        match self {
            CellSelection::All => (0..n_cells).for_each(f),
            CellSelection::Cells(cells) => cells
                .iter()
                .filter(|c| **c < n_cells)
                .for_each(|c| f(*c)),
        }
    }
}

/// Constant force per unit volume.
#[derive(Clone, Debug)]
pub struct ExplicitBodyForce {
    /// Force density.
    pub force: Vector,
    /// Cells the force acts on.
    pub cells: CellSelection,
}

impl MomentumSource for ExplicitBodyForce {
    fn name(&self) -> &str {
        "explicitBodyForce"
    }

    fn add_sup(&self, mesh: &PolyMesh, _fields: &FieldStore, eqn: &mut FvMatrix<Vector>) {
        let vol = mesh.cell_volumes();
        let source = eqn.source_mut();
        self.cells
            .for_each(mesh.n_cells(), |i| source[i] += self.force * vol[i]);
    }
}

/// Implicit linear damping `-rho * lambda * U`.
#[derive(Clone, Debug)]
pub struct LinearDamping {
    /// Damping rate.
    pub lambda: f64,
    /// Cells that are damped.
    pub cells: CellSelection,
}

impl MomentumSource for LinearDamping {
    fn name(&self) -> &str {
        "linearDamping"
    }

    fn add_sup(&self, mesh: &PolyMesh, fields: &FieldStore, eqn: &mut FvMatrix<Vector>) {
        let vol = mesh.cell_volumes();
        let rho = fields.rho.values();
        let diag = eqn.diag_mut();
        self.cells
            .for_each(mesh.n_cells(), |i| diag[i] += self.lambda * rho[i] * vol[i]);
    }
}

/// The set of momentum sources active in a run.
#[derive(Default)]
pub struct SourceSet {
    sources: Vec<Box<dyn MomentumSource>>,
}

impl SourceSet {
    /// No sources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source.
    pub fn push(&mut self, source: Box<dyn MomentumSource>) {
        self.sources.push(source);
    }

    /// Number of sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// True when no source is configured.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Add every source to `eqn`.
    pub fn add_sup(&self, mesh: &PolyMesh, fields: &FieldStore, eqn: &mut FvMatrix<Vector>) {
        for s in &self.sources {
            s.add_sup(mesh, fields, eqn);
        }
    }

    /// Apply every post-solve correction.
    pub fn correct(&self, mesh: &PolyMesh, fields: &mut FieldStore) {
        for s in &self.sources {
            s.correct(mesh, fields);
        }
    }
}

impl std::fmt::Debug for SourceSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.sources.iter().map(|s| s.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vofcap_mesh::BlockMesh;

    #[test]
    fn body_force_is_volume_integrated() {
        let mesh = BlockMesh::new([2, 1, 1], Vector::new(2.0, 0.5, 1.0))
            .build()
            .unwrap();
        let fields = FieldStore::new(&mesh);
        let mut eqn = FvMatrix::new(&mesh);
        let mut set = SourceSet::new();
        set.push(Box::new(ExplicitBodyForce {
            force: Vector::new(0.0, 0.0, -2.0),
            cells: CellSelection::Cells(vec![1, 7]),
        }));
        set.add_sup(&mesh, &fields, &mut eqn);
        assert_eq!(eqn.source()[0], Vector::ZERO);
        assert_eq!(eqn.source()[1], Vector::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn damping_raises_the_diagonal() {
        let mesh = BlockMesh::new([3, 1, 1], Vector::ONE).build().unwrap();
        let mut fields = FieldStore::new(&mesh);
        fields.rho.values_mut().fill(2.0);
        let mut eqn = FvMatrix::new(&mesh);
        LinearDamping {
            lambda: 3.0,
            cells: CellSelection::All,
        }
        .add_sup(&mesh, &fields, &mut eqn);
        let v = mesh.cell_volumes()[0];
        assert!(eqn.diag().iter().all(|d| (*d - 6.0 * v).abs() < 1e-12));
    }
}
