//! Mutable simulation state threaded through every stage.

use vofcap_checkpoint::{Checkpoint, CheckpointError};
use vofcap_core::TimeState;
use vofcap_fields::{FieldStore, SurfaceField};
use vofcap_mesh::PolyMesh;

/// Checkpoint record of the per-cell reciprocal time step.
pub const RATES_RECORD: &str = "rDeltaT";

/// Checkpoint record of the cached phase-flux correction.
pub const CORR0_RECORD: &str = "alphaPhi1Corr0";

/// Everything a time step reads and writes besides the models.
///
/// Each stage borrows the parts it needs. Only the orchestrator moves
/// `time`; only the mask manager discards `alpha_phi1_corr0`, which the
/// phase subcycler refreshes.
#[derive(Clone, Debug)]
pub struct SimState {
    /// Time, step index and step history.
    pub time: TimeState,
    /// Field store.
    pub fields: FieldStore,
    /// Limited phase-flux correction of the previous step, face-indexed.
    /// Absent at startup and after a topology change.
    pub alpha_phi1_corr0: Option<SurfaceField<f64>>,
    /// Reciprocal time step per cell: uniform `1/Δt` under global
    /// stepping, the local rate under local time stepping.
    pub r_delta_t: Vec<f64>,
    /// Running sum of the global continuity error.
    pub cumulative_continuity: f64,
}

impl SimState {
    /// Fresh state; the rates are set from `time.delta_t`.
    pub fn new(time: TimeState, fields: FieldStore) -> Self {
        let n_cells = fields.alpha1.values().len();
        Self {
            r_delta_t: vec![time.r_delta_t(); n_cells],
            time,
            fields,
            alpha_phi1_corr0: None,
            cumulative_continuity: 0.0,
        }
    }

    /// Set every cell rate to `1/Δt` of the current step.
    pub fn use_uniform_rate(&mut self) {
        let r = self.time.r_delta_t();
        self.r_delta_t.fill(r);
    }

    /// Checkpoint of the fields, the cell rates and, when present, the
    /// correction cache.
    pub fn capture(&self, mesh: &PolyMesh) -> Checkpoint {
        let mut cp = Checkpoint::capture(&self.time, mesh, &self.fields);
        cp.insert_cell_scalars(mesh, RATES_RECORD, &self.r_delta_t);
        if let Some(corr0) = &self.alpha_phi1_corr0 {
            cp.insert_face_scalars(CORR0_RECORD, corr0.values());
        }
        cp
    }

    /// Restore from `cp`; the end time is kept.
    ///
    /// Every record is checked before anything changes. Returns whether
    /// the checkpoint carried cell rates; without them the rates are left
    /// alone. A missing correction record clears the cache.
    pub fn restore(&mut self, cp: &Checkpoint, mesh: &PolyMesh) -> Result<bool, CheckpointError> {
        let rates = cp.cell_scalars(mesh, RATES_RECORD)?;
        let corr0 = cp.face_scalars(mesh, CORR0_RECORD)?;
        cp.restore(mesh, &mut self.time, &mut self.fields)?;
        if let Some(r) = rates {
            self.r_delta_t.copy_from_slice(r);
        }
        self.alpha_phi1_corr0 =
            corr0.map(|c| SurfaceField::from_values("alphaPhi1Corr0", c.to_vec()));
        Ok(rates.is_some())
    }
}
