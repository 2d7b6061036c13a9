//! Periodic velocity cap in the gas phase.
//!
//! Spray and entrained gas pockets can spin up gas velocities far beyond
//! anything in the liquid. Every `period` steps the cap finds the largest
//! phase-1 speed `|alpha1 U|` in fully liquid cells and rescales
//! gas-dominated cells that exceed it. The work is split into a local map,
//! one global max reduction and a local rescale, so every partition
//! applies the same bound.
//!
//! Only `U` is modified. `phi` and `Uf` keep their values until the next
//! pressure corrector rebuilds them, so capped cells are briefly
//! inconsistent with the face flux.

use tracing::{debug, warn};
use vofcap_core::{CommError, Communicator, Vector};
use vofcap_fields::FieldStore;
use vofcap_mesh::PolyMesh;

/// Liquid cells have `alpha1` strictly above this.
pub const LIQUID_THRESHOLD: f64 = 0.999;

/// Gas-dominated cells have `alpha2` strictly above this.
pub const GAS_THRESHOLD: f64 = 0.5;

/// Outcome of one capping pass.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CapReport {
    /// Global maximum liquid speed; `None` when no partition had a liquid
    /// cell and the pass was skipped.
    pub global_max: Option<f64>,
    /// Cells rescaled on this partition.
    pub capped: usize,
}

/// Velocity cap applied every `period` time steps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VelocityCap {
    period: u64,
}

impl VelocityCap {
    /// Cap with a positive `period`.
    pub fn new(period: u64) -> Self {
        Self { period }
    }

    /// Steps between passes.
    pub fn period(&self) -> u64 {
        self.period
    }

    /// True when step `index` runs a pass.
    pub fn is_due(&self, index: u64) -> bool {
        index % self.period == 0
    }

    /// Run one pass.
    ///
    /// Every partition must call this on the same steps: the global
    /// reduction blocks until all have contributed.
    pub fn apply(
        &self,
        mesh: &PolyMesh,
        fields: &mut FieldStore,
        comm: &dyn Communicator,
    ) -> Result<CapReport, CommError> {
        let local = local_liquid_max(fields);
        let global = comm.all_reduce_max(local)?;
        if !global.is_finite() {
            warn!("no liquid cells in any partition; velocity cap skipped");
            return Ok(CapReport::default());
        }
        let capped = rescale_gas(fields, global);
        fields.u.correct_boundary_conditions(mesh);
        debug!(limit = global, capped, "velocity cap applied");
        Ok(CapReport {
            global_max: Some(global),
            capped,
        })
    }
}

/// Largest phase-1 speed `|alpha1 U|` over liquid cells; `-inf` when
/// there are none.
pub fn local_liquid_max(fields: &FieldStore) -> f64 {
    fields
        .u
        .values()
        .iter()
        .zip(fields.alpha1.values())
        .filter(|(_, a)| **a > LIQUID_THRESHOLD)
        .map(|(u, a)| (*u * *a).length())
        .fold(f64::NEG_INFINITY, f64::max)
}

/// Scale gas cells faster than `limit` down to `limit`, keeping
/// direction. Returns the number of cells changed.
pub fn rescale_gas(fields: &mut FieldStore, limit: f64) -> usize {
    let mut capped = 0;
    let alpha2 = fields.alpha2.values();
    for (u, a2) in fields.u.values_mut().iter_mut().zip(alpha2) {
        let speed = u.length();
        if *a2 > GAS_THRESHOLD && speed > limit {
            *u = if speed > 0.0 { *u * (limit / speed) } else { Vector::ZERO };
            capped += 1;
        }
    }
    capped
}

#[cfg(test)]
mod tests {
    use super::*;
    use vofcap_core::SerialComm;
    use vofcap_mesh::BlockMesh;

    fn two_cells(u_liquid: Vector, u_gas: Vector) -> (PolyMesh, FieldStore) {
        let mesh = BlockMesh::new([2, 1, 1], Vector::new(2.0, 1.0, 1.0)).build().unwrap();
        let mut fields = FieldStore::new(&mesh);
        fields.alpha1[0] = 1.0;
        fields.alpha1[1] = 0.0;
        fields.update_alpha2();
        fields.u[0] = u_liquid;
        fields.u[1] = u_gas;
        (mesh, fields)
    }

    #[test]
    fn fast_gas_is_rescaled() {
        let (mesh, mut fields) = two_cells(Vector::new(2.0, 0.0, 0.0), Vector::new(10.0, 0.0, 0.0));
        let r = VelocityCap::new(5).apply(&mesh, &mut fields, &SerialComm).unwrap();
        assert_eq!(r.global_max, Some(2.0));
        assert_eq!(r.capped, 1);
        assert_eq!(fields.u[1], Vector::new(2.0, 0.0, 0.0));
        assert_eq!(fields.u[0], Vector::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn slow_gas_is_left_alone() {
        let (mesh, mut fields) = two_cells(Vector::new(2.0, 0.0, 0.0), Vector::new(1.0, 0.0, 0.0));
        let r = VelocityCap::new(5).apply(&mesh, &mut fields, &SerialComm).unwrap();
        assert_eq!(r.capped, 0);
        assert_eq!(fields.u[1], Vector::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn limit_is_the_phase_one_speed() {
        let (mesh, mut fields) = two_cells(Vector::new(2.0, 0.0, 0.0), Vector::new(10.0, 0.0, 0.0));
        fields.alpha1[0] = 0.9995;
        fields.update_alpha2();
        let r = VelocityCap::new(1).apply(&mesh, &mut fields, &SerialComm).unwrap();
        let limit = r.global_max.unwrap();
        assert!((limit - 1.999).abs() < 1e-12);
        assert!((fields.u[1].x - 1.999).abs() < 1e-12);
    }

    #[test]
    fn direction_is_kept() {
        let (mesh, mut fields) = two_cells(Vector::new(0.0, 1.0, 0.0), Vector::new(3.0, 4.0, 0.0));
        VelocityCap::new(1).apply(&mesh, &mut fields, &SerialComm).unwrap();
        let u = fields.u[1];
        assert!((u.length() - 1.0).abs() < 1e-12);
        assert!((u.x - 0.6).abs() < 1e-12 && (u.y - 0.8).abs() < 1e-12);
    }

    #[test]
    fn no_liquid_skips_the_pass() {
        let (mesh, mut fields) = two_cells(Vector::ZERO, Vector::new(10.0, 0.0, 0.0));
        fields.alpha1[0] = 0.5;
        fields.update_alpha2();
        assert_eq!(local_liquid_max(&fields), f64::NEG_INFINITY);
        let r = VelocityCap::new(1).apply(&mesh, &mut fields, &SerialComm).unwrap();
        assert_eq!(r, CapReport::default());
        assert_eq!(fields.u[1], Vector::new(10.0, 0.0, 0.0));
    }

    #[test]
    fn interface_cells_are_neither_liquid_nor_gas() {
        let (mesh, mut fields) = two_cells(Vector::new(1.0, 0.0, 0.0), Vector::new(5.0, 0.0, 0.0));
        fields.alpha1[1] = 0.5;
        fields.update_alpha2();
        let r = VelocityCap::new(1).apply(&mesh, &mut fields, &SerialComm).unwrap();
        assert_eq!(r.capped, 0);
    }

    #[test]
    fn due_on_multiples_of_period() {
        let cap = VelocityCap::new(5);
        let due: Vec<u64> = (1..=12).filter(|i| cap.is_due(*i)).collect();
        assert_eq!(due, vec![5, 10]);
        assert!(VelocityCap::new(1).is_due(7));
    }
}
