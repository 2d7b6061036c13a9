//! Benchmark profiles for the vofcap time loop.
//!
//! - [`dam_break_profile`]: closed 2-D tank, liquid column in one corner
//! - [`overset_profile`]: the same tank with a moving overset box
//!
//! Both use a fixed time step so every iteration does the same work.

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use vofcap_core::Vector;
use vofcap_engine::{Simulation, SolverConfig, StepError};
use vofcap_fields::FieldStore;
use vofcap_mesh::{BlockMesh, MeshEngine, OversetBoxMesh, PolyMesh, StaticMesh};

/// Configuration shared by the profiles: fixed `delta_t`, a long end time
/// so benchmarks never run out of steps, no restart.
pub fn bench_config() -> SolverConfig {
    let mut cfg = SolverConfig {
        u_cap_period: Some(5),
        ..SolverConfig::default()
    };
    cfg.time.end_time = 1e6;
    cfg.time.delta_t = 1e-4;
    cfg.time.adjust_time_step = false;
    cfg.output.restart = false;
    cfg.output.write_interval = 0;
    cfg
}

fn tank(n: usize) -> Result<PolyMesh, StepError> {
    let h = 1.0 / n as f64;
    Ok(BlockMesh::new([n, n, 1], Vector::new(1.0, 1.0, h)).build()?)
}

fn column(mesh: &PolyMesh) -> FieldStore {
    let mut fields = FieldStore::new(mesh);
    for (i, c) in mesh.cell_centres().iter().enumerate() {
        // The tank lies in the x-y plane; gravity acts along -y here.
        fields.alpha1[i] = if c.x < 0.4 && c.y < 0.6 { 1.0 } else { 0.0 };
    }
    fields.alpha1.correct_boundary_conditions(mesh);
    fields.update_alpha2();
    fields
}

fn build(engine: Box<dyn MeshEngine>, fields: FieldStore) -> Result<Simulation, StepError> {
    let mut cfg = bench_config();
    cfg.gravity = Vector::new(0.0, -9.81, 0.0);
    Simulation::builder(cfg, engine).fields(fields).build()
}

/// Closed `n` x `n` tank with a collapsing liquid column.
pub fn dam_break_profile(n: usize) -> Result<Simulation, StepError> {
    let mesh = tank(n)?;
    let fields = column(&mesh);
    build(Box::new(StaticMesh::new(mesh)), fields)
}

/// [`dam_break_profile`] with an overset box drifting through the gas.
pub fn overset_profile(n: usize) -> Result<Simulation, StepError> {
    let mesh = tank(n)?;
    let fields = column(&mesh);
    let h = 1.0 / n as f64;
    let engine = OversetBoxMesh::new(
        mesh,
        Vector::new(0.7, 0.75, 0.5 * h),
        Vector::new(0.1, 0.1, h),
        Vector::new(-0.2, 0.0, 0.0),
    )?;
    build(Box::new(engine), fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_build_and_step() {
        let mut sim = dam_break_profile(8).unwrap();
        assert_eq!(sim.mesh().n_cells(), 64);
        sim.step().unwrap();

        let mut sim = overset_profile(10).unwrap();
        let holes = sim.fields().cell_mask.values().iter().filter(|m| **m == 0.0).count();
        assert!(holes > 0);
        sim.step().unwrap();
    }
}
