//! The time loop.
//!
//! [`SimulationBuilder`] validates the configuration, prepares the
//! initial state and optionally restores a checkpoint. [`Simulation`]
//! then runs one time step per [`step`](Simulation::step) call:
//!
//! 1. choose the time step (global Courant bound or local rates),
//! 2. store old-time levels and advance the clock,
//! 3. run the PIMPLE outer loop: mesh update and mask repair, phase
//!    advection, wave forcing, momentum and pressure correctors,
//!    turbulence,
//! 4. cap gas velocities when the cap is due,
//! 5. write a checkpoint when one is due.
//!
//! A mesh-engine or communication failure aborts the step before any
//! checkpoint is written.

use std::time::Instant;

use tracing::{info, warn};
use vofcap_checkpoint::CheckpointStore;
use vofcap_core::{Communicator, SerialComm, TimeState};
use vofcap_fields::FieldStore;
use vofcap_fvm::fvc;
use vofcap_mesh::{MeshEngine, PolyMesh};
use vofcap_models::{
    ImmiscibleMixture, Laminar, MomentumSource, MrfZone, NoWaveForcing, SourceSet,
    TurbulenceModel, WaveForcing,
};

use crate::alpha::AlphaSubcycler;
use crate::config::{ConfigError, SolverConfig};
use crate::error::StepError;
use crate::metrics::StepMetrics;
use crate::momentum::{MomentumModels, MomentumPredictor};
use crate::overset::{update_masks, MaskManager};
use crate::pimple::PimpleControl;
use crate::pressure::PressureCorrector;
use crate::state::SimState;
use crate::timestep::{
    alpha_courant_number, courant_number, mesh_courant_number, TimeStepPolicy,
};
use crate::velocity_cap::VelocityCap;

// Compile-time assertion: a Simulation can be moved to a worker thread.
const _: () = {
    #[allow(dead_code)]
    fn assert_send<T: Send>() {}
    #[allow(dead_code)]
    fn check() {
        assert_send::<Simulation>();
    }
};

fn micros(start: Instant) -> u64 {
    start.elapsed().as_micros() as u64
}

// ── SimulationBuilder ──────────────────────────────────────────────

/// Assembles a [`Simulation`].
///
/// Only the configuration and mesh engine are required. Defaults: a
/// serial communicator, fields from [`FieldStore::new`], laminar flow, no
/// wave forcing, no sources or rotating zones, no checkpoints.
pub struct SimulationBuilder {
    config: SolverConfig,
    engine: Box<dyn MeshEngine>,
    comm: Box<dyn Communicator>,
    fields: Option<FieldStore>,
    turbulence: Option<Box<dyn TurbulenceModel>>,
    waves: Box<dyn WaveForcing>,
    sources: SourceSet,
    mrf: Vec<MrfZone>,
    checkpoints: Option<Box<dyn CheckpointStore>>,
}

impl SimulationBuilder {
    /// Start from a configuration and a mesh engine.
    pub fn new(config: SolverConfig, engine: Box<dyn MeshEngine>) -> Self {
        Self {
            config,
            engine,
            comm: Box::new(SerialComm),
            fields: None,
            turbulence: None,
            waves: Box::new(NoWaveForcing),
            sources: SourceSet::new(),
            mrf: Vec::new(),
            checkpoints: None,
        }
    }

    /// Communicator of this partition.
    pub fn communicator(mut self, comm: Box<dyn Communicator>) -> Self {
        self.comm = comm;
        self
    }

    /// Initial fields. `phi` is taken as given; pass `flux(U)` for a
    /// non-zero initial velocity.
    pub fn fields(mut self, fields: FieldStore) -> Self {
        self.fields = Some(fields);
        self
    }

    /// Turbulence closure.
    pub fn turbulence(mut self, model: Box<dyn TurbulenceModel>) -> Self {
        self.turbulence = Some(model);
        self
    }

    /// Wave forcing.
    pub fn waves(mut self, waves: Box<dyn WaveForcing>) -> Self {
        self.waves = waves;
        self
    }

    /// Add a momentum source.
    pub fn source(mut self, source: Box<dyn MomentumSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Add a rotating zone.
    pub fn mrf_zone(mut self, zone: MrfZone) -> Self {
        self.mrf.push(zone);
        self
    }

    /// Checkpoint store for restarts and periodic writes.
    pub fn checkpoints(mut self, store: Box<dyn CheckpointStore>) -> Self {
        self.checkpoints = Some(store);
        self
    }

    /// Validate, initialise and return a simulation ready to step.
    ///
    /// # Errors
    ///
    /// [`StepError::Config`] for an invalid configuration or fields that
    /// do not match the mesh, [`StepError::Checkpoint`] when a restart
    /// checkpoint cannot be read or applied, [`StepError::Comm`] when the
    /// initial Courant reduction fails.
    pub fn build(self) -> Result<Simulation, StepError> {
        let config = self.config;
        config.validate()?;
        let cap = VelocityCap::new(config.cap_period()?);
        let engine = self.engine;
        let comm = self.comm;
        let mesh = engine.mesh();

        let fields = match self.fields {
            Some(f) => {
                check_shape(mesh, &f)?;
                f
            }
            None => FieldStore::new(mesh),
        };
        let t = &config.time;
        let time = TimeState::new(t.start_time, t.end_time, t.delta_t);
        let mut state = SimState::new(time, fields);

        update_masks(mesh, engine.cell_classes(), &mut state.fields);
        state
            .fields
            .update_geometric_depth(mesh, config.gravity, config.reference_point);
        let mut mixture = ImmiscibleMixture::new(config.phases, mesh);
        mixture.correct(mesh, &mut state.fields);

        let mut checkpoints = self.checkpoints;
        let mut restored = false;
        let mut rates_restored = false;
        if config.output.restart {
            if let Some(store) = checkpoints.as_mut() {
                if let Some(cp) = store.read_latest()? {
                    rates_restored = state.restore(&cp, mesh)?;
                    mixture.correct(mesh, &mut state.fields);
                    restored = true;
                    info!(
                        time = state.time.value,
                        time_index = state.time.index,
                        "restarted from checkpoint"
                    );
                }
            }
        }

        let masks = MaskManager::from_config(&config);
        if !restored {
            let (_, failed) = masks.correct_phi(mesh, &mut state.fields);
            if failed {
                warn!("initial flux correction incomplete");
            }
            let fields = &mut state.fields;
            fields.uf.assign(&fvc::interpolate(mesh, &fields.u));
            let rho_f = fvc::interpolate(mesh, &fields.rho);
            for (f, r) in fields.rho_phi.values_mut().iter_mut().enumerate() {
                *r = rho_f[f] * fields.phi[f];
            }
        }

        let policy = TimeStepPolicy::from_config(&config);
        if let TimeStepPolicy::GlobalCourant(g) = &policy {
            let co = courant_number(mesh, &state.fields, state.time.delta_t, &*comm)?;
            let dt = g.initial_delta_t(state.time.delta_t, co.max);
            state.time.set_delta_t(dt);
            state.time.delta_t0 = state.time.delta_t;
        }
        let keep_rates = policy.is_local() && rates_restored;
        if !keep_rates {
            state.use_uniform_rate();
        }

        info!(
            cells = mesh.n_cells(),
            faces = mesh.n_faces(),
            rank = comm.rank(),
            delta_t = state.time.delta_t,
            local_time_stepping = policy.is_local(),
            cap_period = cap.period(),
            "simulation initialised"
        );

        let turbulence = match self.turbulence {
            Some(t) => t,
            None => Box::new(Laminar::new(mesh)) as Box<dyn TurbulenceModel>,
        };
        Ok(Simulation {
            alpha: AlphaSubcycler::new(config.alpha.clone()),
            momentum: MomentumPredictor::from_config(&config),
            pressure: PressureCorrector::from_config(&config),
            masks,
            policy,
            cap,
            config,
            engine,
            comm,
            state,
            mixture,
            turbulence,
            waves: self.waves,
            sources: self.sources,
            mrf: self.mrf,
            checkpoints,
            last_metrics: StepMetrics::default(),
            rates_initialised: keep_rates,
            closed: false,
        })
    }
}

fn check_shape(mesh: &PolyMesh, fields: &FieldStore) -> Result<(), ConfigError> {
    let cells = fields.alpha1.values().len();
    let faces = fields.phi.len();
    if cells != mesh.n_cells() || faces != mesh.n_faces() {
        return Err(ConfigError::InvalidValue {
            key: "fields",
            reason: format!(
                "fields sized for {cells} cells and {faces} faces, mesh has {} and {}",
                mesh.n_cells(),
                mesh.n_faces()
            ),
        });
    }
    Ok(())
}

// ── Simulation ─────────────────────────────────────────────────────

/// A two-phase simulation on one partition.
pub struct Simulation {
    config: SolverConfig,
    engine: Box<dyn MeshEngine>,
    comm: Box<dyn Communicator>,
    state: SimState,
    mixture: ImmiscibleMixture,
    turbulence: Box<dyn TurbulenceModel>,
    waves: Box<dyn WaveForcing>,
    sources: SourceSet,
    mrf: Vec<MrfZone>,
    checkpoints: Option<Box<dyn CheckpointStore>>,
    policy: TimeStepPolicy,
    masks: MaskManager,
    alpha: AlphaSubcycler,
    momentum: MomentumPredictor,
    pressure: PressureCorrector,
    cap: VelocityCap,
    last_metrics: StepMetrics,
    /// Local rates exist from a previous step and may damp the next ones.
    rates_initialised: bool,
    closed: bool,
}

impl Simulation {
    /// Shorthand for [`SimulationBuilder::new`].
    pub fn builder(config: SolverConfig, engine: Box<dyn MeshEngine>) -> SimulationBuilder {
        SimulationBuilder::new(config, engine)
    }

    /// Run one time step.
    ///
    /// # Errors
    ///
    /// Any error is fatal for the run: the state is left mid-step and no
    /// checkpoint is written for it.
    pub fn step(&mut self) -> Result<StepMetrics, StepError> {
        let step_start = Instant::now();
        let mut metrics = StepMetrics::default();

        // 1. Time step.
        self.choose_time_step(&mut metrics)?;

        // 2. Old-time levels, then the new time.
        self.state.fields.store_old_times();
        self.state.time.advance();
        info!(
            time = self.state.time.value,
            time_index = self.state.time.index,
            delta_t = self.state.time.delta_t,
            "time step"
        );

        // 3. Outer loop.
        let mut pimple = PimpleControl::new(&self.config.pimple);
        while pimple.next_outer() {
            self.outer_iteration(&mut pimple, &mut metrics)?;
        }
        metrics.outer_iterations = pimple.outer();

        // 4. Velocity cap.
        if self.cap.is_due(self.state.time.index) {
            let t = Instant::now();
            let report = self
                .cap
                .apply(self.engine.mesh(), &mut self.state.fields, &*self.comm)?;
            metrics.u_cap_ran = true;
            metrics.u_cap_max = report.global_max;
            metrics.capped_cells = report.capped;
            metrics.cap_us = micros(t);
        }

        // 5. Checkpoint.
        if self.checkpoint_due() {
            if let Some(store) = self.checkpoints.as_mut() {
                let t = Instant::now();
                let cp = self.state.capture(self.engine.mesh());
                store.write(&cp)?;
                metrics.checkpoint_written = true;
                metrics.checkpoint_us = micros(t);
            }
        }

        self.state.time.end_step();
        metrics.time_index = self.state.time.index;
        metrics.delta_t = self.state.time.delta_t;
        metrics.total_us = micros(step_start);
        info!(
            time_index = metrics.time_index,
            outer_iterations = metrics.outer_iterations,
            solver_warnings = metrics.solver_warnings,
            alpha_min = metrics.alpha_bounds.0,
            alpha_max = metrics.alpha_bounds.1,
            total_us = metrics.total_us,
            "step complete"
        );
        self.last_metrics = metrics.clone();
        Ok(metrics)
    }

    /// Step until the end time, then close the wave forcing. Returns the
    /// number of steps taken.
    ///
    /// On error the run stops at once; wave forcing is not closed.
    pub fn run(&mut self) -> Result<u64, StepError> {
        let mut steps = 0;
        while self.state.time.is_running() {
            self.step()?;
            steps += 1;
        }
        self.finish();
        info!(steps, time = self.state.time.value, "run complete");
        Ok(steps)
    }

    /// Close the wave forcing. Idempotent.
    pub fn finish(&mut self) {
        if !self.closed {
            self.waves.close();
            self.closed = true;
        }
    }

    fn checkpoint_due(&self) -> bool {
        let interval = self.config.output.write_interval;
        let at_interval = interval > 0 && self.state.time.index % interval == 0;
        at_interval || !self.state.time.is_running()
    }

    fn choose_time_step(&mut self, metrics: &mut StepMetrics) -> Result<(), StepError> {
        let mesh = self.engine.mesh();
        let comm = &*self.comm;
        match &self.policy {
            TimeStepPolicy::LocalTimeStepping(lts) => {
                let (min_dt, max_dt) = lts.update_rates(
                    mesh,
                    &self.state.fields,
                    &mut self.state.r_delta_t,
                    self.rates_initialised,
                    comm,
                )?;
                self.rates_initialised = true;
                self.state.time.set_delta_t(min_dt);
                info!(min_delta_t = min_dt, max_delta_t = max_dt, "local time steps");
            }
            TimeStepPolicy::GlobalCourant(g) => {
                let dt = self.state.time.delta_t;
                let co = courant_number(mesh, &self.state.fields, dt, comm)?;
                let alpha_co = alpha_courant_number(mesh, &self.state.fields, dt, comm)?;
                let mesh_co = match (g.max_mesh_co, self.engine.mesh_phi()) {
                    (Some(_), Some(mesh_phi)) => {
                        Some(mesh_courant_number(mesh, mesh_phi, dt, comm)?.max)
                    }
                    _ => None,
                };
                metrics.courant = (co.mean, co.max);
                metrics.alpha_courant = alpha_co.max;
                metrics.mesh_courant = mesh_co;
                info!(
                    courant_mean = co.mean,
                    courant_max = co.max,
                    interface_courant_max = alpha_co.max,
                    "Courant numbers"
                );
                let next = g.next_delta_t(dt, co.max, alpha_co.max, mesh_co);
                self.state.time.set_delta_t(next);
                self.state.use_uniform_rate();
            }
        }
        Ok(())
    }

    fn outer_iteration(
        &mut self,
        pimple: &mut PimpleControl,
        metrics: &mut StepMetrics,
    ) -> Result<(), StepError> {
        let comm = &*self.comm;

        if pimple.update_mesh() {
            let t = Instant::now();
            let change = self.engine.update(&self.state.time)?;
            metrics.mesh_update_us += micros(t);
            if change.changed {
                metrics.mesh_changed = true;
                let t = Instant::now();
                let report = self
                    .masks
                    .repair(&*self.engine, change, &mut self.state, &mut self.mixture);
                if report.solver_warning {
                    metrics.solver_warnings += 1;
                }
                if self.config.courant.check_mesh_courant {
                    if let Some(mesh_phi) = self.engine.mesh_phi() {
                        let mco = mesh_courant_number(
                            self.engine.mesh(),
                            mesh_phi,
                            self.state.time.delta_t,
                            comm,
                        )?;
                        metrics.mesh_courant = Some(mco.max);
                    }
                }
                metrics.mask_repair_us += micros(t);
            }
        }

        let engine = &*self.engine;
        let mesh = engine.mesh();

        let t = Instant::now();
        let alpha = self.alpha.advance(mesh, &mut self.state, &mut self.mixture, comm)?;
        metrics.alpha_subcycles = alpha.subcycles;
        metrics.alpha_bounds = alpha.bounds;
        let fields = &mut self.state.fields;
        fields.rho_phi.scale_by(fields.face_mask.values());
        self.waves.correct(mesh, &self.state.time, fields);
        self.mixture.correct(mesh, fields);
        metrics.alpha_us += micros(t);

        {
            let models = MomentumModels {
                mixture: &self.mixture,
                turbulence: &*self.turbulence,
                sources: &self.sources,
                mrf: &self.mrf,
            };
            let t = Instant::now();
            let ueqn = self
                .momentum
                .predict(engine, &mut self.state, &models, pimple.is_final());
            if ueqn.solver_warning {
                metrics.solver_warnings += 1;
            }
            metrics.momentum_us += micros(t);

            let t = Instant::now();
            let n_corr = pimple.n_correctors();
            let mut first_residual = None;
            for corr in 1..=n_corr {
                let out = self.pressure.correct(
                    engine,
                    &mut self.state,
                    &models,
                    &ueqn.eqn,
                    pimple.is_final(),
                    corr == n_corr,
                    comm,
                )?;
                metrics.solver_warnings += out.solver_warnings;
                metrics.continuity = out.continuity;
                if first_residual.is_none() {
                    first_residual = out.initial_residual();
                }
            }
            metrics.pressure_us += micros(t);
            if let Some(r) = first_residual {
                pimple.record_residual(r);
            }
        }

        if pimple.turb_corr() {
            self.turbulence.correct(mesh, &self.state.fields);
        }
        Ok(())
    }

    // ── Accessors ──────────────────────────────────────────────────

    /// Current state.
    pub fn state(&self) -> &SimState {
        &self.state
    }

    /// Mutable state, for initial conditions and diagnostics between
    /// steps.
    pub fn state_mut(&mut self) -> &mut SimState {
        &mut self.state
    }

    /// Current fields.
    pub fn fields(&self) -> &FieldStore {
        &self.state.fields
    }

    /// Current time.
    pub fn time(&self) -> &TimeState {
        &self.state.time
    }

    /// Current mesh.
    pub fn mesh(&self) -> &PolyMesh {
        self.engine.mesh()
    }

    /// Mixture model.
    pub fn mixture(&self) -> &ImmiscibleMixture {
        &self.mixture
    }

    /// Validated configuration.
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Metrics of the last completed step.
    pub fn last_metrics(&self) -> &StepMetrics {
        &self.last_metrics
    }

    /// Checkpoint store, if one was configured.
    pub fn checkpoint_store(&self) -> Option<&dyn CheckpointStore> {
        self.checkpoints.as_deref()
    }

    /// True once [`finish`](Simulation::finish) has run.
    pub fn is_finished(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vofcap_core::Vector;
    use vofcap_mesh::{BlockMesh, StaticMesh};

    fn config() -> SolverConfig {
        let mut cfg = SolverConfig {
            u_cap_period: Some(2),
            ..SolverConfig::default()
        };
        cfg.time.end_time = 0.004;
        cfg.time.delta_t = 0.001;
        cfg.time.adjust_time_step = false;
        cfg
    }

    fn engine() -> Box<dyn MeshEngine> {
        let mesh = BlockMesh::new([4, 1, 4], Vector::new(1.0, 0.25, 1.0)).build().unwrap();
        Box::new(StaticMesh::new(mesh))
    }

    #[test]
    fn build_rejects_missing_cap_period() {
        let cfg = SolverConfig::default();
        let err = Simulation::builder(cfg, engine()).build().err().unwrap();
        assert!(matches!(err, StepError::Config(ConfigError::Missing { key: "u_cap_period" })));
    }

    #[test]
    fn build_rejects_mismatched_fields() {
        let other = BlockMesh::new([2, 1, 1], Vector::ONE).build().unwrap();
        let err = Simulation::builder(config(), engine())
            .fields(FieldStore::new(&other))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, StepError::Config(ConfigError::InvalidValue { key: "fields", .. })));
    }

    #[test]
    fn still_gas_runs_to_end_time() {
        let mut sim = Simulation::builder(config(), engine()).build().unwrap();
        let steps = sim.run().unwrap();
        assert_eq!(steps, 4);
        assert!((sim.time().value - 0.004).abs() < 1e-12);
        assert!(sim.is_finished());
        assert_eq!(sim.last_metrics().time_index, 4);
        assert!(sim.last_metrics().u_cap_max.is_none());
        for u in sim.fields().u.values() {
            assert!(u.length() < 1e-6);
        }
    }

    #[test]
    fn cap_runs_on_its_period() {
        let mut sim = Simulation::builder(config(), engine()).build().unwrap();
        {
            let fields = &mut sim.state_mut().fields;
            fields.alpha1[0] = 1.0;
            fields.update_alpha2();
        }
        let due: Vec<bool> = (0..4).map(|_| sim.step().unwrap().u_cap_ran).collect();
        assert_eq!(due, [false, true, false, true]);
    }
}
