//! Solver configuration, validation, and error types.
//!
//! [`SolverConfig`] is the builder input for a
//! [`Simulation`](crate::Simulation). It deserializes from JSON with every
//! section optional except `u_cap_period`, and
//! [`validate()`](SolverConfig::validate) checks every invariant before the
//! time loop starts.

use serde::{Deserialize, Serialize};
use vofcap_core::Vector;
use vofcap_fvm::SolverControls;
use vofcap_models::PhaseProperties;

// ── TimeControls ───────────────────────────────────────────────────

/// Run length and time-step bounds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeControls {
    /// Start time. Default: 0.
    pub start_time: f64,
    /// End time. Default: 1.
    pub end_time: f64,
    /// Initial time step. Default: 1e-3.
    pub delta_t: f64,
    /// Adjust the step from the Courant numbers. Default: true.
    pub adjust_time_step: bool,
    /// Upper bound on the step. Default: 1.
    pub max_delta_t: f64,
    /// Lower bound on the step, applied after every other limit. Default: 0.
    pub min_delta_t: f64,
}

impl Default for TimeControls {
    fn default() -> Self {
        Self {
            start_time: 0.0,
            end_time: 1.0,
            delta_t: 1e-3,
            adjust_time_step: true,
            max_delta_t: 1.0,
            min_delta_t: 0.0,
        }
    }
}

// ── CourantControls ────────────────────────────────────────────────

/// Courant-number limits for global time stepping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourantControls {
    /// Flow Courant limit. Default: 0.5.
    pub max_co: f64,
    /// Courant limit in cells near the interface. Default: 0.5.
    pub max_alpha_co: f64,
    /// Bound the step by the mesh-motion Courant number. Default: false.
    pub check_mesh_courant: bool,
    /// Mesh-motion Courant limit. Default: 1.
    pub max_mesh_co: f64,
}

impl Default for CourantControls {
    fn default() -> Self {
        Self {
            max_co: 0.5,
            max_alpha_co: 0.5,
            check_mesh_courant: false,
            max_mesh_co: 1.0,
        }
    }
}

// ── PimpleControls ─────────────────────────────────────────────────

/// Outer and inner iteration counts of the pressure-velocity coupling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PimpleControls {
    /// Outer iterations per time step. Default: 1.
    pub n_outer_correctors: u32,
    /// Pressure correctors per outer iteration. Default: 2.
    pub n_correctors: u32,
    /// Extra pressure solves per corrector. Default: 0.
    pub n_non_orth_correctors: u32,
    /// Solve the momentum equation before the correctors. Default: true.
    pub momentum_predictor: bool,
    /// Update the mesh on every outer iteration, not just the first.
    /// Default: false.
    pub move_mesh_outer_correctors: bool,
    /// Run the flux correction at startup and after mesh changes.
    /// Default: true.
    pub correct_phi: bool,
    /// Update turbulence on the final outer iteration only. Default: true.
    pub turb_on_final_iter_only: bool,
    /// Stop the outer loop early once the first pressure solve of an
    /// iteration starts below this residual. Default: none.
    pub outer_tolerance: Option<f64>,
    /// Pressure reference cell for closed domains. Default: 0.
    pub p_ref_cell: usize,
    /// Pressure at the reference cell. Default: 0.
    pub p_ref_value: f64,
}

impl Default for PimpleControls {
    fn default() -> Self {
        Self {
            n_outer_correctors: 1,
            n_correctors: 2,
            n_non_orth_correctors: 0,
            momentum_predictor: true,
            move_mesh_outer_correctors: false,
            correct_phi: true,
            turb_on_final_iter_only: true,
            outer_tolerance: None,
            p_ref_cell: 0,
            p_ref_value: 0.0,
        }
    }
}

// ── AlphaControls ──────────────────────────────────────────────────

/// How many sub-steps the phase advection takes per time step.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubcyclePolicy {
    /// Always this many sub-steps.
    Fixed(u32),
    /// As many sub-steps as needed to keep the interface Courant number
    /// of each sub-step below `max_co`.
    CourantBounded {
        /// Per-sub-step interface Courant limit.
        max_co: f64,
    },
}

/// What to do with phase fractions outside `[0, 1]` after a sub-step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundednessPolicy {
    /// Log a warning and keep the values.
    #[default]
    WarnOnly,
    /// Log a warning and clip to `[0, 1]`.
    Clamp,
}

/// Phase advection settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlphaControls {
    /// Sub-step policy. Default: one sub-step.
    pub subcycles: SubcyclePolicy,
    /// Interface compression coefficient. Default: 1.
    pub c_alpha: f64,
    /// Blend the previous step's limited correction into this one.
    /// Default: false.
    pub apply_prev_corr: bool,
    /// Out-of-bounds handling. Default: warn only.
    pub boundedness: BoundednessPolicy,
    /// Excursion beyond `[0, 1]` tolerated without a warning.
    /// Default: 1e-6.
    pub boundedness_tolerance: f64,
}

impl Default for AlphaControls {
    fn default() -> Self {
        Self {
            subcycles: SubcyclePolicy::Fixed(1),
            c_alpha: 1.0,
            apply_prev_corr: false,
            boundedness: BoundednessPolicy::WarnOnly,
            boundedness_tolerance: 1e-6,
        }
    }
}

// ── Relaxation ─────────────────────────────────────────────────────

/// Under-relaxation factors, replaced by 1 on the final outer iteration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaxationFactors {
    /// Momentum equation. Default: 1.
    pub u: f64,
    /// Reduced pressure field. Default: 1.
    pub p_rgh: f64,
}

impl Default for RelaxationFactors {
    fn default() -> Self {
        Self { u: 1.0, p_rgh: 1.0 }
    }
}

// ── LtsControls ────────────────────────────────────────────────────

/// Local time stepping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LtsControls {
    /// Use per-cell pseudo time steps instead of a global step.
    /// Default: false.
    pub enabled: bool,
    /// Flow Courant limit per cell. Default: 0.9.
    pub max_co: f64,
    /// Courant limit in cells near the interface. Default: 0.9.
    pub max_alpha_co: f64,
    /// Largest local step. Default: 1.
    pub max_delta_t: f64,
    /// Neighbour smoothing of the rates. Default: 0.02.
    pub smoothing_coeff: f64,
    /// Fraction of the drop in rate allowed per step; 1 disables.
    /// Default: 1.
    pub damping_coeff: f64,
}

impl Default for LtsControls {
    fn default() -> Self {
        Self {
            enabled: false,
            max_co: 0.9,
            max_alpha_co: 0.9,
            max_delta_t: 1.0,
            smoothing_coeff: 0.02,
            damping_coeff: 1.0,
        }
    }
}

// ── LinearSolverSettings ───────────────────────────────────────────

/// Stopping criteria of one linear system.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearSolverSettings {
    /// Absolute normalised residual.
    pub tolerance: f64,
    /// Relative residual drop; 0 disables.
    pub rel_tol: f64,
    /// Iteration budget.
    pub max_iter: usize,
}

impl LinearSolverSettings {
    /// The solver-level controls.
    pub fn controls(&self) -> SolverControls {
        SolverControls {
            tolerance: self.tolerance,
            rel_tol: self.rel_tol,
            max_iter: self.max_iter,
        }
    }
}

/// Linear solver settings per equation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Reduced pressure, all but the final corrector.
    pub p_rgh: LinearSolverSettings,
    /// Reduced pressure, final corrector of the final outer iteration.
    pub p_rgh_final: LinearSolverSettings,
    /// Momentum predictor.
    pub u: LinearSolverSettings,
    /// Flux-correction potential.
    pub pcorr: LinearSolverSettings,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            p_rgh: LinearSolverSettings {
                tolerance: 1e-7,
                rel_tol: 0.05,
                max_iter: 1000,
            },
            p_rgh_final: LinearSolverSettings {
                tolerance: 1e-7,
                rel_tol: 0.0,
                max_iter: 1000,
            },
            u: LinearSolverSettings {
                tolerance: 1e-6,
                rel_tol: 0.0,
                max_iter: 100,
            },
            pcorr: LinearSolverSettings {
                tolerance: 1e-8,
                rel_tol: 0.0,
                max_iter: 1000,
            },
        }
    }
}

// ── OutputControls ─────────────────────────────────────────────────

/// Checkpointing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputControls {
    /// Write every this many steps; 0 writes at the end time only.
    /// Default: 100.
    pub write_interval: u64,
    /// Restore from the latest checkpoint before the time loop.
    /// Default: true.
    pub restart: bool,
}

impl Default for OutputControls {
    fn default() -> Self {
        Self {
            write_interval: 100,
            restart: true,
        }
    }
}

// ── SolverConfig ───────────────────────────────────────────────────

/// Complete solver configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Run length and step bounds.
    pub time: TimeControls,
    /// Courant limits.
    pub courant: CourantControls,
    /// Pressure-velocity coupling.
    pub pimple: PimpleControls,
    /// Phase advection.
    pub alpha: AlphaControls,
    /// Under-relaxation.
    pub relaxation: RelaxationFactors,
    /// Local time stepping.
    pub lts: LtsControls,
    /// Linear solver tolerances.
    pub solvers: SolverSettings,
    /// Phase properties.
    pub phases: PhaseProperties,
    /// Gravitational acceleration. Default: `(0, 0, -9.81)`.
    pub gravity: Vector,
    /// Origin of the hydrostatic potential. Default: origin.
    pub reference_point: Vector,
    /// Checkpointing.
    pub output: OutputControls,
    /// Steps between velocity-cap passes. Required, at least 1.
    pub u_cap_period: Option<i64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            time: TimeControls::default(),
            courant: CourantControls::default(),
            pimple: PimpleControls::default(),
            alpha: AlphaControls::default(),
            relaxation: RelaxationFactors::default(),
            lts: LtsControls::default(),
            solvers: SolverSettings::default(),
            phases: PhaseProperties::default(),
            gravity: Vector::new(0.0, 0.0, -9.81),
            reference_point: Vector::ZERO,
            output: OutputControls::default(),
            u_cap_period: None,
        }
    }
}

impl SolverConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: SolverConfig = serde_json::from_str(s).map_err(|e| ConfigError::Parse {
            detail: e.to_string(),
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Velocity-cap period of a validated configuration.
    pub fn cap_period(&self) -> Result<u64, ConfigError> {
        match self.u_cap_period {
            None => Err(ConfigError::Missing { key: "u_cap_period" }),
            Some(p) if p <= 0 => Err(ConfigError::InvalidValue {
                key: "u_cap_period",
                reason: format!("must be at least 1, got {p}"),
            }),
            Some(p) => Ok(p as u64),
        }
    }

    /// Check every invariant.
    ///
    /// Called by the simulation builder; a configuration that fails here
    /// never reaches the time loop.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 1. Velocity cap period is required.
        self.cap_period()?;

        // 2. Time bounds.
        let t = &self.time;
        finite("time.start_time", t.start_time)?;
        finite("time.end_time", t.end_time)?;
        if t.end_time <= t.start_time {
            return Err(invalid(
                "time.end_time",
                format!("must exceed start_time {}, got {}", t.start_time, t.end_time),
            ));
        }
        positive("time.delta_t", t.delta_t)?;
        positive("time.max_delta_t", t.max_delta_t)?;
        non_negative("time.min_delta_t", t.min_delta_t)?;
        if t.min_delta_t > t.max_delta_t {
            return Err(invalid(
                "time.min_delta_t",
                format!("must not exceed max_delta_t {}", t.max_delta_t),
            ));
        }

        // 3. Courant limits.
        positive("courant.max_co", self.courant.max_co)?;
        positive("courant.max_alpha_co", self.courant.max_alpha_co)?;
        positive("courant.max_mesh_co", self.courant.max_mesh_co)?;

        // 4. Iteration counts.
        let p = &self.pimple;
        if p.n_outer_correctors == 0 {
            return Err(invalid("pimple.n_outer_correctors", "must be at least 1"));
        }
        if p.n_correctors == 0 {
            return Err(invalid("pimple.n_correctors", "must be at least 1"));
        }
        if let Some(tol) = p.outer_tolerance {
            positive("pimple.outer_tolerance", tol)?;
        }
        finite("pimple.p_ref_value", p.p_ref_value)?;

        // 5. Phase advection.
        match self.alpha.subcycles {
            SubcyclePolicy::Fixed(0) => {
                return Err(invalid("alpha.subcycles", "fixed count must be at least 1"));
            }
            SubcyclePolicy::Fixed(_) => {}
            SubcyclePolicy::CourantBounded { max_co } => {
                positive("alpha.subcycles.max_co", max_co)?
            }
        }
        non_negative("alpha.c_alpha", self.alpha.c_alpha)?;
        non_negative("alpha.boundedness_tolerance", self.alpha.boundedness_tolerance)?;

        // 6. Relaxation factors in (0, 1].
        unit_interval("relaxation.u", self.relaxation.u)?;
        unit_interval("relaxation.p_rgh", self.relaxation.p_rgh)?;

        // 7. Local time stepping.
        let l = &self.lts;
        positive("lts.max_co", l.max_co)?;
        positive("lts.max_alpha_co", l.max_alpha_co)?;
        positive("lts.max_delta_t", l.max_delta_t)?;
        non_negative("lts.smoothing_coeff", l.smoothing_coeff)?;
        unit_interval("lts.damping_coeff", l.damping_coeff)?;

        // 8. Linear solvers.
        for (key, s) in [
            ("solvers.p_rgh", &self.solvers.p_rgh),
            ("solvers.p_rgh_final", &self.solvers.p_rgh_final),
            ("solvers.u", &self.solvers.u),
            ("solvers.pcorr", &self.solvers.pcorr),
        ] {
            positive(key, s.tolerance)?;
            non_negative(key, s.rel_tol)?;
            if s.max_iter == 0 {
                return Err(invalid(key, "max_iter must be at least 1"));
            }
        }

        // 9. Phase properties.
        let ph = &self.phases;
        positive("phases.rho1", ph.rho1)?;
        positive("phases.rho2", ph.rho2)?;
        non_negative("phases.nu1", ph.nu1)?;
        non_negative("phases.nu2", ph.nu2)?;
        non_negative("phases.sigma", ph.sigma)?;

        // 10. Geometry of the hydrostatic potential.
        if !self.gravity.is_finite() {
            return Err(invalid("gravity", "must be finite"));
        }
        if !self.reference_point.is_finite() {
            return Err(invalid("reference_point", "must be finite"));
        }

        Ok(())
    }
}

fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        reason: reason.into(),
    }
}

fn finite(key: &'static str, v: f64) -> Result<(), ConfigError> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(invalid(key, format!("must be finite, got {v}")))
    }
}

fn positive(key: &'static str, v: f64) -> Result<(), ConfigError> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(invalid(key, format!("must be positive, got {v}")))
    }
}

fn non_negative(key: &'static str, v: f64) -> Result<(), ConfigError> {
    if v.is_finite() && v >= 0.0 {
        Ok(())
    } else {
        Err(invalid(key, format!("must be non-negative, got {v}")))
    }
}

fn unit_interval(key: &'static str, v: f64) -> Result<(), ConfigError> {
    if v > 0.0 && v <= 1.0 {
        Ok(())
    } else {
        Err(invalid(key, format!("must lie in (0, 1], got {v}")))
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected while loading or validating a [`SolverConfig`].
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// A required option is absent.
    #[error("missing required option '{key}'")]
    Missing {
        /// Option name.
        key: &'static str,
    },
    /// An option is out of range.
    #[error("invalid value for '{key}': {reason}")]
    InvalidValue {
        /// Option name.
        key: &'static str,
        /// What is wrong with it.
        reason: String,
    },
    /// The document is not valid JSON for this schema.
    #[error("cannot parse configuration: {detail}")]
    Parse {
        /// Parser message.
        detail: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> SolverConfig {
        SolverConfig {
            u_cap_period: Some(5),
            ..SolverConfig::default()
        }
    }

    #[test]
    fn defaults_with_period_are_valid() {
        assert!(valid().validate().is_ok());
        assert_eq!(valid().cap_period(), Ok(5));
    }

    #[test]
    fn missing_period_is_fatal() {
        match SolverConfig::default().validate() {
            Err(ConfigError::Missing { key: "u_cap_period" }) => {}
            other => panic!("expected Missing, got {other:?}"),
        }
    }

    #[test]
    fn zero_and_negative_period_rejected() {
        for p in [0, -3] {
            let cfg = SolverConfig {
                u_cap_period: Some(p),
                ..valid()
            };
            match cfg.validate() {
                Err(ConfigError::InvalidValue { key: "u_cap_period", .. }) => {}
                other => panic!("expected InvalidValue for {p}, got {other:?}"),
            }
        }
    }

    #[test]
    fn end_before_start_rejected() {
        let mut cfg = valid();
        cfg.time.end_time = cfg.time.start_time;
        match cfg.validate() {
            Err(ConfigError::InvalidValue { key: "time.end_time", .. }) => {}
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn zero_subcycles_rejected() {
        let mut cfg = valid();
        cfg.alpha.subcycles = SubcyclePolicy::Fixed(0);
        match cfg.validate() {
            Err(ConfigError::InvalidValue { key: "alpha.subcycles", .. }) => {}
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn relaxation_outside_unit_interval_rejected() {
        let mut cfg = valid();
        cfg.relaxation.p_rgh = 1.5;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidValue { key: "relaxation.p_rgh", .. })
        ));
    }

    #[test]
    fn json_sections_are_optional() {
        let cfg = SolverConfig::from_json_str(
            r#"{
                "u_cap_period": 10,
                "time": { "end_time": 2.0, "delta_t": 0.01 },
                "alpha": { "subcycles": { "courant_bounded": { "max_co": 0.25 } },
                           "boundedness": "clamp" },
                "gravity": [0.0, -9.81, 0.0]
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.time.end_time, 2.0);
        assert_eq!(cfg.time.max_delta_t, 1.0);
        assert_eq!(
            cfg.alpha.subcycles,
            SubcyclePolicy::CourantBounded { max_co: 0.25 }
        );
        assert_eq!(cfg.alpha.boundedness, BoundednessPolicy::Clamp);
        assert_eq!(cfg.gravity, Vector::new(0.0, -9.81, 0.0));
        assert_eq!(cfg.pimple, PimpleControls::default());
    }

    #[test]
    fn json_without_period_is_missing() {
        match SolverConfig::from_json_str("{}") {
            Err(ConfigError::Missing { .. }) => {}
            other => panic!("expected Missing, got {other:?}"),
        }
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        match SolverConfig::from_json_str(r#"{ "u_cap_period": "often" }"#) {
            Err(ConfigError::Parse { .. }) => {}
            other => panic!("expected Parse, got {other:?}"),
        }
    }
}
