//! Wave generation and absorption through relaxation zones.

use serde::{Deserialize, Serialize};
use std::f64::consts::{E, PI};
use tracing::info;
use vofcap_core::{TimeState, Vector};
use vofcap_fields::FieldStore;
use vofcap_mesh::PolyMesh;

/// Forcing applied to velocity and phase fraction near boundaries.
///
/// [`correct`](WaveForcing::correct) runs at the start of every time step
/// and [`close`](WaveForcing::close) exactly once when the run ends.
pub trait WaveForcing: Send {
    /// Blend `U` and `alpha1` towards the forcing target.
    fn correct(&mut self, mesh: &PolyMesh, time: &TimeState, fields: &mut FieldStore);

    /// Release resources held for the run.
    fn close(&mut self);
}

/// No wave forcing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoWaveForcing;

impl WaveForcing for NoWaveForcing {
    fn correct(&mut self, _mesh: &PolyMesh, _time: &TimeState, _fields: &mut FieldStore) {}

    fn close(&mut self) {}
}

// ── Airy wave ───────────────────────────────────────────────────

/// Linear (Airy) wave travelling in `+x` over a flat bed, `z` up.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AiryWave {
    /// Crest-to-trough height.
    pub height: f64,
    /// Wave period.
    pub period: f64,
    /// Still-water depth.
    pub depth: f64,
    /// Elevation of the still-water level.
    pub sea_level: f64,
    /// Gravitational acceleration magnitude.
    pub g: f64,
}

impl AiryWave {
    /// Angular frequency.
    pub fn omega(&self) -> f64 {
        2.0 * PI / self.period
    }

    /// Wave number from the linear dispersion relation.
    pub fn wave_number(&self) -> f64 {
        let omega = self.omega();
        let mut k = omega * omega / self.g;
        for _ in 0..50 {
            let th = (k * self.depth).tanh();
            let f = self.g * k * th - omega * omega;
            let df = self.g * th + self.g * k * self.depth * (1.0 - th * th);
            let step = f / df;
            k -= step;
            if step.abs() < 1e-14 * k {
                break;
            }
        }
        k
    }

    /// Free-surface elevation at `x`.
    pub fn elevation(&self, k: f64, x: f64, t: f64) -> f64 {
        self.sea_level + 0.5 * self.height * (k * x - self.omega() * t).cos()
    }

    /// Orbital velocity at `p`, zero above the free surface.
    pub fn velocity(&self, k: f64, p: Vector, t: f64) -> Vector {
        let eta = self.elevation(k, p.x, t);
        if p.z > eta {
            return Vector::ZERO;
        }
        let theta = k * p.x - self.omega() * t;
        let z = (p.z - self.sea_level + self.depth).max(0.0);
        let a = 0.5 * self.height * self.omega() / (k * self.depth).sinh();
        Vector::new(
            a * (k * z).cosh() * theta.cos(),
            0.0,
            a * (k * z).sinh() * theta.sin(),
        )
    }
}

// ── RelaxationZone ──────────────────────────────────────────────

/// Relaxation weight at normalised depth into the zone.
///
/// `sigma = 0` at the edge facing the computational domain keeps the
/// computed solution; `sigma = 1` at the outer edge imposes the target.
pub fn relaxation_weight(sigma: f64) -> f64 {
    let s = sigma.clamp(0.0, 1.0);
    1.0 - ((s.powf(3.5)).exp() - 1.0) / (E - 1.0)
}

/// A zone spanning `x` from `inner` to `outer` that blends the solution
/// towards an Airy wave (generation) or still water (absorption).
#[derive(Clone, Debug)]
pub struct RelaxationZone {
    /// `x` of the edge facing the computational domain.
    pub inner: f64,
    /// `x` of the outer edge, usually on the domain boundary.
    pub outer: f64,
    /// Target wave; `None` relaxes towards still water.
    pub wave: Option<AiryWave>,
    /// Still-water level used when absorbing.
    pub sea_level: f64,
    k: f64,
    closed: bool,
}

impl RelaxationZone {
    /// Wave-generation zone.
    pub fn generating(inner: f64, outer: f64, wave: AiryWave) -> Self {
        Self {
            inner,
            outer,
            k: wave.wave_number(),
            sea_level: wave.sea_level,
            wave: Some(wave),
            closed: false,
        }
    }

    /// Absorption zone relaxing to still water at `sea_level`.
    pub fn absorbing(inner: f64, outer: f64, sea_level: f64) -> Self {
        Self {
            inner,
            outer,
            wave: None,
            sea_level,
            k: 0.0,
            closed: false,
        }
    }

    /// Normalised depth of `x` into the zone, or `None` outside it.
    pub fn sigma(&self, x: f64) -> Option<f64> {
        let span = self.outer - self.inner;
        if span == 0.0 {
            return None;
        }
        let s = (x - self.inner) / span;
        (0.0..=1.0).contains(&s).then_some(s)
    }

    /// True once [`close`](WaveForcing::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn target(&self, centre: Vector, height: f64, t: f64) -> (Vector, f64) {
        let (eta, u) = match &self.wave {
            Some(w) => (w.elevation(self.k, centre.x, t), w.velocity(self.k, centre, t)),
            None => (self.sea_level, Vector::ZERO),
        };
        let alpha = ((eta - centre.z) / height + 0.5).clamp(0.0, 1.0);
        (u, alpha)
    }
}

impl WaveForcing for RelaxationZone {
    fn correct(&mut self, mesh: &PolyMesh, time: &TimeState, fields: &mut FieldStore) {
        if self.closed {
            return;
        }
        for (i, (c, v)) in mesh
            .cell_centres()
            .iter()
            .zip(mesh.cell_volumes())
            .enumerate()
        {
            let Some(sigma) = self.sigma(c.x) else {
                continue;
            };
            let w = relaxation_weight(sigma);
            let (u_t, alpha_t) = self.target(*c, v.cbrt(), time.value);
            fields.u[i] = fields.u[i] * w + u_t * (1.0 - w);
            fields.alpha1[i] = fields.alpha1[i] * w + alpha_t * (1.0 - w);
        }
        fields.u.correct_boundary_conditions(mesh);
        fields.alpha1.correct_boundary_conditions(mesh);
        fields.update_alpha2();
    }

    fn close(&mut self) {
        if !self.closed {
            info!(inner = self.inner, outer = self.outer, "closing relaxation zone");
            self.closed = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vofcap_mesh::BlockMesh;

    #[test]
    fn weight_runs_from_computed_to_target() {
        assert_eq!(relaxation_weight(0.0), 1.0);
        assert!(relaxation_weight(1.0).abs() < 1e-15);
        let mid = relaxation_weight(0.5);
        assert!(mid > 0.5 && mid < 1.0);
    }

    #[test]
    fn dispersion_relation_holds() {
        let wave = AiryWave {
            height: 0.1,
            period: 2.0,
            depth: 1.0,
            sea_level: 0.0,
            g: 9.81,
        };
        let k = wave.wave_number();
        let lhs = wave.omega().powi(2);
        let rhs = wave.g * k * (k * wave.depth).tanh();
        assert!((lhs - rhs).abs() < 1e-10);
    }

    #[test]
    fn absorbing_zone_calms_outer_cells() {
        let mesh = BlockMesh::new([10, 1, 4], Vector::new(10.0, 1.0, 2.0))
            .build()
            .unwrap();
        let mut fields = FieldStore::new(&mesh);
        fields.u.values_mut().fill(Vector::new(1.0, 0.0, 0.0));
        let mut zone = RelaxationZone::absorbing(5.0, 10.0, 1.0);
        let t = TimeState::new(0.0, 1.0, 0.1);
        zone.correct(&mesh, &t, &mut fields);
        let mag = |i: usize| fields.u[i].x;
        // Cell 9 is deepest in the zone, cell 2 outside it.
        assert!(mag(9) < mag(7));
        assert_eq!(mag(2), 1.0);
        // Below still water the phase target is liquid.
        assert!(fields.alpha1[9] > 0.5);
        assert!(fields.alpha1[9 + 30] < 0.5);
    }

    #[test]
    fn closed_zone_stops_forcing() {
        let mesh = BlockMesh::new([4, 1, 1], Vector::new(4.0, 1.0, 1.0))
            .build()
            .unwrap();
        let mut fields = FieldStore::new(&mesh);
        fields.u.values_mut().fill(Vector::X);
        let mut zone = RelaxationZone::absorbing(0.0, 4.0, 0.5);
        zone.close();
        zone.close();
        assert!(zone.is_closed());
        zone.correct(&mesh, &TimeState::new(0.0, 1.0, 0.1), &mut fields);
        assert!(fields.u.values().iter().all(|u| *u == Vector::X));
    }
}
