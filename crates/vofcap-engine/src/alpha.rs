//! Subcycled, bounded advection of the phase fraction.
//!
//! Each sub-step splits the phase flux into an upwind part and an
//! antidiffusive correction (central differencing plus interface
//! compression), limits the correction with
//! [`limit_correction`](vofcap_fvm::limiter::limit_correction) and updates
//! `alpha1` explicitly. Masked faces carry no phase flux in any sub-step.

use tracing::{debug, warn};
use vofcap_core::{CommError, Communicator, VSMALL};
use vofcap_fields::{FieldStore, SurfaceField};
use vofcap_fvm::{fvc, limiter};
use vofcap_mesh::PolyMesh;
use vofcap_models::ImmiscibleMixture;

use crate::config::{AlphaControls, BoundednessPolicy, SubcyclePolicy};
use crate::error::StepError;
use crate::state::SimState;
use crate::timestep::alpha_courant_number;

/// Outcome of one subcycled advection.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AlphaReport {
    /// Sub-steps taken.
    pub subcycles: u32,
    /// Global extremes of `alpha1` after the last sub-step, before any
    /// clamping.
    pub bounds: (f64, f64),
    /// Global phase-1 volume after the last sub-step.
    pub phase_volume: f64,
    /// Sub-steps whose extremes left `[0, 1]` beyond the tolerance.
    pub violations: u32,
}

/// Phase-fraction advection with a fixed sub-step policy.
#[derive(Clone, Debug, PartialEq)]
pub struct AlphaSubcycler {
    controls: AlphaControls,
}

impl AlphaSubcycler {
    /// Subcycler using `controls`.
    pub fn new(controls: AlphaControls) -> Self {
        Self { controls }
    }

    /// Sub-steps for a step of `delta_t`.
    pub fn n_subcycles(
        &self,
        mesh: &PolyMesh,
        fields: &FieldStore,
        delta_t: f64,
        comm: &dyn Communicator,
    ) -> Result<u32, StepError> {
        match self.controls.subcycles {
            SubcyclePolicy::Fixed(n) => Ok(n.max(1)),
            SubcyclePolicy::CourantBounded { max_co } => {
                let co = alpha_courant_number(mesh, fields, delta_t, comm)?.max;
                let ratio = (co / max_co).ceil();
                if !ratio.is_finite() || ratio > u32::MAX as f64 {
                    return Err(StepError::Unstable {
                        quantity: "interface Courant number",
                        value: co,
                    });
                }
                Ok((ratio as u32).max(1))
            }
        }
    }

    /// Advance `alpha1` over one outer step, then refresh the mixture.
    ///
    /// `state.r_delta_t` is the outer rate; each sub-step runs at
    /// `n` times that rate. `rho_phi` ends as the sub-step average of the
    /// phase-consistent mass flux.
    pub fn advance(
        &self,
        mesh: &PolyMesh,
        state: &mut SimState,
        mixture: &mut ImmiscibleMixture,
        comm: &dyn Communicator,
    ) -> Result<AlphaReport, StepError> {
        let n = self.n_subcycles(mesh, &state.fields, state.time.delta_t, comm)?;
        let r_sub: Vec<f64> = state.r_delta_t.iter().map(|r| r * n as f64).collect();

        let mag_sf = mesh.mag_face_areas();
        let local_phic = state
            .fields
            .phi
            .values()
            .iter()
            .zip(mag_sf)
            .map(|(p, s)| p.abs() / s.max(VSMALL))
            .fold(0.0f64, f64::max);
        let max_phic = comm.all_reduce_max(local_phic)?;

        let (rho1, rho2) = (mixture.rho1(), mixture.rho2());
        let mut rho_phi = vec![0.0; mesh.n_faces()];
        let mut report = AlphaReport {
            subcycles: n,
            ..AlphaReport::default()
        };
        let prev_corr = if self.controls.apply_prev_corr {
            state
                .alpha_phi1_corr0
                .as_ref()
                .filter(|c| c.len() == mesh.n_faces())
                .map(|c| c.values().to_vec())
        } else {
            None
        };
        let mut last_corr = Vec::new();

        for sub in 0..n {
            let fields = &mut state.fields;
            let (lo, mut corr) = self.split_flux(mesh, fields, mixture.n_hatf(), max_phic);
            if let Some(c0) = &prev_corr {
                for (c, c0) in corr.iter_mut().zip(c0) {
                    *c = 0.5 * (*c + c0);
                }
            }
            limiter::limit_correction(mesh, &fields.alpha1, &lo, &mut corr, &r_sub, 0.0, 1.0);

            let alpha_phi: Vec<f64> = lo.iter().zip(&corr).map(|(l, c)| l + c).collect();
            let net = fvc::surface_sum(mesh, &alpha_phi);
            let vol = mesh.cell_volumes();
            for (i, a) in fields.alpha1.values_mut().iter_mut().enumerate() {
                *a -= net[i] / (vol[i] * r_sub[i]);
            }

            let (lo_a, hi_a) = global_bounds(fields, comm)?;
            let tol = self.controls.boundedness_tolerance;
            if lo_a < -tol || hi_a > 1.0 + tol {
                report.violations += 1;
                warn!(
                    sub_step = sub + 1,
                    min = lo_a,
                    max = hi_a,
                    policy = ?self.controls.boundedness,
                    "phase fraction out of bounds"
                );
                if self.controls.boundedness == BoundednessPolicy::Clamp {
                    for a in fields.alpha1.values_mut() {
                        *a = a.clamp(0.0, 1.0);
                    }
                }
            }
            report.bounds = (lo_a, hi_a);
            fields.alpha1.correct_boundary_conditions(mesh);
            fields.update_alpha2();

            let phi = fields.phi.values();
            for (f, r) in rho_phi.iter_mut().enumerate() {
                *r += (alpha_phi[f] * (rho1 - rho2) + phi[f] * rho2) / n as f64;
            }
            last_corr = corr;
        }

        let fields = &mut state.fields;
        fields.rho_phi.values_mut().copy_from_slice(&rho_phi);
        if self.controls.apply_prev_corr {
            state.alpha_phi1_corr0 = Some(SurfaceField::from_values("alphaPhi1Corr0", last_corr));
        }
        mixture.correct(mesh, fields);

        let local_volume: f64 = fields
            .alpha1
            .values()
            .iter()
            .zip(mesh.cell_volumes())
            .map(|(a, v)| a * v)
            .sum();
        report.phase_volume = comm.all_reduce_sum(local_volume)?;
        debug!(
            subcycles = n,
            min = report.bounds.0,
            max = report.bounds.1,
            phase_volume = report.phase_volume,
            "phase fraction advected"
        );
        Ok(report)
    }

    /// Upwind phase flux and unlimited correction, both masked.
    fn split_flux(
        &self,
        mesh: &PolyMesh,
        fields: &FieldStore,
        n_hatf: &[f64],
        max_phic: f64,
    ) -> (Vec<f64>, Vec<f64>) {
        let nf = mesh.n_faces();
        let owner = mesh.owner();
        let w = mesh.weights();
        let mag_sf = mesh.mag_face_areas();
        let phi = fields.phi.values();
        let mask = fields.face_mask.values();
        let a = fields.alpha1.values();
        let mut lo = vec![0.0; nf];
        let mut corr = vec![0.0; nf];

        for (f, &n) in mesh.neighbour().iter().enumerate() {
            let o = owner[f];
            let upwind = if phi[f] >= 0.0 { a[o] } else { a[n] };
            let central = a[o] * w[f] + a[n] * (1.0 - w[f]);
            let phic = (self.controls.c_alpha * phi[f].abs() / mag_sf[f].max(VSMALL)).min(max_phic);
            let phir = phic * n_hatf[f];
            // Compression carries phase 1 along phir and phase 2 against it.
            let (a1, a2) = if phir >= 0.0 {
                (a[o], 1.0 - a[n])
            } else {
                (a[n], 1.0 - a[o])
            };
            lo[f] = phi[f] * upwind * mask[f];
            corr[f] = (phi[f] * (central - upwind) + phir * a1 * a2) * mask[f];
        }
        for f in mesh.n_internal_faces()..nf {
            let upwind = if phi[f] >= 0.0 {
                a[owner[f]]
            } else {
                fields.alpha1.boundary_value(mesh, f)
            };
            lo[f] = phi[f] * upwind * mask[f];
        }
        (lo, corr)
    }
}

fn global_bounds(fields: &FieldStore, comm: &dyn Communicator) -> Result<(f64, f64), CommError> {
    let (lo, hi) = fields.alpha1.min_max();
    Ok((comm.all_reduce_min(lo)?, comm.all_reduce_max(hi)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vofcap_core::{SerialComm, TimeState, Vector};
    use vofcap_mesh::BlockMesh;
    use vofcap_test_utils::{rotating_flux, square_blob};

    fn setup(n: usize) -> (PolyMesh, SimState, ImmiscibleMixture) {
        let h = 1.0 / n as f64;
        let mesh = BlockMesh::new([n, n, 1], Vector::new(1.0, 1.0, h)).build().unwrap();
        let mut fields = FieldStore::new(&mesh);
        let phi = rotating_flux(&mesh, Vector::splat(h), 1.0);
        fields.phi.values_mut().copy_from_slice(&phi);
        square_blob(&mesh, &mut fields, Vector::new(0.3, 0.5, 0.0), 0.15);
        let mut mix = ImmiscibleMixture::new(Default::default(), &mesh);
        mix.correct(&mesh, &mut fields);
        fields.store_old_times();
        let state = SimState::new(TimeState::new(0.0, 1.0, 0.01), fields);
        (mesh, state, mix)
    }

    #[test]
    fn uniform_fraction_is_unchanged() {
        let (mesh, mut state, mut mix) = setup(8);
        state.fields.alpha1.values_mut().fill(0.4);
        state.fields.alpha1.correct_boundary_conditions(&mesh);
        mix.correct(&mesh, &mut state.fields);
        let sub = AlphaSubcycler::new(AlphaControls::default());
        sub.advance(&mesh, &mut state, &mut mix, &SerialComm).unwrap();
        for a in state.fields.alpha1.values() {
            assert!((a - 0.4).abs() < 1e-12, "{a}");
        }
    }

    #[test]
    fn closed_rotation_conserves_and_bounds() {
        let (mesh, mut state, mut mix) = setup(16);
        let sub = AlphaSubcycler::new(AlphaControls {
            subcycles: SubcyclePolicy::Fixed(3),
            ..AlphaControls::default()
        });
        let v0: f64 = state
            .fields
            .alpha1
            .values()
            .iter()
            .zip(mesh.cell_volumes())
            .map(|(a, v)| a * v)
            .sum();
        for _ in 0..5 {
            let r = sub.advance(&mesh, &mut state, &mut mix, &SerialComm).unwrap();
            assert_eq!(r.subcycles, 3);
            assert_eq!(r.violations, 0);
            assert!((r.phase_volume - v0).abs() < 1e-10);
        }
        for (a1, a2) in state.fields.alpha1.values().iter().zip(state.fields.alpha2.values()) {
            assert!(*a1 >= -1e-12 && *a1 <= 1.0 + 1e-12);
            assert!((a1 + a2 - 1.0).abs() < 1e-15);
        }
    }

    #[test]
    fn courant_policy_subdivides() {
        let (mesh, mut state, _) = setup(8);
        let sub = AlphaSubcycler::new(AlphaControls {
            subcycles: SubcyclePolicy::CourantBounded { max_co: 1e-3 },
            ..AlphaControls::default()
        });
        state.time.delta_t = 0.05;
        let n = sub.n_subcycles(&mesh, &state.fields, 0.05, &SerialComm).unwrap();
        assert!(n > 1);
        state.fields.alpha1.values_mut().fill(0.0);
        let n0 = sub.n_subcycles(&mesh, &state.fields, 0.05, &SerialComm).unwrap();
        assert_eq!(n0, 1);
    }

    #[test]
    fn unbounded_courant_number_is_an_error() {
        let (mesh, mut state, _) = setup(8);
        let sub = AlphaSubcycler::new(AlphaControls {
            subcycles: SubcyclePolicy::CourantBounded { max_co: 0.5 },
            ..AlphaControls::default()
        });
        state.fields.phi.values_mut().fill(f64::INFINITY);
        match sub.n_subcycles(&mesh, &state.fields, 0.01, &SerialComm) {
            Err(StepError::Unstable { value, .. }) => assert!(value.is_infinite()),
            other => panic!("expected an instability, got {other:?}"),
        }
    }

    #[test]
    fn masked_faces_carry_no_phase_flux() {
        let (mesh, mut state, mut mix) = setup(8);
        // Mask a full column of faces around cell 27.
        let cell = 27;
        state.fields.cell_mask[cell] = 0.0;
        for &f in mesh.cell_faces(cell) {
            state.fields.face_mask.values_mut()[f] = 0.0;
        }
        let before = state.fields.alpha1[cell];
        AlphaSubcycler::new(AlphaControls::default())
            .advance(&mesh, &mut state, &mut mix, &SerialComm)
            .unwrap();
        assert_eq!(state.fields.alpha1[cell], before);
    }

    #[test]
    fn previous_correction_cached_only_when_enabled() {
        let (mesh, mut state, mut mix) = setup(8);
        AlphaSubcycler::new(AlphaControls::default())
            .advance(&mesh, &mut state, &mut mix, &SerialComm)
            .unwrap();
        assert!(state.alpha_phi1_corr0.is_none());
        AlphaSubcycler::new(AlphaControls {
            apply_prev_corr: true,
            ..AlphaControls::default()
        })
        .advance(&mesh, &mut state, &mut mix, &SerialComm)
        .unwrap();
        assert_eq!(state.alpha_phi1_corr0.as_ref().map(|c| c.len()), Some(mesh.n_faces()));
    }
}
