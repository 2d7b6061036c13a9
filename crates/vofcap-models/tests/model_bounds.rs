//! Property tests for model invariants that hold for any input state.

use proptest::prelude::*;
use vofcap_core::Vector;
use vofcap_fields::FieldStore;
use vofcap_mesh::BlockMesh;
use vofcap_models::waves::relaxation_weight;
use vofcap_models::{ImmiscibleMixture, PhaseProperties};

proptest! {
    #[test]
    fn relaxation_weight_is_monotone(a in 0.0f64..=1.0, b in 0.0f64..=1.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(relaxation_weight(lo) >= relaxation_weight(hi));
        prop_assert!((0.0..=1.0).contains(&relaxation_weight(a)));
    }

    #[test]
    fn bounded_fraction_gives_bounded_density(
        alpha in prop::collection::vec(0.0f64..=1.0, 9),
        rho1 in 100.0f64..2000.0,
        rho2 in 0.1f64..10.0,
    ) {
        let mesh = BlockMesh::new([3, 3, 1], Vector::ONE).build().unwrap();
        let mut fields = FieldStore::new(&mesh);
        fields.alpha1.values_mut().copy_from_slice(&alpha);
        let props = PhaseProperties { rho1, rho2, ..PhaseProperties::default() };
        let mut mix = ImmiscibleMixture::new(props, &mesh);
        mix.correct(&mesh, &mut fields);
        for i in 0..9 {
            prop_assert!(fields.rho[i] >= rho2 - 1e-9 && fields.rho[i] <= rho1 + 1e-9);
            prop_assert_eq!(fields.alpha1[i] + fields.alpha2[i], 1.0);
        }
    }
}
