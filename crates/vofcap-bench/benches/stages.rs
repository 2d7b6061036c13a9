//! Criterion benchmarks for single stages of the time loop.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use vofcap_checkpoint::{codec, Checkpoint};
use vofcap_core::{SerialComm, TimeState, Vector};
use vofcap_engine::config::{AlphaControls, SubcyclePolicy};
use vofcap_engine::{AlphaSubcycler, SimState, VelocityCap};
use vofcap_fields::FieldStore;
use vofcap_models::ImmiscibleMixture;
use vofcap_test_utils::{closed_tank, random_fraction, random_velocity, rotating_flux};

const N: usize = 64;

fn fields() -> (vofcap_mesh::PolyMesh, FieldStore) {
    let h = 1.0 / N as f64;
    let mesh = closed_tank([N, N, 1], Vector::new(1.0, 1.0, h));
    let mut fields = FieldStore::new(&mesh);
    fields.alpha1.values_mut().copy_from_slice(&random_fraction(&mesh, 42));
    fields.alpha1.correct_boundary_conditions(&mesh);
    fields.update_alpha2();
    fields.u.values_mut().copy_from_slice(&random_velocity(&mesh, 42, 1.0));
    fields.phi.values_mut().copy_from_slice(&rotating_flux(&mesh, Vector::splat(h), 0.5));
    (mesh, fields)
}

fn bench_alpha_subcycles(c: &mut Criterion) {
    let (mesh, mut fields) = fields();
    let mut mix = ImmiscibleMixture::new(Default::default(), &mesh);
    mix.correct(&mesh, &mut fields);
    fields.store_old_times();
    let mut state = SimState::new(TimeState::new(0.0, 1.0, 1e-3), fields);
    let sub = AlphaSubcycler::new(AlphaControls {
        subcycles: SubcyclePolicy::Fixed(3),
        ..AlphaControls::default()
    });

    c.bench_function("alpha_3_subcycles_64x64", |b| {
        b.iter(|| {
            let report = sub.advance(&mesh, &mut state, &mut mix, &SerialComm).unwrap();
            black_box(&report);
        });
    });
}

fn bench_velocity_cap(c: &mut Criterion) {
    let (mesh, fields) = fields();
    let cap = VelocityCap::new(1);

    c.bench_function("velocity_cap_64x64", |b| {
        b.iter(|| {
            let mut f = fields.clone();
            let report = cap.apply(&mesh, &mut f, &SerialComm).unwrap();
            black_box(&report);
        });
    });
}

fn bench_checkpoint_encode(c: &mut Criterion) {
    let (mesh, fields) = fields();
    let time = TimeState::new(0.0, 1.0, 1e-3);
    let cp = Checkpoint::capture(&time, &mesh, &fields);
    let mut buf = Vec::new();

    c.bench_function("checkpoint_encode_64x64", |b| {
        b.iter(|| {
            buf.clear();
            codec::encode(&mut buf, &cp).unwrap();
            black_box(buf.len());
        });
    });
}

criterion_group!(
    benches,
    bench_alpha_subcycles,
    bench_velocity_cap,
    bench_checkpoint_encode
);
criterion_main!(benches);
