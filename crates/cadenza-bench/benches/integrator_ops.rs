//! Criterion micro-benchmarks for phase graph construction and traversal.

use cadenza_bench::{drain, reference_profile, stress_profile};
use cadenza_core::GlobalData;
use cadenza_integrator::{Integrator, IntegratorKind};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// Benchmark: Build the predictor-corrector graph for the stress profile.
fn bench_build_predictor_corrector(c: &mut Criterion) {
    let setup = stress_profile(1);

    c.bench_function("build_predictor_corrector_stress", |b| {
        b.iter(|| {
            let integrator =
                Integrator::instance(IntegratorKind::PredictorCorrector, black_box(&setup))
                    .unwrap();
            black_box(integrator.phase_count());
        });
    });
}

/// Benchmark: Hand out every command of a 100-iteration reference run.
fn bench_drain_reference(c: &mut Criterion) {
    let setup = reference_profile(100);

    c.bench_function("drain_reference_100_iterations", |b| {
        b.iter(|| {
            let mut integrator =
                Integrator::instance(IntegratorKind::PredictorCorrector, &setup).unwrap();
            let mut gdata = GlobalData::new(setup.clone());
            black_box(drain(&mut integrator, &mut gdata, 1));
        });
    });
}

/// Benchmark: Hand out every command of a 100-iteration stress run, with
/// the solver converging after three checks.
fn bench_drain_stress(c: &mut Criterion) {
    let setup = stress_profile(100);

    c.bench_function("drain_stress_100_iterations", |b| {
        b.iter(|| {
            let mut integrator =
                Integrator::instance(IntegratorKind::PredictorCorrector, &setup).unwrap();
            let mut gdata = GlobalData::new(setup.clone());
            black_box(drain(&mut integrator, &mut gdata, 3));
        });
    });
}

criterion_group!(
    benches,
    bench_build_predictor_corrector,
    bench_drain_reference,
    bench_drain_stress
);
criterion_main!(benches);
