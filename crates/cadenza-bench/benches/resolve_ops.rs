//! Criterion micro-benchmarks for buffer dependency resolution.

use cadenza_command::resolve_command;
use cadenza_core::GlobalData;
use cadenza_integrator::common::{particle_buffers, STEP_N};
use cadenza_integrator::{Integrator, IntegratorKind};
use cadenza_test_utils::SimulatedBackend;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use cadenza_bench::stress_profile;

/// Benchmark: Resolve every command of one stress-profile iteration
/// against a state table kept in sync by the simulated backend.
fn bench_resolve_stress_iteration(c: &mut Criterion) {
    let setup = stress_profile(1);
    let mut integrator =
        Integrator::instance(IntegratorKind::PredictorCorrector, &setup).unwrap();
    let mut gdata = GlobalData::new(setup.clone());
    let mut backend =
        SimulatedBackend::with_initial_state(STEP_N, &particle_buffers(&setup)).converge_after(2);

    // Record each command together with the table it runs against.
    let mut steps = Vec::new();
    integrator.start(&gdata);
    while let Some(cmd) = integrator.next_command(&gdata) {
        steps.push((cmd.clone(), backend.table().clone()));
        backend.execute(cmd, &mut gdata).unwrap();
    }

    c.bench_function("resolve_stress_iteration", |b| {
        b.iter(|| {
            for (cmd, table) in &steps {
                black_box(resolve_command(table, cmd).unwrap());
            }
        });
    });
}

/// Benchmark: Execute one stress-profile iteration on the simulated
/// backend, resolution and state bookkeeping included.
fn bench_execute_stress_iteration(c: &mut Criterion) {
    let setup = stress_profile(1);

    c.bench_function("execute_stress_iteration", |b| {
        b.iter(|| {
            let mut integrator =
                Integrator::instance(IntegratorKind::PredictorCorrector, &setup).unwrap();
            let mut gdata = GlobalData::new(setup.clone());
            let mut backend =
                SimulatedBackend::with_initial_state(STEP_N, &particle_buffers(&setup))
                    .converge_after(2);
            integrator.start(&gdata);
            while let Some(cmd) = integrator.next_command(&gdata) {
                backend.execute(cmd, &mut gdata).unwrap();
            }
            black_box(backend.executed().len());
        });
    });
}

criterion_group!(
    benches,
    bench_resolve_stress_iteration,
    bench_execute_stress_iteration
);
criterion_main!(benches);
