//! Integration test: full predictor-corrector runs on the simulated
//! backend.
//!
//! Every command of every phase is resolved strictly against the state
//! table the previous commands left behind, so a missing share, a
//! misplaced rename, or a buffer read before it is written fails the run.

mod common;

use cadenza_core::{
    BoundaryModel, CommandKind, ConfigError, FilterFreq, FilterKind, SimFlags, SimulationSetup,
};
use cadenza_integrator::common::{particle_buffers, STEP_N};
use cadenza_integrator::{Integrator, IntegratorKind};
use cadenza_test_utils::fixtures::{
    basic_setup, boundary_setup, effpres_setup, filtered_setup, full_setup, multi_device_setup,
};
use common::{run, run_predictor_corrector, uploaded};
use proptest::prelude::*;

// ── Basic runs ───────────────────────────────────────────────────────

#[test]
fn basic_run_completes() {
    let setup = basic_setup();
    let run = run_predictor_corrector(setup.clone(), 5);

    assert!(run.integrator.is_finished());
    assert_eq!(run.gdata.iterations, 5);
    assert!(run.gdata.t > 0.0);
    assert_eq!(run.count(CommandKind::Forces), 10);
    assert_eq!(run.count(CommandKind::Euler), 10);
    // Rebuilt at iterations 0, 2 and 4.
    assert_eq!(run.count(CommandKind::BuildNeibs), 3);
    assert_eq!(run.count(CommandKind::UpdateExternal), 0);

    let table = run.backend.table();
    assert_eq!(table.state_names(), [STEP_N]);
    assert!(particle_buffers(&setup).is_subset(&table.buffers(STEP_N)));
}

#[test]
fn phase_order_of_the_first_steps() {
    let run = run_predictor_corrector(basic_setup(), 2);
    assert_eq!(
        run.phase_sequence(),
        [
            "neibs list",
            "begin time step",
            "predictor",
            "corrector",
            "corrector end",
            // No rebuild at iteration 1.
            "begin time step",
            "predictor",
            "corrector",
            "corrector end",
        ]
    );
}

#[test]
fn final_iteration_ends_the_run() {
    let setup = SimulationSetup {
        max_iterations: Some(3),
        ..basic_setup()
    };
    let backend = uploaded(&setup);
    let run = run(IntegratorKind::PredictorCorrector, setup, backend, None);
    assert!(run.integrator.is_finished());
    assert_eq!(run.gdata.iterations, 3);
}

#[test]
fn single_iteration_cap_runs_one_step() {
    let setup = SimulationSetup {
        max_iterations: Some(1),
        ..basic_setup()
    };
    let backend = uploaded(&setup);
    let run = run(IntegratorKind::PredictorCorrector, setup, backend, None);
    assert!(run.integrator.is_finished());
    assert_eq!(run.gdata.iterations, 1);
}

#[test]
fn zero_iteration_cap_is_rejected() {
    let setup = SimulationSetup {
        max_iterations: Some(0),
        ..basic_setup()
    };
    let err = Integrator::instance(IntegratorKind::PredictorCorrector, &setup).unwrap_err();
    assert_eq!(err, ConfigError::InvalidMaxIterations);
}

#[test]
fn finished_integrator_stays_finished() {
    let mut run = run_predictor_corrector(basic_setup(), 1);
    assert!(run.integrator.next_command(&run.gdata).is_none());
    assert!(run.integrator.is_finished());
}

// ── Boundary models ──────────────────────────────────────────────────

#[test]
fn every_boundary_model_runs() {
    for model in [
        BoundaryModel::LennardJones,
        BoundaryModel::Monaghan,
        BoundaryModel::Dynamic,
        BoundaryModel::Dummy,
        BoundaryModel::SemiAnalytical,
    ] {
        let run = run_predictor_corrector(boundary_setup(model), 3);
        assert_eq!(run.gdata.iterations, 3, "{}", model.name());
    }
}

#[test]
fn dummy_boundaries_run_after_each_integration() {
    let run = run_predictor_corrector(boundary_setup(BoundaryModel::Dummy), 2);
    // Initialization plus predictor and corrector of each step.
    assert_eq!(run.count(CommandKind::DummyBoundaryConditions), 5);
}

#[test]
fn semi_analytical_gamma_variants() {
    let dynamic = run_predictor_corrector(boundary_setup(BoundaryModel::SemiAnalytical), 2);
    assert_eq!(dynamic.count(CommandKind::InitGamma), 1);
    assert_eq!(dynamic.count(CommandKind::IntegrateGamma), 4);
    assert_eq!(dynamic.count(CommandKind::SaVertexBoundaryConditions), 5);

    let quadrature = SimulationSetup {
        flags: SimFlags::DEFAULT | SimFlags::GAMMA_QUADRATURE,
        ..boundary_setup(BoundaryModel::SemiAnalytical)
    };
    let quadrature = run_predictor_corrector(quadrature, 2);
    assert_eq!(quadrature.count(CommandKind::InitGamma), 0);
    assert_eq!(quadrature.count(CommandKind::IntegrateGamma), 0);
    assert_eq!(quadrature.count(CommandKind::SaSegmentBoundaryConditions), 5);
}

#[test]
fn outgoing_particles_disabled_on_the_corrector_only() {
    let setup = SimulationSetup {
        flags: SimFlags::DEFAULT | SimFlags::INLET_OUTLET,
        ..boundary_setup(BoundaryModel::SemiAnalytical)
    };
    let run = run_predictor_corrector(setup, 3);
    assert_eq!(run.count(CommandKind::InitIoMass), 1);
    assert_eq!(run.count(CommandKind::DisableOutgoing), 3);
}

// ── Effective-pressure solver ────────────────────────────────────────

#[test]
fn effpres_solver_stops_on_convergence() {
    let setup = effpres_setup(10);
    let backend = uploaded(&setup).converge_after(2);
    let run = run(IntegratorKind::PredictorCorrector, setup, backend, Some(3));

    // One solve at initialization, two per step, two passes each.
    assert_eq!(run.count(CommandKind::JacobiResetStopCriterion), 7);
    assert_eq!(run.count(CommandKind::JacobiStopCriterion), 14);
    assert!(run.gdata.effpres_converged);
}

#[test]
fn effpres_solver_stops_at_the_cap() {
    let run = run_predictor_corrector(effpres_setup(3), 2);
    assert_eq!(run.count(CommandKind::JacobiStopCriterion), 15);
    assert!(!run.gdata.effpres_converged);
}

#[test]
fn effpres_solver_phase_order() {
    let setup = effpres_setup(5);
    let backend = uploaded(&setup).converge_after(1);
    let run = run(IntegratorKind::PredictorCorrector, setup, backend, Some(1));
    assert_eq!(
        run.phase_sequence(),
        [
            "neibs list",
            "init effpres prep",
            "init effpres",
            "begin time step",
            "predictor",
            "postpred effpres prep",
            "postpred effpres",
            "corrector",
            "corrector end",
            "postcorr effpres prep",
            "postcorr effpres",
        ]
    );
}

// ── Filters ──────────────────────────────────────────────────────────

#[test]
fn filters_run_at_their_frequency() {
    let run = run_predictor_corrector(filtered_setup(), 4);
    assert_eq!(
        run.filters,
        [
            Some(FilterKind::Shepard),
            Some(FilterKind::Shepard),
            Some(FilterKind::Mls),
            Some(FilterKind::Shepard),
            Some(FilterKind::Shepard),
            Some(FilterKind::Mls),
        ]
    );
    assert_eq!(run.count(CommandKind::SwapStateBuffers), 6);
    assert_eq!(run.backend.table().state_names(), [STEP_N]);
    assert_eq!(run.integrator.current_filter(), None);
}

#[test]
fn zero_filter_frequency_is_rejected() {
    let setup = SimulationSetup {
        filters: vec![FilterFreq::new(FilterKind::Shepard, 0)],
        ..basic_setup()
    };
    let err = Integrator::instance(IntegratorKind::PredictorCorrector, &setup).unwrap_err();
    assert_eq!(err, ConfigError::InvalidFilterFrequency { filter: "Shepard" });
}

// ── Feature combinations ─────────────────────────────────────────────

#[test]
fn multi_device_imports_halos() {
    let run = run_predictor_corrector(multi_device_setup(), 2);
    assert!(run.count(CommandKind::UpdateExternal) > 0);
    assert_eq!(run.phase_sequence()[0], "post upload");
}

#[test]
fn moving_bodies_reduce_forces_every_integration() {
    let setup = SimulationSetup {
        flags: SimFlags::DEFAULT | SimFlags::MOVING_BODIES,
        ..basic_setup()
    };
    let run = run_predictor_corrector(setup, 3);
    assert_eq!(run.count(CommandKind::ReduceBodiesForces), 6);
    assert_eq!(run.count(CommandKind::MoveBodies), 6);
}

#[test]
fn full_setup_runs() {
    let setup = full_setup();
    let backend = uploaded(&setup).converge_after(2);
    let run = run(IntegratorKind::PredictorCorrector, setup.clone(), backend, Some(4));
    assert_eq!(run.gdata.iterations, 4);
    assert!(run.count(CommandKind::DensitySum) > 0);
    assert!(run.count(CommandKind::Filter) > 0);
    let table = run.backend.table();
    assert_eq!(table.state_names(), [STEP_N]);
    assert!(particle_buffers(&setup).is_subset(&table.buffers(STEP_N)));
}

// ── Properties ───────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn neighbor_list_rebuilt_every_neib_freq(neib_freq in 1u32..5, iterations in 1u64..7) {
        let setup = SimulationSetup { neib_freq, ..basic_setup() };
        let run = run_predictor_corrector(setup, iterations);
        let expected = (0..iterations).filter(|i| i % u64::from(neib_freq) == 0).count();
        prop_assert_eq!(run.count(CommandKind::BuildNeibs), expected);
        prop_assert_eq!(run.count(CommandKind::Forces) as u64, 2 * iterations);
    }

    #[test]
    fn filter_counts_follow_frequency(frequency in 1u32..4, iterations in 1u64..7) {
        let setup = SimulationSetup {
            filters: vec![FilterFreq::new(FilterKind::Mls, frequency)],
            ..basic_setup()
        };
        let run = run_predictor_corrector(setup, iterations);
        let expected = (1..=iterations).filter(|i| i % u64::from(frequency) == 0).count();
        prop_assert_eq!(run.count(CommandKind::Filter), expected);
    }
}
