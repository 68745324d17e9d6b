//! Drives an integrator against the simulated backend.

#![allow(dead_code)]

use cadenza_core::{CommandKind, FilterKind, GlobalData, SimulationSetup};
use cadenza_integrator::common::{particle_buffers, STEP_N};
use cadenza_integrator::{Integrator, IntegratorKind};
use cadenza_test_utils::SimulatedBackend;

/// Hard cap on the commands a single run may hand out.
const MAX_COMMANDS: usize = 100_000;

/// What a finished run left behind.
pub struct Run {
    pub integrator: Integrator,
    pub backend: SimulatedBackend,
    pub gdata: GlobalData,
    /// Phase of every executed command.
    pub phases: Vec<String>,
    /// The filter reported for every `FILTER` command.
    pub filters: Vec<Option<FilterKind>>,
}

impl Run {
    /// Phase names with consecutive repeats collapsed.
    pub fn phase_sequence(&self) -> Vec<&str> {
        let mut seq: Vec<&str> = self.phases.iter().map(String::as_str).collect();
        seq.dedup();
        seq
    }

    pub fn count(&self, kind: CommandKind) -> usize {
        self.backend.count(kind)
    }
}

/// The backend a run starts from: one state holding the uploaded
/// particle data.
pub fn uploaded(setup: &SimulationSetup) -> SimulatedBackend {
    SimulatedBackend::with_initial_state(STEP_N, &particle_buffers(setup))
}

/// Run `kind` on `setup`, requesting the end of the run once `done_after`
/// iterations completed. Every command must resolve.
pub fn run(
    kind: IntegratorKind,
    setup: SimulationSetup,
    backend: SimulatedBackend,
    done_after: Option<u64>,
) -> Run {
    let mut integrator = Integrator::instance(kind, &setup).unwrap();
    let mut backend = backend;
    let mut gdata = GlobalData::new(setup);
    let mut phases = Vec::new();
    let mut filters = Vec::new();
    let mut done = false;

    integrator.start(&gdata);
    for _ in 0..MAX_COMMANDS {
        if !done && done_after.is_some_and(|n| gdata.iterations >= n) {
            integrator.we_are_done();
            done = true;
        }
        let Some(cmd) = integrator.next_command(&gdata) else {
            assert!(integrator.is_finished());
            return Run {
                integrator,
                backend,
                gdata,
                phases,
                filters,
            };
        };
        let label = cmd.to_string();
        let kind = cmd.kind();
        if let Err(e) = backend.execute(cmd, &mut gdata) {
            panic!(
                "'{label}' failed in phase '{}' at iteration {}: {e}",
                integrator.current_phase().name(),
                gdata.iterations
            );
        }
        phases.push(integrator.current_phase().name().to_string());
        if kind == CommandKind::Filter {
            filters.push(integrator.current_filter());
        }
    }
    panic!("run did not finish within {MAX_COMMANDS} commands");
}

pub fn run_predictor_corrector(setup: SimulationSetup, iterations: u64) -> Run {
    let backend = uploaded(&setup);
    run(
        IntegratorKind::PredictorCorrector,
        setup,
        backend,
        Some(iterations),
    )
}
