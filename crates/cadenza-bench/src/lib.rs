//! Benchmark profiles and utilities for the Cadenza integrator framework.
//!
//! Provides pre-built [`SimulationSetup`] profiles for benchmarking:
//!
//! - [`reference_profile`]: single device, Lennard-Jones boundaries, no optional phases
//! - [`stress_profile`]: every optional phase enabled, four devices
//! - [`drain`]: pull every command of a run through a no-op driver

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use cadenza_core::{
    BoundaryModel, CommandKind, EffPresConfig, FilterFreq, FilterKind, GlobalData, SimFlags,
    SimulationSetup,
};
use cadenza_integrator::Integrator;

/// Build a reference benchmark profile: the plain predictor-corrector
/// graph, neighbor list rebuilt every 10 iterations.
pub fn reference_profile(iterations: u64) -> SimulationSetup {
    SimulationSetup {
        max_iterations: Some(iterations),
        ..Default::default()
    }
}

/// Build a stress benchmark profile: semi-analytical boundaries, the
/// effective-pressure solver, both filters, and halo imports on four
/// devices.
pub fn stress_profile(iterations: u64) -> SimulationSetup {
    SimulationSetup {
        boundary_model: BoundaryModel::SemiAnalytical,
        flags: SimFlags::DEFAULT
            | SimFlags::XSPH
            | SimFlags::MOVING_BODIES
            | SimFlags::INLET_OUTLET
            | SimFlags::DENSITY_SUM
            | SimFlags::INTERNAL_ENERGY,
        effpres: Some(EffPresConfig { max_iterations: 8 }),
        neib_freq: 5,
        filters: vec![
            FilterFreq::new(FilterKind::Shepard, 1),
            FilterFreq::new(FilterKind::Mls, 3),
        ],
        devices: vec![0, 1, 2, 3],
        max_iterations: Some(iterations),
    }
}

/// Run `integrator` to completion with a driver that executes nothing.
///
/// The driver only maintains the bookkeeping the phase graph depends on:
/// the iteration counter after each step-closing rename, and solver
/// convergence after `converge_after` stop-criterion checks. Returns the
/// number of commands handed out.
pub fn drain(integrator: &mut Integrator, gdata: &mut GlobalData, converge_after: u32) -> usize {
    let mut commands = 0;
    let mut checks = 0;
    integrator.start(gdata);
    while let Some(cmd) = integrator.next_command(gdata) {
        commands += 1;
        match cmd.kind() {
            CommandKind::RenameState if cmd.step().last => gdata.iterations += 1,
            CommandKind::JacobiResetStopCriterion => {
                checks = 0;
                gdata.effpres_converged = false;
            }
            CommandKind::JacobiStopCriterion => {
                checks += 1;
                gdata.effpres_converged = checks >= converge_after;
            }
            _ => {}
        }
    }
    commands
}
