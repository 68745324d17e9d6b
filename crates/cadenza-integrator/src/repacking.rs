//! The repacking integrator.
//!
//! Relaxes the initial particle distribution before the actual run: a
//! single integration step per iteration, with forces evaluated on
//! [`STEP_N`] and the result written to [`STEP_N_PLUS_1`], which then
//! replaces [`STEP_N`]. Runs until [`Integrator::we_are_done`] is called.

use cadenza_core::{
    BoundaryModel, BufferKey, CommandFlags, CommandKind, GlobalData, SimulationSetup, StepInfo,
};
use tracing::debug;

use crate::common::{
    boundary_conditions, build_neibs_phase, dt_for_step, force_inputs, force_outputs,
    integrated_buffers, particle_buffers, shared_buffers, update_external, STEP_N,
    STEP_N_PLUS_1,
};
use crate::integrator::{Integrator, Scheme};
use crate::phase::{Phase, PhaseBuilder};

/// The phases of the repacking graph, in graph order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RepackingPhase {
    /// Neighbor list construction.
    NeibsList,
    /// Boundary initialization before the first step.
    Init,
    /// One relaxation step.
    Step,
    /// Restores the particle velocities once relaxation is over.
    End,
    /// Terminal phase.
    Done,
}

impl RepackingPhase {
    /// Every phase, in graph order.
    pub const ALL: [RepackingPhase; 5] =
        [Self::NeibsList, Self::Init, Self::Step, Self::End, Self::Done];

    /// Position of the phase in the graph.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Phase at a graph position.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index]
    }

    /// Printable name; also the name of the built phase.
    pub const fn name(self) -> &'static str {
        match self {
            Self::NeibsList => "neibs list",
            Self::Init => "repacking init",
            Self::Step => "repacking step",
            Self::End => "repacking end",
            Self::Done => "end",
        }
    }
}

/// Transition state of the repacking graph.
#[derive(Clone, Debug, Default)]
pub struct Repacking {
    initialized: bool,
    done_requested: bool,
}

impl Scheme for Repacking {
    fn name(&self) -> &str {
        "repacking"
    }

    fn phase_after(&mut self, current: usize, _: &[Phase], gdata: &GlobalData) -> Option<usize> {
        let from = RepackingPhase::from_index(current);
        let next = match from {
            RepackingPhase::NeibsList if self.initialized => RepackingPhase::Step,
            RepackingPhase::NeibsList => RepackingPhase::Init,
            RepackingPhase::Init => {
                self.initialized = true;
                RepackingPhase::Step
            }
            RepackingPhase::Step if self.done_requested => RepackingPhase::End,
            RepackingPhase::Step => RepackingPhase::NeibsList,
            RepackingPhase::End => RepackingPhase::Done,
            RepackingPhase::Done => return None,
        };
        debug!(
            from = from.name(),
            to = next.name(),
            iteration = gdata.iterations,
            "repacking transition"
        );
        Some(next.index())
    }

    fn we_are_done(&mut self) {
        self.done_requested = true;
    }
}

/// Build the repacking integrator for `setup`.
pub fn build(setup: &SimulationSetup) -> Integrator {
    let phases = vec![
        build_neibs_phase(setup, &particle_buffers(setup)),
        init_phase(setup),
        step_phase(setup),
        end_phase(),
        PhaseBuilder::new(RepackingPhase::Done.name()).finish(),
    ];
    Integrator::new(phases, Box::new(Repacking::default()))
}

fn dynamic_gamma(setup: &SimulationSetup) -> bool {
    setup.boundary_model == BoundaryModel::SemiAnalytical && setup.flags.using_dynamic_gamma()
}

fn init_phase(setup: &SimulationSetup) -> Phase {
    let step = StepInfo::initialization();
    let mut phase = PhaseBuilder::new(RepackingPhase::Init.name());
    if dynamic_gamma(setup) {
        phase
            .add_command(CommandKind::InitGamma)
            .set_step(step)
            .set_src(STEP_N)
            .set_flags(step.integration_flag() | CommandFlags::REPACKING)
            .reading(
                STEP_N,
                BufferKey::POS
                    | BufferKey::INFO
                    | BufferKey::NEIBSLIST
                    | BufferKey::BOUNDELEMENTS
                    | BufferKey::VERTICES,
            )
            .writing(STEP_N, BufferKey::GRADGAMMA);
    }
    boundary_conditions(&mut phase, setup, step, STEP_N, CommandFlags::REPACKING);
    phase.finish()
}

fn step_phase(setup: &SimulationSetup) -> Phase {
    let step = StepInfo::new(1).into_last();
    let dt = dt_for_step(2);
    let flags = step.integration_flag() | CommandFlags::REPACKING;
    let mut phase = PhaseBuilder::new(RepackingPhase::Step.name());
    phase.reserve(12);

    phase.add_command(CommandKind::InitState).set_dst(STEP_N_PLUS_1);
    let mut shared = shared_buffers(setup);
    if setup.effpres_enabled() {
        shared.insert(BufferKey::EFFPRES);
    }
    phase
        .add_command(CommandKind::ShareBuffers)
        .set_src(STEP_N)
        .set_dst(STEP_N_PLUS_1)
        .reading(STEP_N, shared);

    let outputs = force_outputs(setup);
    phase
        .add_command(CommandKind::Forces)
        .set_step(step)
        .set_src(STEP_N)
        .set_dt(dt)
        .set_flags(flags)
        .reading(STEP_N, force_inputs(setup))
        .writing(STEP_N, outputs.clone());
    update_external(&mut phase, setup, STEP_N, outputs);

    phase
        .add_command(CommandKind::Euler)
        .set_step(step)
        .set_src(STEP_N)
        .set_dst(STEP_N_PLUS_1)
        .set_dt(dt)
        .set_flags(flags | CommandFlags::FLUID)
        .reading(
            STEP_N,
            integrated_buffers(setup) | BufferKey::INFO | BufferKey::FORCES,
        )
        .writing(STEP_N_PLUS_1, integrated_buffers(setup));

    if dynamic_gamma(setup) {
        phase
            .add_command(CommandKind::IntegrateGamma)
            .set_step(step)
            .set_src(STEP_N)
            .set_dst(STEP_N_PLUS_1)
            .set_dt(dt)
            .set_flags(flags)
            .reading(
                STEP_N,
                BufferKey::POS
                    | BufferKey::VEL
                    | BufferKey::INFO
                    | BufferKey::NEIBSLIST
                    | BufferKey::BOUNDELEMENTS
                    | BufferKey::VERTICES
                    | BufferKey::GRADGAMMA,
            )
            .reading(STEP_N_PLUS_1, BufferKey::POS)
            .writing(STEP_N_PLUS_1, BufferKey::GRADGAMMA);
    }

    boundary_conditions(&mut phase, setup, step, STEP_N_PLUS_1, CommandFlags::REPACKING);

    phase.add_command(CommandKind::ReleaseState).set_src(STEP_N);
    phase
        .add_command(CommandKind::RenameState)
        .set_step(step)
        .set_src(STEP_N_PLUS_1)
        .set_dst(STEP_N);
    phase.finish()
}

fn end_phase() -> Phase {
    let mut phase = PhaseBuilder::new(RepackingPhase::End.name());
    phase
        .add_command(CommandKind::RepackingFinalize)
        .set_src(STEP_N)
        .set_flags(CommandFlags::REPACKING | CommandFlags::FLUID)
        .reading(STEP_N, BufferKey::POS | BufferKey::INFO)
        .updating(STEP_N, BufferKey::VEL);
    phase.finish()
}
