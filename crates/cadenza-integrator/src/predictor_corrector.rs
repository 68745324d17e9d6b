//! The predictor-corrector integrator.
//!
//! Each time step integrates twice: a predictor over half the time-step
//! from [`STEP_N`] into [`STEP_N_STAR`], then a corrector over the full
//! time-step that evaluates forces on the predicted state and integrates
//! [`STEP_N`] into [`STEP_N_PLUS_1`], which finally becomes the new
//! [`STEP_N`]. Optional sub-loops around the steps run the iterative
//! effective-pressure solver and the enabled density filters.

use std::fmt;

use cadenza_core::{
    BoundaryModel, BufferKey, CommandFlags, CommandKind, FilterFreq, FilterKind, GlobalData, SimFlags,
    SimulationSetup, StepInfo,
};
use tracing::debug;

use crate::common::{
    boundary_conditions, build_neibs_phase, current_state_for_step, dt_for_step,
    force_inputs, force_outputs, integrated_buffers, next_state_for_step, particle_buffers,
    shared_buffers, update_external, FILTERED, STEP_N, STEP_N_PLUS_1, STEP_N_STAR, UNFILTERED,
};
use crate::integrator::{Integrator, Scheme};
use crate::phase::{Phase, PhaseBuilder};

/// The phases of the predictor-corrector graph, in graph order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseCode {
    /// Right after the particles are uploaded.
    PostUpload,
    /// Neighbor list construction.
    NeibsList,
    /// Before the main loop.
    Initialization,
    /// Effective-pressure solver setup after initialization.
    InitEffPresPrep,
    /// Effective-pressure solver iteration after initialization.
    InitEffPres,
    /// Start of a time step.
    BeginTimeStep,
    /// Predictor step.
    Predictor,
    /// End of the predictor step.
    PredictorEnd,
    /// Effective-pressure solver setup after the predictor.
    PostPredEffPresPrep,
    /// Effective-pressure solver iteration after the predictor.
    PostPredEffPres,
    /// Corrector step.
    Corrector,
    /// End of the corrector step (state rotation).
    CorrectorEnd,
    /// Effective-pressure solver setup after the corrector.
    PostCorrEffPresPrep,
    /// Effective-pressure solver iteration after the corrector.
    PostCorrEffPres,
    /// Preparation for the filters.
    FilterIntro,
    /// One filter.
    FilterCall,
    /// Wrap-up after the filters.
    FilterOutro,
    /// Terminal phase.
    End,
}

impl PhaseCode {
    /// Every phase code, in graph order.
    pub const ALL: [PhaseCode; 18] = [
        Self::PostUpload,
        Self::NeibsList,
        Self::Initialization,
        Self::InitEffPresPrep,
        Self::InitEffPres,
        Self::BeginTimeStep,
        Self::Predictor,
        Self::PredictorEnd,
        Self::PostPredEffPresPrep,
        Self::PostPredEffPres,
        Self::Corrector,
        Self::CorrectorEnd,
        Self::PostCorrEffPresPrep,
        Self::PostCorrEffPres,
        Self::FilterIntro,
        Self::FilterCall,
        Self::FilterOutro,
        Self::End,
    ];

    /// Position of the phase in the graph.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Phase code at a graph position.
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
            Self::PostUpload => "post upload",
            Self::NeibsList => "neibs list",
            Self::Initialization => "initialization",
            Self::InitEffPresPrep => "init effpres prep",
            Self::InitEffPres => "init effpres",
            Self::BeginTimeStep => "begin time step",
            Self::Predictor => "predictor",
            Self::PredictorEnd => "predictor end",
            Self::PostPredEffPresPrep => "postpred effpres prep",
            Self::PostPredEffPres => "postpred effpres",
            Self::Corrector => "corrector",
            Self::CorrectorEnd => "corrector end",
            Self::PostCorrEffPresPrep => "postcorr effpres prep",
            Self::PostCorrEffPres => "postcorr effpres",
            Self::FilterIntro => "filter intro",
            Self::FilterCall => "filter call",
            Self::FilterOutro => "filter outro",
            Self::End => "end",
        }
    }
}

impl fmt::Display for PhaseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Scheme ─────────────────────────────────────────────────────────

/// Transition state of the predictor-corrector graph.
#[derive(Clone, Debug)]
pub struct PredictorCorrector {
    entered_main_cycle: bool,
    done_requested: bool,
    effpres: bool,
    effpres_cap: u32,
    filters: Vec<FilterFreq>,
    current_filter: Option<usize>,
}

impl PredictorCorrector {
    /// Transition state for a run with the given setup.
    pub fn new(setup: &SimulationSetup) -> Self {
        Self {
            entered_main_cycle: false,
            done_requested: false,
            effpres: setup.effpres_enabled(),
            effpres_cap: setup.effpres_max_iterations(),
            filters: setup.filters.clone(),
            current_filter: None,
        }
    }

    /// Whether the first time step has started.
    pub fn entered_main_cycle(&self) -> bool {
        self.entered_main_cycle
    }

    fn enter_main_cycle(&mut self) -> PhaseCode {
        self.entered_main_cycle = true;
        PhaseCode::BeginTimeStep
    }

    fn keep_solving(&self, phase: &Phase, gdata: &GlobalData) -> bool {
        if gdata.effpres_converged {
            return false;
        }
        let passes = phase.cursor().passes() + 1;
        if passes >= self.effpres_cap {
            debug!(
                phase = phase.name(),
                passes, "effective pressure solver stopped at the iteration cap"
            );
            return false;
        }
        true
    }

    fn next_due_filter(&self, from: usize, gdata: &GlobalData) -> Option<usize> {
        (from..self.filters.len()).find(|&i| self.filters[i].is_due(gdata.iterations))
    }

    fn after_step(&mut self, gdata: &GlobalData) -> PhaseCode {
        self.current_filter = self.next_due_filter(0, gdata);
        match self.current_filter {
            Some(_) => PhaseCode::FilterIntro,
            None => self.end_of_step(gdata),
        }
    }

    fn end_of_step(&self, gdata: &GlobalData) -> PhaseCode {
        if self.done_requested || gdata.reached_final_iteration() {
            PhaseCode::End
        } else {
            PhaseCode::NeibsList
        }
    }
}

impl Scheme for PredictorCorrector {
    fn name(&self) -> &str {
        "predictor-corrector"
    }

    fn phase_after(
        &mut self,
        current: usize,
        phases: &[Phase],
        gdata: &GlobalData,
    ) -> Option<usize> {
        use PhaseCode::*;

        let from = PhaseCode::from_index(current);
        let phase = &phases[current];
        let next = match from {
            PostUpload => NeibsList,
            NeibsList if self.entered_main_cycle => BeginTimeStep,
            NeibsList => Initialization,
            Initialization if self.effpres => InitEffPresPrep,
            Initialization => self.enter_main_cycle(),
            InitEffPresPrep => InitEffPres,
            InitEffPres if self.keep_solving(phase, gdata) => InitEffPres,
            InitEffPres => self.enter_main_cycle(),
            BeginTimeStep => Predictor,
            Predictor => PredictorEnd,
            PredictorEnd if self.effpres => PostPredEffPresPrep,
            PredictorEnd => Corrector,
            PostPredEffPresPrep => PostPredEffPres,
            PostPredEffPres if self.keep_solving(phase, gdata) => PostPredEffPres,
            PostPredEffPres => Corrector,
            Corrector => CorrectorEnd,
            CorrectorEnd if self.effpres => PostCorrEffPresPrep,
            CorrectorEnd => self.after_step(gdata),
            PostCorrEffPresPrep => PostCorrEffPres,
            PostCorrEffPres if self.keep_solving(phase, gdata) => PostCorrEffPres,
            PostCorrEffPres => self.after_step(gdata),
            FilterIntro => FilterCall,
            FilterCall => {
                let from_filter = self.current_filter.map_or(0, |i| i + 1);
                self.current_filter = self.next_due_filter(from_filter, gdata);
                match self.current_filter {
                    Some(_) => FilterCall,
                    None => FilterOutro,
                }
            }
            FilterOutro => self.end_of_step(gdata),
            End => return None,
        };
        debug!(from = %from, to = %next, iteration = gdata.iterations, "phase transition");
        Some(next.index())
    }

    fn we_are_done(&mut self) {
        self.done_requested = true;
    }

    fn current_filter(&self) -> Option<FilterKind> {
        self.current_filter.map(|i| self.filters[i].kind)
    }
}

// ── Graph construction ─────────────────────────────────────────────

/// Build the predictor-corrector integrator for `setup`.
///
/// The setup is assumed valid; see [`Integrator::instance`].
pub fn build(setup: &SimulationSetup) -> Integrator {
    let phases = PhaseCode::ALL
        .iter()
        .map(|&code| build_phase(code, setup))
        .collect();
    Integrator::new(phases, Box::new(PredictorCorrector::new(setup)))
}

fn build_phase(code: PhaseCode, setup: &SimulationSetup) -> Phase {
    let initialization = StepInfo::initialization();
    let predictor = StepInfo::new(1);
    let corrector = StepInfo::new(2).into_last();
    match code {
        PhaseCode::PostUpload => {
            let mut phase = PhaseBuilder::new(code.name());
            update_external(&mut phase, setup, STEP_N, particle_buffers(setup));
            phase.finish()
        }
        PhaseCode::NeibsList => build_neibs_phase(setup, &particle_buffers(setup)),
        PhaseCode::Initialization => initialization_phase(setup),
        PhaseCode::InitEffPresPrep => effpres_prep_phase(code, setup, initialization, STEP_N),
        PhaseCode::InitEffPres => effpres_phase(code, setup, initialization, STEP_N),
        PhaseCode::BeginTimeStep => {
            let mut phase = PhaseBuilder::new(code.name());
            open_next_state(&mut phase, setup, STEP_N_STAR);
            phase.finish()
        }
        PhaseCode::Predictor => step_phase(code, setup, predictor),
        PhaseCode::PredictorEnd => {
            let mut phase = PhaseBuilder::new(code.name());
            update_external(&mut phase, setup, STEP_N_STAR, integrated_buffers(setup));
            phase.finish()
        }
        PhaseCode::PostPredEffPresPrep => {
            effpres_prep_phase(code, setup, predictor, STEP_N_STAR)
        }
        PhaseCode::PostPredEffPres => effpres_phase(code, setup, predictor, STEP_N_STAR),
        PhaseCode::Corrector => step_phase(code, setup, corrector),
        PhaseCode::CorrectorEnd => corrector_end_phase(setup, corrector),
        // The state rotation at the end of the corrector already made
        // step n+1 the new step n.
        PhaseCode::PostCorrEffPresPrep => effpres_prep_phase(code, setup, corrector, STEP_N),
        PhaseCode::PostCorrEffPres => effpres_phase(code, setup, corrector, STEP_N),
        PhaseCode::FilterIntro => filter_intro_phase(setup),
        PhaseCode::FilterCall => filter_call_phase(setup),
        PhaseCode::FilterOutro => {
            let mut phase = PhaseBuilder::new(code.name());
            phase.add_command(CommandKind::ReleaseState).set_src(FILTERED);
            phase
                .add_command(CommandKind::RenameState)
                .set_src(UNFILTERED)
                .set_dst(STEP_N);
            phase.finish()
        }
        PhaseCode::End => PhaseBuilder::new(code.name()).finish(),
    }
}

/// Create `state` and share into it the buffers the integration does
/// not change.
fn open_next_state(phase: &mut PhaseBuilder, setup: &SimulationSetup, state: &str) {
    phase.add_command(CommandKind::InitState).set_dst(state);
    phase
        .add_command(CommandKind::ShareBuffers)
        .set_src(STEP_N)
        .set_dst(state)
        .reading(STEP_N, shared_buffers(setup));
}

fn initialization_phase(setup: &SimulationSetup) -> Phase {
    let step = StepInfo::initialization();
    let flags = step.integration_flag();
    let mut phase = PhaseBuilder::new(PhaseCode::Initialization.name());

    if setup.flags.contains(SimFlags::INLET_OUTLET) {
        phase
            .add_command(CommandKind::InitIoMass)
            .set_step(step)
            .set_src(STEP_N)
            .set_flags(flags | CommandFlags::VERTEX)
            .reading(STEP_N, BufferKey::INFO | BufferKey::NEIBSLIST)
            .updating(STEP_N, BufferKey::POS);
    }
    if setup.boundary_model == BoundaryModel::SemiAnalytical && setup.flags.using_dynamic_gamma()
    {
        phase
            .add_command(CommandKind::InitGamma)
            .set_step(step)
            .set_src(STEP_N)
            .set_flags(flags)
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
    boundary_conditions(&mut phase, setup, step, STEP_N, CommandFlags::empty());
    phase.finish()
}

/// The predictor (step 1) or corrector (step 2) sequence.
fn step_phase(code: PhaseCode, setup: &SimulationSetup, step: StepInfo) -> Phase {
    let current = current_state_for_step(step.number);
    let next = next_state_for_step(step.number);
    let dt = dt_for_step(step.number);
    let flags = step.integration_flag();
    let mut phase = PhaseBuilder::new(code.name());
    phase.reserve(12);

    if step.last {
        open_next_state(&mut phase, setup, next);
    }

    let outputs = force_outputs(setup);
    phase
        .add_command(CommandKind::Forces)
        .set_step(step)
        .set_src(current)
        .set_dt(dt)
        .set_flags(flags)
        .reading(current, force_inputs(setup))
        .writing(current, outputs.clone());
    update_external(&mut phase, setup, current, outputs);

    if setup.flags.contains(SimFlags::MOVING_BODIES) {
        phase
            .add_command(CommandKind::ReduceBodiesForces)
            .set_step(step)
            .set_src(current)
            .reading(current, BufferKey::FORCES | BufferKey::INFO)
            .writing(current, BufferKey::RB_FORCES | BufferKey::RB_TORQUES);
        phase
            .add_command(CommandKind::MoveBodies)
            .set_step(step)
            .set_dt(dt);
    }

    let mut derivatives = BufferKey::POS | BufferKey::VEL | BufferKey::INFO | BufferKey::FORCES;
    if setup.flags.contains(SimFlags::XSPH) {
        derivatives.insert(BufferKey::XSPH);
    }
    if setup.flags.contains(SimFlags::INTERNAL_ENERGY) {
        derivatives.insert(BufferKey::INTERNAL_ENERGY_UPD);
    }
    phase
        .add_command(CommandKind::Euler)
        .set_step(step)
        .set_src(current)
        .set_dst(next)
        .set_dt(dt)
        .set_flags(flags | CommandFlags::FLUID)
        .reading(STEP_N, integrated_buffers(setup))
        .reading(current, derivatives)
        .writing(next, integrated_buffers(setup));

    let semi_analytical = setup.boundary_model == BoundaryModel::SemiAnalytical;
    if semi_analytical && setup.flags.using_dynamic_gamma() {
        phase
            .add_command(CommandKind::IntegrateGamma)
            .set_step(step)
            .set_src(current)
            .set_dst(next)
            .set_dt(dt)
            .set_flags(flags)
            .reading(STEP_N, BufferKey::POS | BufferKey::GRADGAMMA)
            .reading(
                current,
                BufferKey::POS
                    | BufferKey::VEL
                    | BufferKey::INFO
                    | BufferKey::NEIBSLIST
                    | BufferKey::BOUNDELEMENTS
                    | BufferKey::VERTICES,
            )
            .reading(next, BufferKey::POS)
            .writing(next, BufferKey::GRADGAMMA);
    }

    if setup.flags.contains(SimFlags::DENSITY_SUM) {
        phase
            .add_command(CommandKind::DensitySum)
            .set_step(step)
            .set_src(current)
            .set_dst(next)
            .set_dt(dt)
            .set_flags(flags | CommandFlags::FLUID)
            .reading(current, BufferKey::POS | BufferKey::INFO | BufferKey::NEIBSLIST)
            .reading(next, BufferKey::POS)
            .updating(next, BufferKey::VEL);
    }

    boundary_conditions(&mut phase, setup, step, next, CommandFlags::empty());
    phase.finish()
}

fn corrector_end_phase(setup: &SimulationSetup, step: StepInfo) -> Phase {
    let mut phase = PhaseBuilder::new(PhaseCode::CorrectorEnd.name());
    update_external(&mut phase, setup, STEP_N_PLUS_1, integrated_buffers(setup));
    phase.add_command(CommandKind::ReleaseState).set_src(STEP_N_STAR);
    phase.add_command(CommandKind::ReleaseState).set_src(STEP_N);
    phase
        .add_command(CommandKind::RenameState)
        .set_step(step)
        .set_src(STEP_N_PLUS_1)
        .set_dst(STEP_N);
    phase.finish()
}

/// Reset the convergence flag and impose the boundary conditions of the
/// effective pressure.
fn effpres_prep_phase(
    code: PhaseCode,
    setup: &SimulationSetup,
    step: StepInfo,
    state: &str,
) -> Phase {
    let flags = step.integration_flag();
    let support = BufferKey::POS | BufferKey::INFO | BufferKey::NEIBSLIST;
    let mut phase = PhaseBuilder::new(code.name());
    phase
        .add_command(CommandKind::JacobiResetStopCriterion)
        .set_step(step);
    phase
        .add_command(CommandKind::JacobiFsBoundaryConditions)
        .set_step(step)
        .set_src(state)
        .set_flags(flags)
        .reading(state, support.clone())
        .writing(state, BufferKey::EFFPRES);
    phase
        .add_command(CommandKind::JacobiWallBoundaryConditions)
        .set_step(step)
        .set_src(state)
        .set_flags(flags)
        .reading(state, support)
        .updating(state, BufferKey::EFFPRES);
    update_external(&mut phase, setup, state, BufferKey::EFFPRES);
    phase.finish()
}

/// One Jacobi iteration of the effective-pressure solver. The phase is
/// done as soon as the solver has converged.
fn effpres_phase(code: PhaseCode, setup: &SimulationSetup, step: StepInfo, state: &str) -> Phase {
    let flags = step.integration_flag();
    let support = BufferKey::POS | BufferKey::INFO | BufferKey::NEIBSLIST;
    let mut phase = PhaseBuilder::new(code.name());
    phase.reserve(6);
    phase
        .add_command(CommandKind::JacobiBuildVectors)
        .set_step(step)
        .set_src(state)
        .set_flags(flags)
        .reading(state, support.clone() | BufferKey::VEL | BufferKey::EFFPRES)
        .writing(state, BufferKey::JACOBI);
    phase
        .add_command(CommandKind::JacobiUpdateEffPres)
        .set_step(step)
        .set_src(state)
        .set_flags(flags)
        .reading(state, BufferKey::INFO | BufferKey::JACOBI)
        .updating(state, BufferKey::EFFPRES);
    update_external(&mut phase, setup, state, BufferKey::EFFPRES);
    phase
        .add_command(CommandKind::JacobiWallBoundaryConditions)
        .set_step(step)
        .set_src(state)
        .set_flags(flags)
        .reading(state, support)
        .updating(state, BufferKey::EFFPRES);
    phase
        .add_command(CommandKind::JacobiStopCriterion)
        .set_step(step)
        .set_src(state)
        .reading(state, BufferKey::EFFPRES | BufferKey::JACOBI);
    phase.is_done_if(|phase, gdata| phase.finished_commands() || gdata.effpres_converged);
    phase.finish()
}

fn filter_intro_phase(setup: &SimulationSetup) -> Phase {
    let mut phase = PhaseBuilder::new(PhaseCode::FilterIntro.name());
    phase
        .add_command(CommandKind::RenameState)
        .set_src(STEP_N)
        .set_dst(UNFILTERED);
    phase.add_command(CommandKind::InitState).set_dst(FILTERED);
    // Everything but the filtered velocity (which carries the density).
    let unchanged = particle_buffers(setup)
        .union(&shared_buffers(setup))
        .difference(&BufferKey::VEL.into());
    phase
        .add_command(CommandKind::ShareBuffers)
        .set_src(UNFILTERED)
        .set_dst(FILTERED)
        .reading(UNFILTERED, unchanged);
    phase.finish()
}

fn filter_call_phase(setup: &SimulationSetup) -> Phase {
    let mut phase = PhaseBuilder::new(PhaseCode::FilterCall.name());
    phase
        .add_command(CommandKind::Filter)
        .set_src(UNFILTERED)
        .set_dst(FILTERED)
        .set_flags(CommandFlags::FLUID)
        .reading(
            UNFILTERED,
            BufferKey::POS | BufferKey::VEL | BufferKey::INFO | BufferKey::NEIBSLIST,
        )
        .writing(FILTERED, BufferKey::VEL);
    update_external(&mut phase, setup, FILTERED, BufferKey::VEL);
    // The next filter reads the output of this one.
    phase
        .add_command(CommandKind::SwapStateBuffers)
        .set_src(UNFILTERED)
        .set_dst(FILTERED)
        .updating(UNFILTERED, BufferKey::VEL)
        .updating(FILTERED, BufferKey::VEL);
    phase.finish()
}
