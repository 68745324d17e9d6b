//! Building blocks shared by the concrete integrators: state names,
//! per-step conventions, the buffer groups the phase graphs move around,
//! and the command sub-sequences every scheme needs.

use cadenza_command::DtOperator;
use cadenza_core::{
    BoundaryModel, BufferKey, BufferSet, CommandFlags, CommandKind, SimFlags, SimulationSetup,
    StepInfo,
};

use crate::phase::{Phase, PhaseBuilder};

// ── State names ────────────────────────────────────────────────────

/// The state at the beginning of the time step.
pub const STEP_N: &str = "step n";
/// The intermediate (predicted) state.
pub const STEP_N_STAR: &str = "step n*";
/// The state at the end of the time step.
pub const STEP_N_PLUS_1: &str = "step n+1";
/// The particle data before sorting.
pub const UNSORTED: &str = "unsorted";
/// The particle data after sorting.
pub const SORTED: &str = "sorted";
/// The particle data before a filter runs.
pub const UNFILTERED: &str = "unfiltered";
/// The particle data a filter produces.
pub const FILTERED: &str = "filtered";

/// The state a step's kernels read from.
pub fn current_state_for_step(step: i32) -> &'static str {
    match step {
        2 => STEP_N_STAR,
        _ => STEP_N,
    }
}

/// The state a step's kernels write to.
pub fn next_state_for_step(step: i32) -> &'static str {
    match step {
        1 => STEP_N_STAR,
        2 => STEP_N_PLUS_1,
        _ => STEP_N,
    }
}

/// The time-step a step integrates over: zero for initialization, half
/// for the predictor, full for the corrector.
pub fn dt_for_step(step: i32) -> DtOperator {
    match step {
        0 => DtOperator::Zero,
        1 => DtOperator::Half,
        2 => DtOperator::Full,
        _ => DtOperator::Undefined,
    }
}

// ── Buffer groups ──────────────────────────────────────────────────

fn semi_analytical(setup: &SimulationSetup) -> bool {
    setup.boundary_model == BoundaryModel::SemiAnalytical
}

/// Buffers every particle carries from one step to the next. These are
/// the buffers uploaded before the run starts and the ones the sort
/// reorders.
pub fn particle_buffers(setup: &SimulationSetup) -> BufferSet {
    let mut set = BufferKey::POS | BufferKey::VEL | BufferKey::INFO | BufferKey::HASH;
    if semi_analytical(setup) {
        set = set
            | BufferKey::BOUNDELEMENTS
            | BufferKey::GRADGAMMA
            | BufferKey::VERTICES
            | BufferKey::EULERVEL;
    }
    if setup.effpres_enabled() {
        set.insert(BufferKey::EFFPRES);
    }
    if setup.flags.contains(SimFlags::INTERNAL_ENERGY) {
        set.insert(BufferKey::INTERNAL_ENERGY);
    }
    set
}

/// Buffers produced by the neighbor search.
pub fn neighbor_buffers() -> BufferSet {
    BufferKey::PARTINDEX | BufferKey::CELLSTART | BufferKey::CELLEND | BufferKey::NEIBSLIST
}

/// Buffers the integration leaves untouched, shared between the states
/// of one time step.
pub fn shared_buffers(setup: &SimulationSetup) -> BufferSet {
    let mut set = (BufferKey::INFO | BufferKey::HASH) | neighbor_buffers();
    if semi_analytical(setup) {
        set.insert(BufferKey::VERTICES);
    }
    set
}

/// Buffers the Euler update produces in the next state.
pub fn integrated_buffers(setup: &SimulationSetup) -> BufferSet {
    let mut set = BufferKey::POS | BufferKey::VEL;
    if semi_analytical(setup) {
        set = set | BufferKey::EULERVEL | BufferKey::BOUNDELEMENTS;
    }
    if setup.flags.contains(SimFlags::INTERNAL_ENERGY) {
        set.insert(BufferKey::INTERNAL_ENERGY);
    }
    set
}

/// Buffers the force computation reads.
pub fn force_inputs(setup: &SimulationSetup) -> BufferSet {
    let mut set = BufferKey::POS | BufferKey::VEL | BufferKey::INFO;
    set = set | neighbor_buffers().difference(&BufferKey::PARTINDEX.into());
    if semi_analytical(setup) {
        set = set
            | BufferKey::BOUNDELEMENTS
            | BufferKey::GRADGAMMA
            | BufferKey::VERTICES
            | BufferKey::EULERVEL;
    }
    if setup.effpres_enabled() {
        set.insert(BufferKey::EFFPRES);
    }
    set
}

/// Buffers the force computation writes.
pub fn force_outputs(setup: &SimulationSetup) -> BufferSet {
    let mut set = BufferSet::from(BufferKey::FORCES);
    if setup.flags.contains(SimFlags::XSPH) {
        set.insert(BufferKey::XSPH);
    }
    if setup.flags.contains(SimFlags::INTERNAL_ENERGY) {
        set.insert(BufferKey::INTERNAL_ENERGY_UPD);
    }
    if setup.flags.contains(SimFlags::DTADAPT) {
        set = set | BufferKey::CFL | BufferKey::CFL_TEMP;
    }
    set
}

/// Buffers the neighbor search always imports from peer devices.
pub fn neighbor_support_buffers() -> BufferSet {
    BufferKey::POS | BufferKey::HASH | BufferKey::INFO
}

// ── Sub-sequences ──────────────────────────────────────────────────

/// Import the halo copies of `buffers` in `state` from peer devices.
/// Does nothing on a single-device run.
pub fn update_external(
    phase: &mut PhaseBuilder,
    setup: &SimulationSetup,
    state: &str,
    buffers: impl Into<BufferSet>,
) {
    if setup.multi_device() {
        phase
            .add_command(CommandKind::UpdateExternal)
            .set_src(state)
            .updating(state, buffers);
    }
}

/// The boundary-model-specific boundary conditions of one step, applied
/// to `state`.
pub fn boundary_conditions(
    phase: &mut PhaseBuilder,
    setup: &SimulationSetup,
    step: StepInfo,
    state: &str,
    extra_flags: CommandFlags,
) {
    let flags = step.integration_flag() | extra_flags;
    let support = BufferKey::POS | BufferKey::INFO | BufferKey::NEIBSLIST;
    match setup.boundary_model {
        BoundaryModel::Dummy => {
            phase
                .add_command(CommandKind::DummyBoundaryConditions)
                .set_step(step)
                .set_src(state)
                .set_flags(flags | CommandFlags::BOUNDARY)
                .reading(state, support)
                .updating(state, BufferKey::VEL);
            update_external(phase, setup, state, BufferKey::VEL);
        }
        BoundaryModel::SemiAnalytical => {
            let geometry = BufferKey::BOUNDELEMENTS | BufferKey::VERTICES;
            let segment = phase
                .add_command(CommandKind::SaSegmentBoundaryConditions)
                .set_step(step)
                .set_src(state)
                .set_flags(flags | CommandFlags::BOUNDARY)
                .reading(state, support.union(&geometry))
                .updating(state, BufferKey::VEL | BufferKey::EULERVEL);
            if !setup.flags.using_dynamic_gamma() {
                segment.writing(state, BufferKey::GRADGAMMA);
            }
            update_external(
                phase,
                setup,
                state,
                BufferKey::VEL | BufferKey::EULERVEL | BufferKey::GRADGAMMA,
            );

            phase
                .add_command(CommandKind::SaVertexBoundaryConditions)
                .set_step(step)
                .set_src(state)
                .set_flags(flags | CommandFlags::VERTEX)
                .reading(state, (support.union(&geometry)) | BufferKey::GRADGAMMA)
                .updating(state, BufferKey::VEL | BufferKey::EULERVEL);
            update_external(phase, setup, state, BufferKey::VEL | BufferKey::EULERVEL);

            if step.last && setup.flags.contains(SimFlags::INLET_OUTLET) {
                phase
                    .add_command(CommandKind::DisableOutgoing)
                    .set_step(step)
                    .set_src(state)
                    .set_flags(flags | CommandFlags::FLUID)
                    .reading(state, BufferKey::POS)
                    .updating(state, BufferKey::INFO);
            }
        }
        BoundaryModel::LennardJones | BoundaryModel::Monaghan | BoundaryModel::Dynamic => {}
    }
}

/// The standard neighbor-list construction phase.
///
/// Sorts the particles of [`STEP_N`] by cell hash (through [`UNSORTED`]
/// and [`SORTED`]), rebuilds the neighbor list, and on multi-device runs
/// imports `import_buffers` together with the
/// [support buffers](neighbor_support_buffers) from the peers. The phase
/// only runs on iterations that are multiples of the rebuild frequency.
pub fn build_neibs_phase(setup: &SimulationSetup, import_buffers: &BufferSet) -> Phase {
    let mut phase = PhaseBuilder::new("neibs list");
    phase.reserve(9);

    phase
        .add_command(CommandKind::RenameState)
        .set_src(STEP_N)
        .set_dst(UNSORTED);
    phase
        .add_command(CommandKind::CalcHash)
        .set_src(UNSORTED)
        .reading(UNSORTED, BufferKey::POS | BufferKey::INFO)
        .updating(UNSORTED, BufferKey::HASH)
        .writing(UNSORTED, BufferKey::PARTINDEX);
    phase
        .add_command(CommandKind::Sort)
        .set_src(UNSORTED)
        .updating(UNSORTED, BufferKey::HASH | BufferKey::PARTINDEX);
    phase.add_command(CommandKind::InitState).set_dst(SORTED);
    // The sorted state gets a reordered copy of everything read.
    phase
        .add_command(CommandKind::Reorder)
        .set_src(UNSORTED)
        .set_dst(SORTED)
        .reading(UNSORTED, particle_buffers(setup) | BufferKey::PARTINDEX)
        .writing(SORTED, BufferSet::empty())
        .writing(SORTED, BufferKey::CELLSTART | BufferKey::CELLEND);
    phase.add_command(CommandKind::ReleaseState).set_src(UNSORTED);
    phase
        .add_command(CommandKind::RenameState)
        .set_src(SORTED)
        .set_dst(STEP_N);

    let mut neibs_inputs = neighbor_support_buffers() | BufferKey::CELLSTART | BufferKey::CELLEND;
    if semi_analytical(setup) {
        neibs_inputs = neibs_inputs | BufferKey::BOUNDELEMENTS | BufferKey::VERTICES;
    }
    phase
        .add_command(CommandKind::BuildNeibs)
        .set_src(STEP_N)
        .reading(STEP_N, neibs_inputs)
        .writing(STEP_N, BufferKey::NEIBSLIST);

    update_external(
        &mut phase,
        setup,
        STEP_N,
        import_buffers.union(&neighbor_support_buffers()),
    );

    phase.should_run_if(|phase, gdata| !phase.is_empty() && gdata.neibs_due());
    phase.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadenza_core::{GlobalData, ResolveError};
    use cadenza_command::resolve_command;
    use cadenza_test_utils::fixtures::{boundary_setup, multi_device_setup};
    use cadenza_test_utils::MockStateTable;

    #[test]
    fn step_conventions() {
        assert_eq!(current_state_for_step(1), STEP_N);
        assert_eq!(next_state_for_step(1), STEP_N_STAR);
        assert_eq!(current_state_for_step(2), STEP_N_STAR);
        assert_eq!(next_state_for_step(2), STEP_N_PLUS_1);
        assert_eq!(next_state_for_step(0), STEP_N);

        let mut gdata = GlobalData::new(SimulationSetup::default());
        gdata.dt = 0.5;
        assert_eq!(dt_for_step(0).eval(&gdata), 0.0);
        assert_eq!(dt_for_step(1).eval(&gdata), 0.25);
        assert_eq!(dt_for_step(2).eval(&gdata), 0.5);
        assert!(dt_for_step(-1).eval(&gdata).is_nan());
    }

    #[test]
    fn buffer_groups_follow_setup() {
        let lj = SimulationSetup::default();
        assert!(!particle_buffers(&lj).contains(BufferKey::GRADGAMMA));
        let sa = boundary_setup(BoundaryModel::SemiAnalytical);
        assert!(particle_buffers(&sa).contains(BufferKey::GRADGAMMA));
        assert!(shared_buffers(&sa).contains(BufferKey::VERTICES));
        assert!(force_outputs(&lj).contains(BufferKey::CFL));
        assert!(!force_inputs(&lj).contains(BufferKey::PARTINDEX));
    }

    #[test]
    fn neibs_phase_runs_on_rebuild_iterations() {
        let setup = SimulationSetup {
            neib_freq: 5,
            ..Default::default()
        };
        let phase = build_neibs_phase(&setup, &BufferSet::empty());
        let mut gdata = GlobalData::new(setup);
        assert!(phase.should_run(&gdata));
        gdata.iterations = 3;
        assert!(!phase.should_run(&gdata));
        gdata.iterations = 10;
        assert!(phase.should_run(&gdata));
    }

    #[test]
    fn neibs_phase_imports_only_on_multi_device() {
        let single = build_neibs_phase(&SimulationSetup::default(), &BufferKey::VEL.into());
        assert!(single
            .commands()
            .iter()
            .all(|c| c.kind() != CommandKind::UpdateExternal));

        let multi = build_neibs_phase(&multi_device_setup(), &BufferKey::VEL.into());
        let import = multi.commands().last().unwrap();
        assert_eq!(import.kind(), CommandKind::UpdateExternal);
        assert_eq!(
            import.updates()[0].buffers,
            neighbor_support_buffers() | BufferKey::VEL
        );
    }

    #[test]
    fn reorder_reads_the_whole_particle_set() {
        let setup = SimulationSetup::default();
        let phase = build_neibs_phase(&setup, &BufferSet::empty());
        let reorder = phase
            .commands()
            .iter()
            .find(|c| c.kind() == CommandKind::Reorder)
            .unwrap();

        // Unsorted state right after hashing: the particle set plus PARTINDEX.
        let table = MockStateTable::new()
            .with_state(UNSORTED, particle_buffers(&setup).iter())
            .with_state(SORTED, []);
        assert_eq!(
            resolve_command(&table, reorder).unwrap_err(),
            ResolveError::MissingBuffer {
                state: UNSORTED.into(),
                buffer: BufferKey::PARTINDEX
            }
        );

        let table = MockStateTable::new()
            .with_state(
                UNSORTED,
                (particle_buffers(&setup) | BufferKey::PARTINDEX).iter(),
            )
            .with_state(SORTED, []);
        let resolved = resolve_command(&table, reorder).unwrap();
        let pending: BufferSet = resolved
            .writes
            .pending
            .iter()
            .flat_map(|p| p.buffers.iter())
            .collect();
        assert_eq!(
            pending,
            particle_buffers(&setup) | BufferKey::PARTINDEX | BufferKey::CELLSTART | BufferKey::CELLEND
        );
    }
}
