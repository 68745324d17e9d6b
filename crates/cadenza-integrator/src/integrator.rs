//! The generic phase engine.
//!
//! An [`Integrator`] owns a phase graph and a [`Scheme`]: the phases say
//! *what* runs, the scheme says *in which order* they are entered. The
//! driver calls [`start`](Integrator::start) once and then
//! [`next_command`](Integrator::next_command) until it returns `None`.
//!
//! Phase transitions are lazy: a phase is only left when the driver asks
//! for a command and the current phase reports it is done. Phases that
//! should not run, or that are already done on entry, are skipped
//! without yielding anything.

use cadenza_command::CommandDescriptor;
use cadenza_core::{ConfigError, FilterKind, GlobalData, SimulationSetup};
use tracing::{debug, info, trace};

use crate::phase::Phase;
use crate::{predictor_corrector, repacking};

/// The transition capability of an integration scheme.
pub trait Scheme: Send {
    /// Scheme name, used in logs.
    fn name(&self) -> &str;

    /// Index of the phase [`Integrator::start`] enters.
    fn initial_phase(&self) -> usize {
        0
    }

    /// The phase to enter after `current` is done (or was skipped).
    ///
    /// `None` ends the run. The default walks the phases in order and
    /// ends after the last one.
    fn phase_after(
        &mut self,
        current: usize,
        phases: &[Phase],
        gdata: &GlobalData,
    ) -> Option<usize> {
        let _ = gdata;
        let next = current + 1;
        (next < phases.len()).then_some(next)
    }

    /// Record that the driver wants the run to end. Schemes decide at
    /// which point of their graph to honor the request.
    fn we_are_done(&mut self) {}

    /// The filter a `FILTER` command currently stands for, if any.
    fn current_filter(&self) -> Option<FilterKind> {
        None
    }
}

/// The scheme that runs every phase once, in order.
#[derive(Clone, Debug, Default)]
pub struct LinearScheme;

impl Scheme for LinearScheme {
    fn name(&self) -> &str {
        "linear"
    }
}

/// The concrete integrators [`Integrator::instance`] can build.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IntegratorKind {
    /// Predictor-corrector time stepping.
    PredictorCorrector,
    /// Particle repacking before the simulation proper.
    Repacking,
}

/// A phase graph together with the scheme that walks it.
pub struct Integrator {
    phases: Vec<Phase>,
    current: usize,
    scheme: Box<dyn Scheme>,
    finished: bool,
}

impl Integrator {
    /// Assemble an integrator.
    ///
    /// # Panics
    ///
    /// Panics if `phases` is empty or the scheme's initial phase is out of
    /// range.
    pub fn new(phases: Vec<Phase>, scheme: Box<dyn Scheme>) -> Self {
        assert!(!phases.is_empty(), "an integrator needs at least one phase");
        let current = scheme.initial_phase();
        assert!(
            current < phases.len(),
            "initial phase {current} out of range ({} phases)",
            phases.len()
        );
        Self {
            phases,
            current,
            scheme,
            finished: false,
        }
    }

    /// Build the integrator of the given kind for a validated setup.
    pub fn instance(kind: IntegratorKind, setup: &SimulationSetup) -> Result<Self, ConfigError> {
        setup.validate()?;
        let integrator = match kind {
            IntegratorKind::PredictorCorrector => predictor_corrector::build(setup),
            IntegratorKind::Repacking => repacking::build(setup),
        };
        debug!(
            integrator = integrator.name(),
            phases = integrator.phase_count(),
            "integrator built"
        );
        Ok(integrator)
    }

    /// The scheme name.
    pub fn name(&self) -> &str {
        self.scheme.name()
    }

    /// Number of phases in the graph.
    pub fn phase_count(&self) -> usize {
        self.phases.len()
    }

    /// All phases, by index.
    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    /// Index of the current phase.
    pub fn current_phase_index(&self) -> usize {
        self.current
    }

    /// The current phase.
    pub fn current_phase(&self) -> &Phase {
        &self.phases[self.current]
    }

    /// Whether the run is complete.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The filter the scheme is currently positioned on.
    pub fn current_filter(&self) -> Option<FilterKind> {
        self.scheme.current_filter()
    }

    /// Enter the scheme's initial phase.
    pub fn start(&mut self, gdata: &GlobalData) {
        let initial = self.scheme.initial_phase();
        info!(integrator = self.scheme.name(), "starting integrator");
        self.finished = false;
        self.enter(initial, false, gdata);
    }

    /// Forward the driver's intent to end the run to the scheme.
    pub fn we_are_done(&mut self) {
        info!(
            integrator = self.scheme.name(),
            phase = self.phases[self.current].name(),
            "termination requested"
        );
        self.scheme.we_are_done();
    }

    /// The next command to execute, or `None` once the run is complete.
    pub fn next_command(&mut self, gdata: &GlobalData) -> Option<&CommandDescriptor> {
        if self.finished {
            return None;
        }
        if !self.can_continue(gdata) && !self.advance(gdata) {
            return None;
        }
        let index = self.phases[self.current].cursor().position();
        self.phases[self.current].next_command();
        let phase = &self.phases[self.current];
        let cmd = &phase.commands()[index];
        trace!(phase = %phase.name(), command = %cmd, "next command");
        Some(cmd)
    }

    /// Enter phase `index`, resetting it.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub(crate) fn enter_phase(&mut self, index: usize, gdata: &GlobalData) {
        assert!(
            index < self.phases.len(),
            "phase {index} out of range ({} phases)",
            self.phases.len()
        );
        self.enter(index, index == self.current, gdata);
    }

    fn enter(&mut self, index: usize, same_phase: bool, gdata: &GlobalData) {
        self.current = index;
        let phase = &mut self.phases[index];
        phase.enter(same_phase, gdata);
        debug!(
            phase = %phase.name(),
            pass = phase.cursor().passes(),
            "entering phase"
        );
    }

    /// Whether the current phase can hand out another command. A phase
    /// that has not handed out anything yet must also be allowed to run.
    fn can_continue(&self, gdata: &GlobalData) -> bool {
        let phase = &self.phases[self.current];
        if phase.cursor().position() == 0 && !phase.should_run(gdata) {
            return false;
        }
        !phase.is_done(gdata)
    }

    /// Move to the next runnable phase. Returns `false` when the run ends.
    fn advance(&mut self, gdata: &GlobalData) -> bool {
        let mut skipped = 0;
        loop {
            let next = self
                .scheme
                .phase_after(self.current, &self.phases, gdata);
            let Some(next) = next else {
                info!(
                    integrator = self.scheme.name(),
                    phase = self.phases[self.current].name(),
                    "run complete"
                );
                self.finished = true;
                return false;
            };
            self.enter_phase(next, gdata);
            if self.can_continue(gdata) {
                return true;
            }
            trace!(phase = %self.phases[next].name(), "skipping phase");
            skipped += 1;
            assert!(
                skipped <= self.phases.len(),
                "no runnable phase reachable from phase '{}'",
                self.phases[next].name()
            );
        }
    }
}

impl std::fmt::Debug for Integrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Integrator")
            .field("name", &self.scheme.name())
            .field("phases", &self.phases)
            .field("current", &self.current)
            .field("finished", &self.finished)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::PhaseBuilder;
    use cadenza_core::{BufferKey, BufferSet, CommandKind};

    fn gdata() -> GlobalData {
        GlobalData::new(SimulationSetup::default())
    }

    fn phase(name: &str, kinds: &[CommandKind]) -> Phase {
        let mut builder = PhaseBuilder::new(name);
        for &kind in kinds {
            builder.add_command(kind);
        }
        builder.finish()
    }

    fn drain(integrator: &mut Integrator, gdata: &GlobalData) -> Vec<CommandKind> {
        let mut kinds = Vec::new();
        while let Some(cmd) = integrator.next_command(gdata) {
            kinds.push(cmd.kind());
        }
        kinds
    }

    #[test]
    fn linear_scheme_visits_every_phase_in_order() {
        let g = gdata();
        let mut integrator = Integrator::new(
            vec![
                phase("a", &[CommandKind::CalcHash, CommandKind::Sort]),
                phase("b", &[CommandKind::Forces]),
            ],
            Box::new(LinearScheme),
        );
        integrator.start(&g);
        assert_eq!(
            drain(&mut integrator, &g),
            [CommandKind::CalcHash, CommandKind::Sort, CommandKind::Forces]
        );
        assert!(integrator.is_finished());
        assert!(integrator.next_command(&g).is_none());
    }

    #[test]
    fn empty_phases_are_skipped() {
        let g = gdata();
        let mut integrator = Integrator::new(
            vec![
                phase("empty start", &[]),
                phase("a", &[CommandKind::Forces]),
                phase("empty middle", &[]),
                phase("b", &[CommandKind::Euler]),
                phase("empty end", &[]),
            ],
            Box::new(LinearScheme),
        );
        integrator.start(&g);
        assert_eq!(
            drain(&mut integrator, &g),
            [CommandKind::Forces, CommandKind::Euler]
        );
    }

    #[test]
    fn disabled_phase_never_yields() {
        let g = gdata();
        let mut disabled = PhaseBuilder::new("disabled");
        disabled.add_command(CommandKind::Filter);
        disabled.should_run_if(|_, _| false);
        let mut integrator = Integrator::new(
            vec![
                disabled.finish(),
                phase("a", &[CommandKind::Forces]),
            ],
            Box::new(LinearScheme),
        );
        integrator.start(&g);
        assert_eq!(drain(&mut integrator, &g), [CommandKind::Forces]);
    }

    #[test]
    fn transition_is_lazy() {
        let g = gdata();
        let mut integrator = Integrator::new(
            vec![
                phase("a", &[CommandKind::Forces]),
                phase("b", &[CommandKind::Euler]),
            ],
            Box::new(LinearScheme),
        );
        integrator.start(&g);
        integrator.next_command(&g);
        // "a" is done but not left until the next request.
        assert_eq!(integrator.current_phase().name(), "a");
        integrator.next_command(&g);
        assert_eq!(integrator.current_phase().name(), "b");
    }

    #[test]
    fn write_then_read_across_phases() {
        let g = gdata();
        let mut a = PhaseBuilder::new("a");
        a.add_command(CommandKind::Forces)
            .writing("S", BufferKey::FORCES);
        let mut b = PhaseBuilder::new("b");
        b.add_command(CommandKind::Euler).reading("S", BufferKey::FORCES);
        let mut integrator = Integrator::new(vec![a.finish(), b.finish()], Box::new(LinearScheme));
        integrator.start(&g);

        let first = integrator.next_command(&g).unwrap();
        assert_eq!(first.writes()[0].state, "S");
        let second = integrator.next_command(&g).unwrap();
        assert_eq!(second.reads()[0].buffers, BufferSet::from(BufferKey::FORCES));
        assert!(integrator.next_command(&g).is_none());
    }

    struct Looping {
        rounds: u32,
    }

    impl Scheme for Looping {
        fn name(&self) -> &str {
            "looping"
        }

        fn phase_after(&mut self, current: usize, _: &[Phase], _: &GlobalData) -> Option<usize> {
            if current == 0 && self.rounds > 0 {
                self.rounds -= 1;
                Some(0)
            } else if current == 0 {
                Some(1)
            } else {
                None
            }
        }
    }

    #[test]
    fn reentry_replays_the_same_sequence() {
        let g = gdata();
        let mut integrator = Integrator::new(
            vec![
                phase("loop", &[CommandKind::JacobiBuildVectors, CommandKind::JacobiUpdateEffPres]),
                phase("after", &[CommandKind::Forces]),
            ],
            Box::new(Looping { rounds: 2 }),
        );
        integrator.start(&g);
        let kinds = drain(&mut integrator, &g);
        assert_eq!(
            kinds,
            [
                CommandKind::JacobiBuildVectors,
                CommandKind::JacobiUpdateEffPres,
                CommandKind::JacobiBuildVectors,
                CommandKind::JacobiUpdateEffPres,
                CommandKind::JacobiBuildVectors,
                CommandKind::JacobiUpdateEffPres,
                CommandKind::Forces,
            ]
        );
        assert_eq!(integrator.phases()[0].cursor().passes(), 2);
    }

    /// Loops on phase 0 until the solver reports convergence.
    struct UntilConverged;

    impl Scheme for UntilConverged {
        fn name(&self) -> &str {
            "until converged"
        }

        fn phase_after(&mut self, current: usize, _: &[Phase], g: &GlobalData) -> Option<usize> {
            match current {
                0 if g.effpres_converged => Some(1),
                0 => Some(0),
                _ => None,
            }
        }
    }

    #[test]
    fn convergence_cuts_a_solver_pass_short() {
        let mut g = gdata();
        let mut solver = PhaseBuilder::new("solver");
        solver.add_command(CommandKind::JacobiBuildVectors);
        solver.add_command(CommandKind::JacobiStopCriterion);
        solver.add_command(CommandKind::JacobiUpdateEffPres);
        solver.is_done_if(|p, g| p.finished_commands() || g.effpres_converged);
        let mut integrator = Integrator::new(
            vec![solver.finish(), phase("after", &[CommandKind::Forces])],
            Box::new(UntilConverged),
        );
        integrator.start(&g);

        let mut kinds = Vec::new();
        let mut stop_criteria = 0;
        while let Some(cmd) = integrator.next_command(&g) {
            kinds.push(cmd.kind());
            if cmd.kind() == CommandKind::JacobiStopCriterion {
                stop_criteria += 1;
                g.effpres_converged = stop_criteria == 2;
            }
        }
        assert_eq!(
            kinds,
            [
                CommandKind::JacobiBuildVectors,
                CommandKind::JacobiStopCriterion,
                CommandKind::JacobiUpdateEffPres,
                CommandKind::JacobiBuildVectors,
                CommandKind::JacobiStopCriterion,
                CommandKind::Forces,
            ]
        );
        assert_eq!(integrator.phases()[0].cursor().passes(), 1);
        assert!(integrator.is_finished());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn entering_missing_phase_panics() {
        let mut integrator = Integrator::new(vec![phase("a", &[])], Box::new(LinearScheme));
        integrator.enter_phase(3, &gdata());
    }

    struct Spinning;

    impl Scheme for Spinning {
        fn name(&self) -> &str {
            "spinning"
        }

        fn phase_after(&mut self, current: usize, phases: &[Phase], _: &GlobalData) -> Option<usize> {
            Some((current + 1) % phases.len())
        }
    }

    #[test]
    #[should_panic(expected = "no runnable phase")]
    fn graph_without_runnable_phase_panics() {
        let g = gdata();
        let mut integrator = Integrator::new(
            vec![phase("a", &[]), phase("b", &[])],
            Box::new(Spinning),
        );
        integrator.start(&g);
        integrator.next_command(&g);
    }

    #[test]
    fn instance_rejects_invalid_setup() {
        let setup = SimulationSetup {
            neib_freq: 0,
            ..Default::default()
        };
        let err = Integrator::instance(IntegratorKind::PredictorCorrector, &setup).unwrap_err();
        assert_eq!(err, ConfigError::InvalidNeibFreq);
    }

    #[test]
    fn instance_builds_both_kinds() {
        let setup = SimulationSetup::default();
        let pc = Integrator::instance(IntegratorKind::PredictorCorrector, &setup).unwrap();
        assert_eq!(pc.name(), "predictor-corrector");
        let rp = Integrator::instance(IntegratorKind::Repacking, &setup).unwrap();
        assert_eq!(rp.name(), "repacking");
    }

    #[test]
    fn integrator_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Integrator>();
    }
}
