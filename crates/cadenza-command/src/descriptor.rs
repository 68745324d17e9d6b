//! The [`CommandDescriptor`] record and its fluent construction API.
//!
//! Descriptors are built once, while an integrator assembles its phase
//! graph, and are read-only afterwards. The setters all take
//! `&mut self` and return `&mut Self`, so a phase builder can append a
//! command and configure it in one chained expression:
//!
//! ```
//! use cadenza_command::{CommandDescriptor, DtOperator};
//! use cadenza_core::{BufferKey, CommandKind, StepInfo};
//!
//! let mut cmd = CommandDescriptor::new(CommandKind::Euler);
//! cmd.set_step(StepInfo::new(1))
//!     .set_src("step n")
//!     .set_dst("step n*")
//!     .set_dt(DtOperator::Half)
//!     .reading("step n", BufferKey::POS | BufferKey::VEL | BufferKey::FORCES)
//!     .writing("step n*", BufferKey::POS | BufferKey::VEL);
//! assert_eq!(cmd.writes().len(), 1);
//! ```

use std::fmt;

use cadenza_core::{BufferSet, CommandFlags, CommandKind, GlobalData, StepInfo};
use smallvec::SmallVec;

/// A set of buffers within one named state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateBuffers {
    /// The state name.
    pub state: String,
    /// The buffers within that state. Empty means "unspecified".
    pub buffers: BufferSet,
}

impl StateBuffers {
    /// Pair a state name with a buffer set.
    pub fn new(state: impl Into<String>, buffers: impl Into<BufferSet>) -> Self {
        Self {
            state: state.into(),
            buffers: buffers.into(),
        }
    }
}

/// Which buffers, from which states, a command reads, updates or writes.
///
/// Most commands touch one or two states, so the list is kept inline.
pub type BufferArgument = SmallVec<[StateBuffers; 2]>;

/// How a command determines the time-step it integrates over.
#[derive(Clone, Copy, Debug)]
pub enum DtOperator {
    /// No time-step applies; evaluates to NaN.
    Undefined,
    /// A zero time-step (initialization).
    Zero,
    /// Half the current adaptive time-step (predictor).
    Half,
    /// The full current adaptive time-step (corrector).
    Full,
    /// A scheme-specific function of the global state.
    Custom(fn(&GlobalData) -> f32),
}

impl DtOperator {
    /// Evaluate the time-step for the current global state.
    pub fn eval(&self, gdata: &GlobalData) -> f32 {
        match self {
            Self::Undefined => f32::NAN,
            Self::Zero => 0.0,
            Self::Half => gdata.dt / 2.0,
            Self::Full => gdata.dt,
            Self::Custom(f) => f(gdata),
        }
    }
}

/// Description of one schedulable unit of work.
///
/// The distinction between updates and writes: updated buffers are also
/// read, so they must already exist (and be valid) in their state;
/// written buffers are produced fresh and may be missing beforehand.
#[derive(Clone, Debug)]
pub struct CommandDescriptor {
    kind: CommandKind,
    step: StepInfo,
    src: Option<String>,
    dst: Option<String>,
    dt: DtOperator,
    flags: CommandFlags,
    reads: BufferArgument,
    updates: BufferArgument,
    writes: BufferArgument,
    only_internal: bool,
}

impl CommandDescriptor {
    /// A command of the given kind with every setting at its default:
    /// undetermined step, undefined time-step, no flags, no buffers, and
    /// the kind's static `only_internal` trait.
    pub fn new(kind: CommandKind) -> Self {
        Self {
            kind,
            step: StepInfo::undetermined(),
            src: None,
            dst: None,
            dt: DtOperator::Undefined,
            flags: CommandFlags::empty(),
            reads: BufferArgument::new(),
            updates: BufferArgument::new(),
            writes: BufferArgument::new(),
            only_internal: kind.only_internal(),
        }
    }

    // ── setters ────────────────────────────────────────────────

    /// Set the step this command belongs to.
    pub fn set_step(&mut self, step: StepInfo) -> &mut Self {
        self.step = step;
        self
    }

    /// Set the source state.
    pub fn set_src(&mut self, src: impl Into<String>) -> &mut Self {
        self.src = Some(src.into());
        self
    }

    /// Set the destination state.
    pub fn set_dst(&mut self, dst: impl Into<String>) -> &mut Self {
        self.dst = Some(dst.into());
        self
    }

    /// Set the time-step operator.
    pub fn set_dt(&mut self, dt: DtOperator) -> &mut Self {
        self.dt = dt;
        self
    }

    /// Add flags (bitwise OR).
    pub fn set_flags(&mut self, flags: CommandFlags) -> &mut Self {
        self.flags.insert(flags);
        self
    }

    /// Clear flags.
    pub fn clear_flags(&mut self, flags: CommandFlags) -> &mut Self {
        self.flags.remove(flags);
        self
    }

    /// Declare buffers read from a state.
    pub fn reading(&mut self, state: impl Into<String>, buffers: impl Into<BufferSet>) -> &mut Self {
        self.reads.push(StateBuffers::new(state, buffers));
        self
    }

    /// Declare buffers read and then overwritten in a state.
    pub fn updating(
        &mut self,
        state: impl Into<String>,
        buffers: impl Into<BufferSet>,
    ) -> &mut Self {
        self.updates.push(StateBuffers::new(state, buffers));
        self
    }

    /// Declare buffers produced in a state.
    pub fn writing(&mut self, state: impl Into<String>, buffers: impl Into<BufferSet>) -> &mut Self {
        self.writes.push(StateBuffers::new(state, buffers));
        self
    }

    // ── accessors ──────────────────────────────────────────────

    /// The command kind.
    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    /// The step this command belongs to.
    pub fn step(&self) -> StepInfo {
        self.step
    }

    /// Source state, if the command has one.
    pub fn src(&self) -> Option<&str> {
        self.src.as_deref()
    }

    /// Destination state, if the command has one.
    pub fn dst(&self) -> Option<&str> {
        self.dst.as_deref()
    }

    /// The time-step operator.
    pub fn dt_operator(&self) -> DtOperator {
        self.dt
    }

    /// Evaluate the command's time-step for the current global state.
    pub fn dt(&self, gdata: &GlobalData) -> f32 {
        self.dt.eval(gdata)
    }

    /// The command flags.
    pub fn flags(&self) -> CommandFlags {
        self.flags
    }

    /// Declared reads.
    pub fn reads(&self) -> &[StateBuffers] {
        &self.reads
    }

    /// Declared updates.
    pub fn updates(&self) -> &[StateBuffers] {
        &self.updates
    }

    /// Declared writes.
    pub fn writes(&self) -> &[StateBuffers] {
        &self.writes
    }

    /// Whether the command runs only on particles owned by the device.
    pub fn only_internal(&self) -> bool {
        self.only_internal
    }
}

impl fmt::Display for CommandDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.kind, self.step)?;
        match (&self.src, &self.dst) {
            (Some(src), Some(dst)) => write!(f, " {src} -> {dst}"),
            (Some(src), None) => write!(f, " {src}"),
            (None, Some(dst)) => write!(f, " -> {dst}"),
            (None, None) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadenza_core::{BufferKey, SimulationSetup};

    fn gdata_with_dt(dt: f32) -> GlobalData {
        let mut gdata = GlobalData::new(SimulationSetup::default());
        gdata.dt = dt;
        gdata
    }

    #[test]
    fn defaults() {
        let cmd = CommandDescriptor::new(CommandKind::Forces);
        assert_eq!(cmd.kind(), CommandKind::Forces);
        assert!(cmd.step().is_undetermined());
        assert!(cmd.src().is_none());
        assert!(cmd.dst().is_none());
        assert!(cmd.flags().is_empty());
        assert!(cmd.reads().is_empty() && cmd.updates().is_empty() && cmd.writes().is_empty());
        assert!(cmd.only_internal());
        assert!(!CommandDescriptor::new(CommandKind::RenameState).only_internal());
    }

    #[test]
    fn undefined_dt_is_nan() {
        let cmd = CommandDescriptor::new(CommandKind::Euler);
        assert!(matches!(cmd.dt_operator(), DtOperator::Undefined));
        assert!(cmd.dt(&gdata_with_dt(0.1)).is_nan());
    }

    #[test]
    fn dt_operators() {
        let gdata = gdata_with_dt(0.25);
        assert_eq!(DtOperator::Zero.eval(&gdata), 0.0);
        assert_eq!(DtOperator::Half.eval(&gdata), 0.125);
        assert_eq!(DtOperator::Full.eval(&gdata), 0.25);
        fn quarter(g: &GlobalData) -> f32 {
            g.dt / 4.0
        }
        assert_eq!(DtOperator::Custom(quarter).eval(&gdata), 0.0625);
    }

    #[test]
    fn fluent_configuration() {
        let mut cmd = CommandDescriptor::new(CommandKind::Euler);
        cmd.set_step(StepInfo::new(2).into_last())
            .set_src("step n")
            .set_dst("step n+1")
            .set_dt(DtOperator::Full)
            .set_flags(CommandFlags::INTEGRATOR_STEP_2 | CommandFlags::FLUID)
            .clear_flags(CommandFlags::FLUID)
            .reading("step n", BufferKey::POS | BufferKey::VEL)
            .reading("step n*", BufferKey::FORCES)
            .updating("step n+1", BufferKey::INFO)
            .writing("step n+1", BufferKey::POS | BufferKey::VEL);

        assert_eq!(cmd.step(), StepInfo::new(2).into_last());
        assert_eq!(cmd.src(), Some("step n"));
        assert_eq!(cmd.dst(), Some("step n+1"));
        assert_eq!(cmd.flags(), CommandFlags::INTEGRATOR_STEP_2);
        assert_eq!(cmd.reads().len(), 2);
        assert_eq!(cmd.reads()[1], StateBuffers::new("step n*", BufferKey::FORCES));
        assert_eq!(cmd.updates().len(), 1);
        assert_eq!(cmd.writes()[0].buffers.len(), 2);
        assert_eq!(cmd.dt(&gdata_with_dt(0.5)), 0.5);
    }

    #[test]
    fn display() {
        let mut cmd = CommandDescriptor::new(CommandKind::RenameState);
        cmd.set_src("step n+1").set_dst("step n");
        assert_eq!(cmd.to_string(), "RENAME_STATE [step ?] step n+1 -> step n");

        let mut cmd = CommandDescriptor::new(CommandKind::Forces);
        cmd.set_step(StepInfo::new(1)).set_src("step n");
        assert_eq!(cmd.to_string(), "FORCES [step 1] step n");
    }
}
