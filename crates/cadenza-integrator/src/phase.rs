//! Phases: ordered command sequences with run, completion, and reset
//! policies.
//!
//! A [`Phase`] is assembled once through a [`PhaseBuilder`] owned by the
//! concrete integrator. After [`PhaseBuilder::finish`] the command list is
//! frozen; the runtime only moves the phase's [`PhaseCursor`].

use std::fmt;

use cadenza_command::CommandDescriptor;
use cadenza_core::{CommandKind, GlobalData};

/// Predicate deciding whether a phase runs at all when entered.
pub type ShouldRunFn = Box<dyn Fn(&Phase, &GlobalData) -> bool + Send + Sync>;

/// Predicate deciding whether a phase has finished.
///
/// Same shape as [`ShouldRunFn`] but a distinct role: it is evaluated
/// before every command, not just on entry.
pub type IsDoneFn = Box<dyn Fn(&Phase, &GlobalData) -> bool + Send + Sync>;

/// Transform applied to the cursor whenever the phase is entered.
pub type ResetFn = Box<dyn Fn(&mut PhaseCursor, &GlobalData) + Send + Sync>;

// ── PhaseCursor ────────────────────────────────────────────────────

/// Position within a phase's command list, plus the number of
/// consecutive re-entries of the phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PhaseCursor {
    position: usize,
    passes: u32,
}

impl PhaseCursor {
    /// Index of the next command to hand out.
    pub fn position(&self) -> usize {
        self.position
    }

    /// How many times the phase was re-entered directly after itself.
    /// Zero on the first entry.
    pub fn passes(&self) -> u32 {
        self.passes
    }

    /// Move back to the first command.
    pub fn rewind(&mut self) {
        self.position = 0;
    }

    /// Move to an arbitrary command. Positioning past the end of the
    /// phase panics when the phase is reset.
    pub fn seek(&mut self, position: usize) {
        self.position = position;
    }

    pub(crate) fn enter(&mut self, same_phase: bool) {
        self.passes = if same_phase { self.passes + 1 } else { 0 };
    }
}

// ── Phase ──────────────────────────────────────────────────────────

/// An ordered group of commands forming one stage of a time step.
pub struct Phase {
    name: String,
    commands: Vec<CommandDescriptor>,
    cursor: PhaseCursor,
    should_run: ShouldRunFn,
    is_done: IsDoneFn,
    reset: ResetFn,
}

impl Phase {
    /// The phase name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `true` if the phase holds no command.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Number of commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// The commands, in execution order.
    pub fn commands(&self) -> &[CommandDescriptor] {
        &self.commands
    }

    /// The current cursor.
    pub fn cursor(&self) -> PhaseCursor {
        self.cursor
    }

    /// `true` once every command has been handed out.
    pub fn finished_commands(&self) -> bool {
        self.cursor.position >= self.commands.len()
    }

    /// Evaluate the should-run policy.
    pub fn should_run(&self, gdata: &GlobalData) -> bool {
        (self.should_run)(self, gdata)
    }

    /// Evaluate the completion policy.
    pub fn is_done(&self, gdata: &GlobalData) -> bool {
        (self.is_done)(self, gdata)
    }

    /// Apply the reset policy.
    ///
    /// # Panics
    ///
    /// Panics if the policy leaves the cursor past the end of the phase.
    pub fn reset(&mut self, gdata: &GlobalData) {
        (self.reset)(&mut self.cursor, gdata);
        assert!(
            self.cursor.position <= self.commands.len(),
            "reset of phase '{}' moved the cursor to {} of {}",
            self.name,
            self.cursor.position,
            self.commands.len()
        );
    }

    /// Hand out the command at the cursor and advance.
    ///
    /// # Panics
    ///
    /// Panics if every command has already been handed out.
    pub fn next_command(&mut self) -> &CommandDescriptor {
        assert!(
            !self.finished_commands(),
            "phase '{}' has no more commands",
            self.name
        );
        let index = self.cursor.position;
        self.cursor.position += 1;
        &self.commands[index]
    }

    pub(crate) fn enter(&mut self, same_phase: bool, gdata: &GlobalData) {
        self.cursor.enter(same_phase);
        self.reset(gdata);
    }
}

impl fmt::Debug for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Phase")
            .field("name", &self.name)
            .field("commands", &self.commands.len())
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

// ── PhaseBuilder ───────────────────────────────────────────────────

/// Mutable access to a phase under construction.
///
/// Hooks left unset get the defaults: run if non-empty, done once every
/// command was handed out, reset rewinds the cursor.
pub struct PhaseBuilder {
    name: String,
    commands: Vec<CommandDescriptor>,
    should_run: Option<ShouldRunFn>,
    is_done: Option<IsDoneFn>,
    reset: Option<ResetFn>,
}

impl PhaseBuilder {
    /// Start building a phase.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commands: Vec::new(),
            should_run: None,
            is_done: None,
            reset: None,
        }
    }

    /// Reserve room for `additional` commands.
    pub fn reserve(&mut self, additional: usize) -> &mut Self {
        self.commands.reserve(additional);
        self
    }

    /// Append a command and return it for configuration.
    pub fn add_command(&mut self, kind: CommandKind) -> &mut CommandDescriptor {
        self.commands.push(CommandDescriptor::new(kind));
        let last = self.commands.len() - 1;
        &mut self.commands[last]
    }

    /// Reconfigure an already appended command.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn edit_command(&mut self, index: usize) -> &mut CommandDescriptor {
        &mut self.commands[index]
    }

    /// Number of commands appended so far.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// `true` if no command was appended.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Replace the should-run policy.
    pub fn should_run_if(
        &mut self,
        f: impl Fn(&Phase, &GlobalData) -> bool + Send + Sync + 'static,
    ) -> &mut Self {
        self.should_run = Some(Box::new(f));
        self
    }

    /// Replace the completion policy.
    pub fn is_done_if(
        &mut self,
        f: impl Fn(&Phase, &GlobalData) -> bool + Send + Sync + 'static,
    ) -> &mut Self {
        self.is_done = Some(Box::new(f));
        self
    }

    /// Replace the reset policy.
    pub fn set_reset_function(
        &mut self,
        f: impl Fn(&mut PhaseCursor, &GlobalData) + Send + Sync + 'static,
    ) -> &mut Self {
        self.reset = Some(Box::new(f));
        self
    }

    /// Freeze the command list.
    pub fn finish(self) -> Phase {
        Phase {
            name: self.name,
            commands: self.commands,
            cursor: PhaseCursor::default(),
            should_run: self
                .should_run
                .unwrap_or_else(|| Box::new(default_should_run)),
            is_done: self
                .is_done
                .unwrap_or_else(|| Box::new(default_is_done)),
            reset: self
                .reset
                .unwrap_or_else(|| Box::new(default_reset)),
        }
    }
}

fn default_should_run(phase: &Phase, _: &GlobalData) -> bool {
    !phase.is_empty()
}

fn default_is_done(phase: &Phase, _: &GlobalData) -> bool {
    phase.finished_commands()
}

fn default_reset(cursor: &mut PhaseCursor, _: &GlobalData) {
    cursor.rewind();
}
