//! A simulated execution backend.
//!
//! [`SimulatedBackend`] stands in for the device layer: it resolves each
//! command's declared buffers against a [`MockStateTable`] (strictly for
//! reads and updates), applies state-management commands to the table,
//! allocates written buffers, and updates the run-time fields of
//! [`GlobalData`] the way a real driver would. No numerics are run.
//!
//! Conventions:
//!
//! - `SHARE_BUFFERS` and `MOVE_STATE_BUFFERS` act on the buffers they
//!   read from `src`; `SWAP_STATE_BUFFERS` on the buffers it updates.
//! - A `RENAME_STATE` marked as the last step closes the time step: the
//!   iteration counter is incremented and simulated time advanced.
//! - `JACOBI_STOP_CRITERION` reports convergence once it has been
//!   evaluated [`converge_after`](SimulatedBackend::converge_after) times
//!   since the last `JACOBI_RESET_STOP_CRITERION`.

use std::error::Error;
use std::fmt;

use cadenza_command::{resolve_command, CommandDescriptor};
use cadenza_core::{BufferSet, CommandKind, GlobalData, ResolveError, StateTable};

use crate::MockStateTable;

/// Errors from executing a command on the simulated backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendError {
    /// A declared buffer did not resolve.
    Resolve(ResolveError),
    /// A state-management command lacks its source or destination.
    MissingEndpoint {
        kind: CommandKind,
        endpoint: &'static str,
    },
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolve(e) => write!(f, "resolution failed: {e}"),
            Self::MissingEndpoint { kind, endpoint } => {
                write!(f, "{kind} has no {endpoint} state")
            }
        }
    }
}

impl Error for BackendError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Resolve(e) => Some(e),
            Self::MissingEndpoint { .. } => None,
        }
    }
}

impl From<ResolveError> for BackendError {
    fn from(e: ResolveError) -> Self {
        Self::Resolve(e)
    }
}

/// Applies command descriptors to a [`MockStateTable`].
#[derive(Clone, Debug)]
pub struct SimulatedBackend {
    table: MockStateTable,
    executed: Vec<CommandKind>,
    converge_after: Option<u32>,
    stop_checks: u32,
    dt: f32,
}

impl SimulatedBackend {
    pub fn new(table: MockStateTable) -> Self {
        Self {
            table,
            executed: Vec::new(),
            converge_after: None,
            stop_checks: 0,
            dt: 1e-3,
        }
    }

    /// A backend whose table holds one state with the given buffers, as
    /// after the initial upload.
    pub fn with_initial_state(state: &str, buffers: &BufferSet) -> Self {
        Self::new(MockStateTable::new().with_state(state, buffers.iter()))
    }

    /// Report solver convergence after `checks` stop-criterion evaluations.
    pub fn converge_after(mut self, checks: u32) -> Self {
        self.converge_after = Some(checks);
        self
    }

    /// The time-step the first force computation sets.
    pub fn with_dt(mut self, dt: f32) -> Self {
        self.dt = dt;
        self
    }

    pub fn table(&self) -> &MockStateTable {
        &self.table
    }

    /// Kinds of the executed commands, in order.
    pub fn executed(&self) -> &[CommandKind] {
        &self.executed
    }

    /// How many commands of `kind` were executed.
    pub fn count(&self, kind: CommandKind) -> usize {
        self.executed.iter().filter(|&&k| k == kind).count()
    }

    /// Execute one command.
    pub fn execute(
        &mut self,
        cmd: &CommandDescriptor,
        gdata: &mut GlobalData,
    ) -> Result<(), BackendError> {
        let resolved = resolve_command(&self.table, cmd)?;
        let kind = cmd.kind();

        match kind {
            CommandKind::InitState => {
                let dst = endpoint(cmd.dst(), kind, "destination")?;
                self.table.add_state(dst);
            }
            CommandKind::RenameState => {
                let src = endpoint(cmd.src(), kind, "source")?;
                let dst = endpoint(cmd.dst(), kind, "destination")?;
                if !self.table.rename_state(src, dst) {
                    return Err(missing_state(src));
                }
                if cmd.step().last {
                    gdata.iterations += 1;
                    gdata.t += f64::from(gdata.dt);
                }
            }
            CommandKind::ReleaseState => {
                let src = endpoint(cmd.src(), kind, "source")?;
                if !self.table.remove_state(src) {
                    return Err(missing_state(src));
                }
            }
            CommandKind::ShareBuffers
            | CommandKind::SwapStateBuffers
            | CommandKind::MoveStateBuffers => {
                let src = endpoint(cmd.src(), kind, "source")?;
                let dst = endpoint(cmd.dst(), kind, "destination")?;
                if !self.table.has_state(dst) {
                    return Err(missing_state(dst));
                }
                let keys = match kind {
                    CommandKind::SwapStateBuffers => resolved.updates.keys(),
                    _ => resolved.reads.keys(),
                };
                for key in &keys {
                    match kind {
                        CommandKind::ShareBuffers => self.table.share_buffer(src, dst, key),
                        CommandKind::SwapStateBuffers => self.table.swap_buffer(src, dst, key),
                        _ => self.table.move_buffer(src, dst, key),
                    }
                }
            }
            CommandKind::Forces if gdata.dt == 0.0 => gdata.dt = self.dt,
            CommandKind::JacobiResetStopCriterion => {
                self.stop_checks = 0;
                gdata.effpres_converged = false;
            }
            CommandKind::JacobiStopCriterion => {
                self.stop_checks += 1;
                if self.converge_after.is_some_and(|n| self.stop_checks >= n) {
                    gdata.effpres_converged = true;
                }
            }
            _ => {}
        }

        let model = resolved.reads.keys().union(&resolved.updates.keys());
        for spec in cmd.writes() {
            let keys = if spec.buffers.is_empty() {
                &model
            } else {
                &spec.buffers
            };
            for key in keys {
                self.table.write_buffer(&spec.state, key);
            }
        }

        self.executed.push(kind);
        Ok(())
    }
}

fn endpoint<'a>(
    state: Option<&'a str>,
    kind: CommandKind,
    endpoint: &'static str,
) -> Result<&'a str, BackendError> {
    state.ok_or(BackendError::MissingEndpoint { kind, endpoint })
}

fn missing_state(state: &str) -> BackendError {
    BackendError::Resolve(ResolveError::MissingState {
        state: state.to_string(),
    })
}
