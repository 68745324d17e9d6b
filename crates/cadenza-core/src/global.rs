//! The read-only simulation context consulted by phase predicates and
//! phase transitions.

use crate::config::SimulationSetup;

/// Global simulation state as seen by the integrator.
///
/// The driver owns this value and updates the run-time fields between
/// calls to `next_command()` (the iteration counter after each step, the
/// adaptive time-step after each force computation, the convergence flag
/// after each stop-criterion evaluation). The integrator only ever reads
/// it, through an explicit `&GlobalData` parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct GlobalData {
    /// The immutable run description.
    pub setup: SimulationSetup,
    /// Completed iterations of the main loop.
    pub iterations: u64,
    /// Current (adaptive) time-step.
    pub dt: f32,
    /// Simulated time.
    pub t: f64,
    /// Set by the backend when the effective-pressure solver converged.
    pub effpres_converged: bool,
}

impl GlobalData {
    /// Fresh run state for the given setup.
    pub fn new(setup: SimulationSetup) -> Self {
        Self {
            setup,
            iterations: 0,
            dt: 0.0,
            t: 0.0,
            effpres_converged: false,
        }
    }

    /// Whether the neighbor list is due for a rebuild this iteration.
    pub fn neibs_due(&self) -> bool {
        let freq = u64::from(self.setup.neib_freq.max(1));
        self.iterations % freq == 0
    }

    /// Whether the configured final iteration has been reached.
    pub fn reached_final_iteration(&self) -> bool {
        self.setup
            .max_iterations
            .is_some_and(|max| self.iterations >= max)
    }
}
