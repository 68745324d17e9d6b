//! Cadenza: phase-based command scheduling for particle simulation time
//! integrators.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Cadenza sub-crates. For most users, adding `cadenza` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use cadenza::prelude::*;
//!
//! let setup = SimulationSetup {
//!     max_iterations: Some(2),
//!     ..Default::default()
//! };
//! let mut integrator =
//!     Integrator::instance(IntegratorKind::PredictorCorrector, &setup).unwrap();
//! let mut gdata = GlobalData::new(setup);
//!
//! integrator.start(&gdata);
//! while let Some(cmd) = integrator.next_command(&gdata) {
//!     // A real driver executes `cmd` on its devices here and updates
//!     // `gdata` from the results.
//!     if cmd.kind() == CommandKind::RenameState && cmd.step().last {
//!         gdata.iterations += 1;
//!     }
//! }
//! assert!(integrator.is_finished());
//! assert_eq!(gdata.iterations, 2);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `cadenza-core` | Buffer keys, command kinds, flags, setup, global data, errors |
//! | [`command`] | `cadenza-command` | Command descriptors and buffer resolution |
//! | [`integrator`] | `cadenza-integrator` | Phases, the phase engine, concrete schemes |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core vocabulary (`cadenza-core`).
///
/// Buffer keys and sets, the closed set of command kinds, command and
/// simulation flags, the [`types::SimulationSetup`], the
/// [`types::GlobalData`] context, and the [`types::StateTable`] trait a
/// backend implements.
pub use cadenza_core as types;

/// Command descriptors and buffer dependency resolution
/// (`cadenza-command`).
pub use cadenza_command as command;

/// Phases, the phase engine, and the concrete integrators
/// (`cadenza-integrator`).
///
/// [`integrator::Integrator::instance`] builds a ready-to-run
/// [`integrator::predictor_corrector`] or [`integrator::repacking`]
/// integrator.
pub use cadenza_integrator as integrator;

/// Common imports for typical Cadenza usage.
///
/// ```rust
/// use cadenza::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use cadenza_core::{
        BoundaryModel, BufferKey, BufferSet, CommandFlags, CommandKind, FilterFreq, FilterKind,
        GlobalData, SimFlags, SimulationSetup, StateTable, StepInfo,
    };

    // Errors
    pub use cadenza_core::{ConfigError, ResolveError};

    // Commands
    pub use cadenza_command::{resolve_command, CommandDescriptor, DtOperator, StateBuffers};

    // Integrators
    pub use cadenza_integrator::{
        Integrator, IntegratorKind, Phase, PhaseBuilder, PhaseCursor, Scheme,
    };
}
