//! Core types for the Cadenza integrator framework.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by the rest of the workspace: buffer keys and
//! buffer sets, the closed set of command kinds with their static traits,
//! command and simulation flags, step metadata, configuration, the
//! read-only global simulation context, and error types.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod buffer;
pub mod command;
pub mod config;
pub mod error;
pub mod flags;
pub mod global;
pub mod step;
pub mod traits;

pub use buffer::{buffer_by_name, buffer_name, BufferKey, BufferSet, BufferSetIter};
pub use command::{BufferUsage, CommandKind};
pub use config::{BoundaryModel, EffPresConfig, FilterFreq, FilterKind, SimulationSetup};
pub use error::{ConfigError, ResolveError};
pub use flags::{CommandFlags, SimFlags};
pub use global::GlobalData;
pub use step::StepInfo;
pub use traits::{BufferSlot, StateTable};
