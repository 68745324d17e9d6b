//! Phase-based integrator engine for Cadenza.
//!
//! An [`Integrator`] is a graph of [`Phase`]s, each an ordered list of
//! [`CommandDescriptor`](cadenza_command::CommandDescriptor)s, walked by a
//! [`Scheme`]. The driver pulls commands one at a time with
//! [`Integrator::next_command`] and executes them on its backend; the
//! integrator never touches buffers itself.
//!
//! Two concrete schemes ship with the crate:
//!
//! - [`predictor_corrector`]: two-stage time stepping with optional
//!   effective-pressure solver and density filter loops.
//! - [`repacking`]: particle relaxation ahead of the simulation proper.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod common;
pub mod integrator;
pub mod phase;
pub mod predictor_corrector;
pub mod repacking;

pub use integrator::{Integrator, IntegratorKind, LinearScheme, Scheme};
pub use phase::{IsDoneFn, Phase, PhaseBuilder, PhaseCursor, ResetFn, ShouldRunFn};
pub use predictor_corrector::{PhaseCode, PredictorCorrector};
pub use repacking::{Repacking, RepackingPhase};
