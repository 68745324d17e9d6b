//! Command descriptors and buffer dependency resolution.
//!
//! A [`CommandDescriptor`] describes one schedulable unit of work and the
//! buffers of which named states it reads, updates, and writes. The
//! [`resolve`] functions turn those declarations into concrete buffer
//! handles from the backend's [`StateTable`](cadenza_core::StateTable),
//! failing fast when a declared input is missing.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod descriptor;
pub mod resolve;

pub use descriptor::{BufferArgument, CommandDescriptor, DtOperator, StateBuffers};
pub use resolve::{
    resolve_argument, resolve_command, resolve_existing, resolve_general,
    resolve_state_buffers, BufferList, ResolvedCommand, WriteResolution,
};
