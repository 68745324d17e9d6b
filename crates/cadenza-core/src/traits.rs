//! Core abstraction traits for buffer lookup.

use crate::buffer::BufferKey;

/// A buffer found in a named state.
#[derive(Debug)]
pub struct BufferSlot<'a, H> {
    /// Backend handle of the buffer.
    pub handle: &'a H,
    /// Whether the buffer currently holds valid data.
    pub valid: bool,
}

/// Read-only view of the execution backend's state table: which named
/// states exist, and which buffers each of them holds.
///
/// Implemented by the backend's particle system. The dependency
/// resolver queries it but never mutates it; materializing and retiring
/// states is the backend's job after it runs each command.
pub trait StateTable {
    /// Backend-specific buffer handle handed to command execution.
    type Handle: Clone;

    /// Whether a state with this name exists.
    fn has_state(&self, state: &str) -> bool;

    /// Look up a buffer in a state.
    ///
    /// Returns `None` if the state does not exist or lacks the buffer.
    fn buffer(&self, state: &str, key: BufferKey) -> Option<BufferSlot<'_, Self::Handle>>;
}
