//! Test utilities and mock types for Cadenza development.
//!
//! Provides a mock [`StateTable`] ([`MockStateTable`]), reusable
//! simulation setups ([`fixtures`]), and a [`SimulatedBackend`] that
//! applies command descriptors to a mock table so whole integrator runs
//! can be checked for dependency consistency.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod backend;
pub mod fixtures;

pub use backend::{BackendError, SimulatedBackend};

use cadenza_core::{BufferKey, BufferSet, BufferSlot, StateTable};
use indexmap::IndexMap;

/// One buffer of a mock state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MockBuffer {
    pub handle: u64,
    pub valid: bool,
}

/// Mock implementation of [`StateTable`].
///
/// Backed by an `IndexMap<String, IndexMap<BufferKey, MockBuffer>>`.
/// Every allocated buffer gets a fresh `u64` handle, so tests can check
/// which allocation a resolution bound to. Build tables fluently with
/// [`with_state`](MockStateTable::with_state) and
/// [`invalidate`](MockStateTable::invalidate), or mutate them in place
/// the way a backend would.
#[derive(Clone, Debug, Default)]
pub struct MockStateTable {
    states: IndexMap<String, IndexMap<BufferKey, MockBuffer>>,
    next_handle: u64,
}

impl MockStateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a state holding freshly allocated, valid buffers.
    pub fn with_state(
        mut self,
        state: &str,
        keys: impl IntoIterator<Item = BufferKey>,
    ) -> Self {
        self.add_state(state);
        for key in keys {
            self.add_buffer(state, key);
        }
        self
    }

    /// Mark a buffer as holding no valid data.
    ///
    /// # Panics
    ///
    /// Panics if the buffer does not exist.
    pub fn invalidate(mut self, state: &str, key: BufferKey) -> Self {
        self.set_valid(state, key, false);
        self
    }

    /// Handle of a buffer, if present.
    pub fn handle(&self, state: &str, key: BufferKey) -> Option<&u64> {
        self.states.get(state)?.get(&key).map(|b| &b.handle)
    }

    /// Names of the existing states, in creation order.
    pub fn state_names(&self) -> Vec<&str> {
        self.states.keys().map(String::as_str).collect()
    }

    /// Keys of the buffers held by a state (empty if the state is absent).
    pub fn buffers(&self, state: &str) -> BufferSet {
        self.states
            .get(state)
            .map(|buffers| buffers.keys().copied().collect())
            .unwrap_or_default()
    }

    // ── mutation ───────────────────────────────────────────────

    /// Create an empty state, replacing any state of the same name.
    pub fn add_state(&mut self, state: &str) {
        self.states.insert(state.to_string(), IndexMap::new());
    }

    /// Remove a state. Returns `false` if it did not exist.
    pub fn remove_state(&mut self, state: &str) -> bool {
        self.states.shift_remove(state).is_some()
    }

    /// Rename `src` to `dst`, replacing `dst` if it exists.
    /// Returns `false` if `src` did not exist.
    pub fn rename_state(&mut self, src: &str, dst: &str) -> bool {
        match self.states.shift_remove(src) {
            Some(buffers) => {
                self.states.insert(dst.to_string(), buffers);
                true
            }
            None => false,
        }
    }

    /// Allocate a fresh valid buffer in a state, replacing any previous one.
    ///
    /// # Panics
    ///
    /// Panics if the state does not exist.
    pub fn add_buffer(&mut self, state: &str, key: BufferKey) -> u64 {
        self.next_handle += 1;
        let handle = self.next_handle;
        self.state_mut(state)
            .insert(key, MockBuffer { handle, valid: true });
        handle
    }

    /// Mark a buffer as written: allocate it if absent, validate it otherwise.
    ///
    /// # Panics
    ///
    /// Panics if the state does not exist.
    pub fn write_buffer(&mut self, state: &str, key: BufferKey) {
        match self.state_mut(state).get_mut(&key) {
            Some(buffer) => buffer.valid = true,
            None => {
                self.add_buffer(state, key);
            }
        }
    }

    /// Set the validity of an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if the buffer does not exist.
    pub fn set_valid(&mut self, state: &str, key: BufferKey, valid: bool) {
        match self.state_mut(state).get_mut(&key) {
            Some(buffer) => buffer.valid = valid,
            None => panic!("state '{state}' has no buffer {key}"),
        }
    }

    /// Make the `src` buffer also visible in `dst` (same handle).
    pub fn share_buffer(&mut self, src: &str, dst: &str, key: BufferKey) {
        let buffer = self.get_buffer(src, key);
        self.state_mut(dst).insert(key, buffer);
    }

    /// Exchange one buffer between two states.
    pub fn swap_buffer(&mut self, src: &str, dst: &str, key: BufferKey) {
        let a = self.get_buffer(src, key);
        let b = self.get_buffer(dst, key);
        self.state_mut(src).insert(key, b);
        self.state_mut(dst).insert(key, a);
    }

    /// Move one buffer from `src` to `dst`.
    pub fn move_buffer(&mut self, src: &str, dst: &str, key: BufferKey) {
        let buffer = self.get_buffer(src, key);
        self.state_mut(src).shift_remove(&key);
        self.state_mut(dst).insert(key, buffer);
    }

    fn get_buffer(&self, state: &str, key: BufferKey) -> MockBuffer {
        match self.states.get(state).and_then(|b| b.get(&key)) {
            Some(buffer) => *buffer,
            None => panic!("state '{state}' has no buffer {key}"),
        }
    }

    fn state_mut(&mut self, state: &str) -> &mut IndexMap<BufferKey, MockBuffer> {
        match self.states.get_mut(state) {
            Some(buffers) => buffers,
            None => panic!("state '{state}' does not exist"),
        }
    }
}

impl StateTable for MockStateTable {
    type Handle = u64;

    fn has_state(&self, state: &str) -> bool {
        self.states.contains_key(state)
    }

    fn buffer(&self, state: &str, key: BufferKey) -> Option<BufferSlot<'_, u64>> {
        let buffer = self.states.get(state)?.get(&key)?;
        Some(BufferSlot {
            handle: &buffer.handle,
            valid: buffer.valid,
        })
    }
}
