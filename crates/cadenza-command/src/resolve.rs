//! Buffer dependency resolution.
//!
//! Turns the `(state, buffers)` declarations of a [`CommandDescriptor`]
//! into concrete backend handles looked up in a [`StateTable`].
//!
//! Inputs (reads and updates) resolve strictly: every requested buffer
//! must exist in its state and hold valid data, otherwise the phase graph
//! is inconsistent and resolution fails. Outputs (writes) resolve
//! relaxedly: buffers not yet present are reported as pending
//! allocations, and an unspecified buffer set stands for "the same
//! buffers as the inputs".
//!
//! All functions are pure queries over the table; calling them twice
//! with the same table gives the same answer.

use cadenza_core::{BufferKey, BufferSet, ResolveError, StateTable};
use indexmap::IndexMap;

use crate::descriptor::{CommandDescriptor, StateBuffers};

// ── BufferList ─────────────────────────────────────────────────────

/// Resolved buffer handles keyed by buffer, in resolution order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferList<H> {
    entries: IndexMap<BufferKey, H>,
}

impl<H> Default for BufferList<H> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}

impl<H> BufferList<H> {
    /// An empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of resolved buffers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if no buffer was resolved.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Handle bound to `key`, if any.
    pub fn get(&self, key: BufferKey) -> Option<&H> {
        self.entries.get(&key)
    }

    /// Whether `key` is bound.
    pub fn contains(&self, key: BufferKey) -> bool {
        self.entries.contains_key(&key)
    }

    /// The set of bound keys.
    pub fn keys(&self) -> BufferSet {
        self.entries.keys().copied().collect()
    }

    /// Iterate over `(key, handle)` pairs in resolution order.
    pub fn iter(&self) -> impl Iterator<Item = (BufferKey, &H)> {
        self.entries.iter().map(|(&k, h)| (k, h))
    }

    /// Bind `key` unless it is already bound. Returns `true` if inserted.
    pub fn insert(&mut self, key: BufferKey, handle: H) -> bool {
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, handle);
        true
    }

    /// Union-merge `other` into `self`; existing bindings win.
    pub fn merge(&mut self, other: BufferList<H>) {
        for (key, handle) in other.entries {
            self.insert(key, handle);
        }
    }
}

// ── Strict resolution ──────────────────────────────────────────────

/// Resolve `buffers` in `state`. Every buffer must exist and be valid.
pub fn resolve_state_buffers<T: StateTable + ?Sized>(
    table: &T,
    state: &str,
    buffers: &BufferSet,
) -> Result<BufferList<T::Handle>, ResolveError> {
    if !table.has_state(state) {
        return Err(ResolveError::MissingState {
            state: state.to_string(),
        });
    }
    let mut list = BufferList::new();
    for key in buffers {
        let slot = table
            .buffer(state, key)
            .ok_or_else(|| ResolveError::MissingBuffer {
                state: state.to_string(),
                buffer: key,
            })?;
        if !slot.valid {
            return Err(ResolveError::InvalidBuffer {
                state: state.to_string(),
                buffer: key,
            });
        }
        list.insert(key, slot.handle.clone());
    }
    Ok(list)
}

/// Resolve one `(state, buffers)` pair strictly.
pub fn resolve_existing<T: StateTable + ?Sized>(
    table: &T,
    spec: &StateBuffers,
) -> Result<BufferList<T::Handle>, ResolveError> {
    resolve_state_buffers(table, &spec.state, &spec.buffers)
}

/// Resolve every pair of an argument strictly and union-merge the
/// results. When two pairs bind the same key, the first one wins.
pub fn resolve_argument<T: StateTable + ?Sized>(
    table: &T,
    args: &[StateBuffers],
) -> Result<BufferList<T::Handle>, ResolveError> {
    let mut list = BufferList::new();
    for spec in args {
        list.merge(resolve_existing(table, spec)?);
    }
    Ok(list)
}

// ── Relaxed resolution ─────────────────────────────────────────────

/// Outcome of a relaxed (write) resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteResolution<H> {
    /// Buffers already present in their state, whatever their validity.
    pub present: BufferList<H>,
    /// Buffers the backend must allocate before running the command,
    /// grouped by state. States with nothing pending are omitted.
    pub pending: Vec<StateBuffers>,
}

impl<H> WriteResolution<H> {
    /// `true` if every written buffer already exists.
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Resolve a write argument.
///
/// An empty buffer set in a pair stands for the keys of `model`. Only a
/// missing state is an error; absent buffers become pending allocations
/// and existing buffers are returned even if invalid, since they are
/// about to be overwritten.
pub fn resolve_general<T: StateTable + ?Sized>(
    table: &T,
    args: &[StateBuffers],
    model: &BufferSet,
) -> Result<WriteResolution<T::Handle>, ResolveError> {
    let mut present = BufferList::new();
    let mut pending = Vec::new();
    for spec in args {
        if !table.has_state(&spec.state) {
            return Err(ResolveError::MissingState {
                state: spec.state.clone(),
            });
        }
        let keys = if spec.buffers.is_empty() {
            model
        } else {
            &spec.buffers
        };
        let mut missing = BufferSet::empty();
        for key in keys {
            match table.buffer(&spec.state, key) {
                Some(slot) => {
                    present.insert(key, slot.handle.clone());
                }
                None => missing.insert(key),
            }
        }
        if !missing.is_empty() {
            pending.push(StateBuffers::new(spec.state.clone(), missing));
        }
    }
    Ok(WriteResolution { present, pending })
}

// ── Whole command ──────────────────────────────────────────────────

/// Every buffer a command touches, resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedCommand<H> {
    /// Read-only inputs.
    pub reads: BufferList<H>,
    /// Inputs that are overwritten in place.
    pub updates: BufferList<H>,
    /// Outputs.
    pub writes: WriteResolution<H>,
}

/// Resolve every declaration of `cmd`.
///
/// Reads and updates resolve strictly; writes resolve relaxedly, with
/// unspecified write sets modelled on the union of the resolved read and
/// update keys.
pub fn resolve_command<T: StateTable + ?Sized>(
    table: &T,
    cmd: &CommandDescriptor,
) -> Result<ResolvedCommand<T::Handle>, ResolveError> {
    let reads = resolve_argument(table, cmd.reads())?;
    let updates = resolve_argument(table, cmd.updates())?;
    let model = reads.keys().union(&updates.keys());
    let writes = resolve_general(table, cmd.writes(), &model)?;
    Ok(ResolvedCommand {
        reads,
        updates,
        writes,
    })
}
