//! Buffer keys, the closed table of known particle buffers, and
//! [`BufferSet`].

use std::fmt;
use std::ops::BitOr;

use smallvec::SmallVec;

use crate::error::ConfigError;

/// Identifies one particle buffer (position, velocity, neighbor list, ...).
///
/// `BufferKey(n)` is the n-th entry of the buffer table; see the
/// associated constants for the known keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferKey(pub u32);

impl BufferKey {
    /// Particle positions (and mass).
    pub const POS: Self = Self(0);
    /// Cell hash of each particle.
    pub const HASH: Self = Self(1);
    /// Sort index mapping sorted to unsorted particles.
    pub const PARTINDEX: Self = Self(2);
    /// First particle of each cell.
    pub const CELLSTART: Self = Self(3);
    /// One past the last particle of each cell.
    pub const CELLEND: Self = Self(4);
    /// Neighbor list.
    pub const NEIBSLIST: Self = Self(5);
    /// Compact map of which device owns each cell.
    pub const COMPACT_DEV_MAP: Self = Self(6);
    /// Particle type, object and flags.
    pub const INFO: Self = Self(7);
    /// Velocity and density.
    pub const VEL: Self = Self(8);
    /// Force accumulator.
    pub const FORCES: Self = Self(9);
    /// Continuity equation update.
    pub const CONTUPD: Self = Self(10);
    /// XSPH velocity correction.
    pub const XSPH: Self = Self(11);
    /// Viscous stress tensor.
    pub const TAU: Self = Self(12);
    /// Vorticity.
    pub const VORTICITY: Self = Self(13);
    /// Surface normals.
    pub const NORMALS: Self = Self(14);
    /// Boundary element normals and surfaces.
    pub const BOUNDELEMENTS: Self = Self(15);
    /// Gradient of the renormalization factor gamma.
    pub const GRADGAMMA: Self = Self(16);
    /// Vertices of each boundary element.
    pub const VERTICES: Self = Self(17);
    /// Vertex positions relative to their boundary element.
    pub const VERTPOS: Self = Self(18);
    /// Eulerian velocity of open-boundary vertices.
    pub const EULERVEL: Self = Self(19);
    /// Turbulent kinetic energy.
    pub const TKE: Self = Self(20);
    /// Turbulent dissipation rate.
    pub const EPSILON: Self = Self(21);
    /// Eddy viscosity.
    pub const TURBVISC: Self = Self(22);
    /// Particle volume.
    pub const VOLUME: Self = Self(23);
    /// Grenier's sigma.
    pub const SIGMA: Self = Self(24);
    /// Internal energy.
    pub const INTERNAL_ENERGY: Self = Self(25);
    /// Internal energy derivative.
    pub const INTERNAL_ENERGY_UPD: Self = Self(26);
    /// Effective pressure of granular flows.
    pub const EFFPRES: Self = Self(27);
    /// Jacobi solver vectors for the effective pressure.
    pub const JACOBI: Self = Self(28);
    /// Per-block CFL reduction array.
    pub const CFL: Self = Self(29);
    /// Scratch array for the CFL reduction.
    pub const CFL_TEMP: Self = Self(30);
    /// Per-object force partials.
    pub const RB_FORCES: Self = Self(31);
    /// Per-object torque partials.
    pub const RB_TORQUES: Self = Self(32);
    /// Object particle keys.
    pub const RB_KEYS: Self = Self(33);
    /// Next particle id for inlet generation.
    pub const NEXTID: Self = Self(34);
    /// Problem-defined private scalar.
    pub const PRIVATE: Self = Self(35);
}

/// Printable names, indexed by `BufferKey.0`.
const BUFFER_NAMES: [&str; 36] = [
    "Position",
    "Hash",
    "Particle Index",
    "Cell Start",
    "Cell End",
    "Neighbor List",
    "Compact device map",
    "Info",
    "Velocity",
    "Force",
    "Continuity update",
    "XSPH",
    "Tau",
    "Vorticity",
    "Normals",
    "Boundary Elements",
    "Gamma Gradient",
    "Vertices",
    "Vertex positions relative to boundary elements",
    "Eulerian velocity",
    "Turbulent Kinetic Energy",
    "Turbulent Dissipation Rate",
    "Eddy Viscosity",
    "Volume",
    "Sigma",
    "Internal Energy",
    "Internal Energy derivative",
    "Effective Pressure",
    "Jacobi vectors",
    "CFL array",
    "CFL aux array",
    "Object forces",
    "Object torques",
    "Object particle key",
    "Next ID",
    "Private scalar",
];

/// Printable name of a buffer key.
///
/// Fails with [`ConfigError::UnknownBuffer`] for keys outside the table.
pub fn buffer_name(key: BufferKey) -> Result<&'static str, ConfigError> {
    BUFFER_NAMES
        .get(key.0 as usize)
        .copied()
        .ok_or(ConfigError::UnknownBuffer { key: key.0 })
}

/// Look up a buffer key by its printable name (case-insensitive).
pub fn buffer_by_name(name: &str) -> Result<BufferKey, ConfigError> {
    BUFFER_NAMES
        .iter()
        .position(|n| n.eq_ignore_ascii_case(name))
        .map(|i| BufferKey(i as u32))
        .ok_or_else(|| ConfigError::UnknownBufferName {
            name: name.to_string(),
        })
}

impl fmt::Display for BufferKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match buffer_name(*self) {
            Ok(name) => f.write_str(name),
            Err(_) => write!(f, "<buffer #{}>", self.0),
        }
    }
}

impl From<u32> for BufferKey {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

const WORD_BITS: u32 = u64::BITS;

/// Word index and bit mask of `key`.
const fn locate(key: BufferKey) -> (usize, u64) {
    ((key.0 / WORD_BITS) as usize, 1 << (key.0 % WORD_BITS))
}

/// A set of buffer keys.
///
/// Commands use it to declare which buffers of a state they read,
/// update or write. The empty set is the "unspecified" placeholder
/// that relaxed write resolution expands to a model's buffer list.
///
/// The whole buffer table fits in the inline word; keys past it spill to
/// the heap. The last stored word is never zero, so equal sets have equal
/// storage.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BufferSet {
    words: SmallVec<[u64; 1]>,
}

impl BufferSet {
    /// Create an empty buffer set.
    pub fn empty() -> Self {
        Self::default()
    }

    fn word(&self, index: usize) -> u64 {
        self.words.get(index).copied().unwrap_or(0)
    }

    fn trim(&mut self) {
        while self.words.last() == Some(&0) {
            self.words.pop();
        }
    }

    /// Apply `op` word by word over the first `len` words of both sets.
    fn zip_words(&self, other: &Self, len: usize, op: impl Fn(u64, u64) -> u64) -> Self {
        let mut set = Self {
            words: (0..len).map(|i| op(self.word(i), other.word(i))).collect(),
        };
        set.trim();
        set
    }

    /// Insert a buffer key into the set.
    pub fn insert(&mut self, key: BufferKey) {
        let (index, mask) = locate(key);
        if index >= self.words.len() {
            self.words.resize(index + 1, 0);
        }
        self.words[index] |= mask;
    }

    /// Remove a buffer key from the set.
    pub fn remove(&mut self, key: BufferKey) {
        let (index, mask) = locate(key);
        if let Some(word) = self.words.get_mut(index) {
            *word &= !mask;
            self.trim();
        }
    }

    /// Check whether the set contains a buffer key.
    pub fn contains(&self, key: BufferKey) -> bool {
        let (index, mask) = locate(key);
        self.word(index) & mask != 0
    }

    /// Return the union of two sets (`self | other`).
    pub fn union(&self, other: &Self) -> Self {
        let len = self.words.len().max(other.words.len());
        self.zip_words(other, len, |a, b| a | b)
    }

    /// Return the intersection of two sets (`self & other`).
    pub fn intersection(&self, other: &Self) -> Self {
        let len = self.words.len().min(other.words.len());
        self.zip_words(other, len, |a, b| a & b)
    }

    /// Return the set difference (`self - other`).
    pub fn difference(&self, other: &Self) -> Self {
        self.zip_words(other, self.words.len(), |a, b| a & !b)
    }

    /// Check whether `self` is a subset of `other`.
    pub fn is_subset(&self, other: &Self) -> bool {
        self.words
            .iter()
            .enumerate()
            .all(|(i, &w)| w & !other.word(i) == 0)
    }

    /// Returns `true` if the set contains no buffers.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Returns the number of buffers in the set.
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterate over the buffer keys in the set, in ascending order.
    pub fn iter(&self) -> BufferSetIter<'_> {
        BufferSetIter {
            words: &self.words,
            pending: 0,
            base: 0,
            next_base: 0,
        }
    }
}

impl fmt::Display for BufferSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, key) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}")?;
        }
        f.write_str("}")
    }
}

impl FromIterator<BufferKey> for BufferSet {
    fn from_iter<I: IntoIterator<Item = BufferKey>>(iter: I) -> Self {
        let mut set = Self::empty();
        for key in iter {
            set.insert(key);
        }
        set
    }
}

impl From<BufferKey> for BufferSet {
    fn from(key: BufferKey) -> Self {
        let mut set = Self::empty();
        set.insert(key);
        set
    }
}

impl<const N: usize> From<[BufferKey; N]> for BufferSet {
    fn from(keys: [BufferKey; N]) -> Self {
        keys.into_iter().collect()
    }
}

impl BitOr for BufferKey {
    type Output = BufferSet;

    fn bitor(self, rhs: BufferKey) -> BufferSet {
        BufferSet::from([self, rhs])
    }
}

impl BitOr<BufferKey> for BufferSet {
    type Output = BufferSet;

    fn bitor(mut self, rhs: BufferKey) -> BufferSet {
        self.insert(rhs);
        self
    }
}

impl BitOr for BufferSet {
    type Output = BufferSet;

    fn bitor(self, rhs: BufferSet) -> BufferSet {
        self.union(&rhs)
    }
}

impl BitOr<&BufferSet> for BufferSet {
    type Output = BufferSet;

    fn bitor(self, rhs: &BufferSet) -> BufferSet {
        self.union(rhs)
    }
}

impl<'a> IntoIterator for &'a BufferSet {
    type Item = BufferKey;
    type IntoIter = BufferSetIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over buffer keys in a [`BufferSet`], in ascending order.
pub struct BufferSetIter<'a> {
    words: &'a [u64],
    /// Bits of the current word not yet yielded.
    pending: u64,
    base: u32,
    next_base: u32,
}

impl Iterator for BufferSetIter<'_> {
    type Item = BufferKey;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pending == 0 {
            let (&word, rest) = self.words.split_first()?;
            self.words = rest;
            self.pending = word;
            self.base = self.next_base;
            self.next_base += WORD_BITS;
        }
        let bit = self.pending.trailing_zeros();
        self.pending &= self.pending - 1;
        Some(BufferKey(self.base + bit))
    }
}
