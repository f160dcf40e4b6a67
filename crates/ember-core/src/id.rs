//! Object identifiers.

use std::fmt;

/// Identifies an object slot in an arena at a particular generation.
///
/// A handle is a plain value: it carries no ownership and keeps nothing
/// alive. It is valid only while `generation` equals the generation
/// currently stored in slot `index`. Once the object is destroyed the slot's
/// generation moves on and every outstanding copy of the handle becomes
/// permanently stale, even if the slot is later reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle {
    /// Slot index within the arena.
    pub index: u32,
    /// Generation of the slot at the time the handle was issued.
    pub generation: u32,
}

impl ObjectHandle {
    /// Create a handle from its raw parts.
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Pack the handle into a single `u64` (index in the upper half).
    pub const fn to_bits(self) -> u64 {
        ((self.index as u64) << 32) | self.generation as u64
    }

    /// Inverse of [`to_bits`](Self::to_bits).
    pub const fn from_bits(bits: u64) -> Self {
        Self {
            index: (bits >> 32) as u32,
            generation: bits as u32,
        }
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}
