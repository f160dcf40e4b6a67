//! Per-object state flags.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Bit set describing an object's role and load state.
///
/// Flags are stored alongside the object in its arena cell, so every
/// pointer to the object observes the same set. A newly allocated object
/// starts with [`ObjectFlags::NONE`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ObjectFlags(u32);

impl ObjectFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// Exported by a package under a public name.
    pub const PUBLIC: Self = Self(1 << 0);
    /// Never saved: references to the object are written as null.
    pub const TRANSIENT: Self = Self(1 << 1);
    /// Constructed by a package load whose payload has not been read yet.
    pub const NEEDS_LOAD: Self = Self(1 << 2);
    /// Loaded from a package payload and `post_load` has run.
    pub const WAS_LOADED: Self = Self(1 << 3);

    const NAMES: [(Self, &'static str); 4] = [
        (Self::PUBLIC, "PUBLIC"),
        (Self::TRANSIENT, "TRANSIENT"),
        (Self::NEEDS_LOAD, "NEEDS_LOAD"),
        (Self::WAS_LOADED, "WAS_LOADED"),
    ];

    /// Wrap raw bits.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bits.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether no flag is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether every flag in `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether any flag in `other` is set.
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// `self` with the flags in `other` added.
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// `self` with the flags in `other` cleared.
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl BitOr for ObjectFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for ObjectFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

impl fmt::Display for ObjectFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NONE");
        }
        let mut rest = *self;
        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                first = false;
                rest = rest.difference(flag);
            }
        }
        if !rest.is_empty() {
            if !first {
                f.write_str(" | ")?;
            }
            write!(f, "{:#x}", rest.0)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_operations() {
        let flags = ObjectFlags::PUBLIC | ObjectFlags::WAS_LOADED;
        assert!(flags.contains(ObjectFlags::PUBLIC));
        assert!(!flags.contains(ObjectFlags::PUBLIC | ObjectFlags::TRANSIENT));
        assert!(flags.intersects(ObjectFlags::PUBLIC | ObjectFlags::TRANSIENT));
        assert_eq!(flags.difference(ObjectFlags::PUBLIC), ObjectFlags::WAS_LOADED);
        assert!(ObjectFlags::default().is_empty());
        assert!(flags.contains(ObjectFlags::NONE));
    }

    #[test]
    fn display_names_known_bits() {
        assert_eq!(ObjectFlags::NONE.to_string(), "NONE");
        assert_eq!(
            (ObjectFlags::PUBLIC | ObjectFlags::NEEDS_LOAD).to_string(),
            "PUBLIC | NEEDS_LOAD"
        );
        assert_eq!(
            (ObjectFlags::TRANSIENT | ObjectFlags::from_bits(1 << 8)).to_string(),
            "TRANSIENT | 0x100"
        );
    }
}
