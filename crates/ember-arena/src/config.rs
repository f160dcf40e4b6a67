//! Arena configuration parameters.

use crate::error::ArenaError;

/// Configuration for an [`ObjectArena`](crate::ObjectArena).
///
/// Validated at construction; all values are immutable after creation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Maximum number of live objects (and slots) the arena can hold.
    ///
    /// Default: 2_097_152. Exceeding it is a fatal misconfiguration, not a
    /// recoverable condition.
    pub max_objects: u32,

    /// Number of slots per chunk.
    ///
    /// Default: 65_536. Chunks are allocated on first use and never moved,
    /// so slot addresses are stable for the arena's lifetime.
    pub chunk_size: u32,
}

impl ArenaConfig {
    /// Default object capacity.
    pub const DEFAULT_MAX_OBJECTS: u32 = 2 * 1024 * 1024;

    /// Default slots per chunk.
    pub const DEFAULT_CHUNK_SIZE: u32 = 64 * 1024;

    /// Create a config for the given capacity with the default chunk size.
    pub fn new(max_objects: u32) -> Self {
        Self {
            max_objects,
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
        }
    }

    /// Number of chunks needed to cover `max_objects`.
    pub fn chunk_count(&self) -> usize {
        (self.max_objects as usize).div_ceil(self.chunk_size as usize)
    }

    /// Check that the configuration describes a usable arena.
    pub fn validate(&self) -> Result<(), ArenaError> {
        if self.max_objects == 0 {
            return Err(ArenaError::InvalidConfig {
                reason: "max_objects must be at least 1".into(),
            });
        }
        if self.chunk_size == 0 {
            return Err(ArenaError::InvalidConfig {
                reason: "chunk_size must be at least 1".into(),
            });
        }
        Ok(())
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_OBJECTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_uses_64k_chunks() {
        let config = ArenaConfig::default();
        assert_eq!(config.chunk_size, 65_536);
        assert_eq!(config.chunk_count(), 32);
    }

    #[test]
    fn partial_chunk_rounds_up() {
        let config = ArenaConfig {
            max_objects: 10,
            chunk_size: 4,
        };
        assert_eq!(config.chunk_count(), 3);
    }

    #[test]
    fn zero_capacity_rejected() {
        assert!(matches!(
            ArenaConfig::new(0).validate(),
            Err(ArenaError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn zero_chunk_size_rejected() {
        let config = ArenaConfig {
            max_objects: 8,
            chunk_size: 0,
        };
        assert!(config.validate().is_err());
    }
}
