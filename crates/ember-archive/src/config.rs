//! Archive configuration.

/// Limits applied by an archive while reading.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveConfig {
    /// Largest length prefix (string bytes or array elements) a read will
    /// accept before allocating. Larger values set the archive's error flag.
    ///
    /// Default: `i32::MAX`.
    pub max_serialize_size: u64,
}

impl ArchiveConfig {
    /// Default length ceiling.
    pub const DEFAULT_MAX_SERIALIZE_SIZE: u64 = i32::MAX as u64;

    /// Create a config with the given length ceiling.
    pub fn new(max_serialize_size: u64) -> Self {
        Self { max_serialize_size }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_SERIALIZE_SIZE)
    }
}
