//! Archive error types.

use std::error::Error;
use std::fmt;

/// The first failure recorded by an archive.
///
/// Archives keep this as a sticky flag: once set, reads produce zeroed
/// values and further errors are ignored, so a caller can run a whole
/// serialization pass and check the outcome once at the end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArchiveError {
    /// A read ran past the end of the data.
    UnexpectedEof {
        /// Position of the read.
        position: u64,
        /// Bytes requested.
        requested: u64,
        /// Total size of the archive.
        total: u64,
    },
    /// A length prefix exceeded the configured ceiling or the bytes left.
    LengthExceedsLimit {
        /// Length found in the data.
        length: u64,
        /// Largest acceptable length.
        limit: u64,
    },
    /// A boolean was stored as something other than 0 or 1.
    InvalidBool {
        /// The stored value.
        value: u32,
    },
    /// A string was not valid UTF-8.
    InvalidUtf8 {
        /// Position of the string payload.
        position: u64,
    },
    /// A seek targeted a position past the end of the data.
    SeekOutOfBounds {
        /// Requested position.
        position: u64,
        /// Total size of the archive.
        total: u64,
    },
    /// This archive cannot carry object references.
    ObjectReferencesUnsupported,
    /// Structurally invalid data.
    Malformed {
        /// Human-readable description of what went wrong.
        detail: String,
    },
}

impl fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof {
                position,
                requested,
                total,
            } => write!(
                f,
                "unexpected end of archive: read of {requested} bytes at {position}, size {total}"
            ),
            Self::LengthExceedsLimit { length, limit } => {
                write!(f, "length {length} exceeds limit {limit}")
            }
            Self::InvalidBool { value } => write!(f, "invalid boolean value {value}"),
            Self::InvalidUtf8 { position } => write!(f, "invalid UTF-8 string at {position}"),
            Self::SeekOutOfBounds { position, total } => {
                write!(f, "seek to {position} past end of archive (size {total})")
            }
            Self::ObjectReferencesUnsupported => {
                write!(f, "archive does not support object references")
            }
            Self::Malformed { detail } => write!(f, "malformed archive: {detail}"),
        }
    }
}

impl Error for ArchiveError {}
