//! Arena-specific error types.

use std::error::Error;
use std::fmt;

/// Errors that can occur during arena operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArenaError {
    /// Every slot is occupied or retired. Indicates a misconfigured
    /// capacity; callers must not retry.
    CapacityExceeded {
        /// Configured maximum object count.
        capacity: u32,
    },
    /// The arena has been shut down and no longer accepts objects.
    ShutDown,
    /// The configuration failed validation.
    InvalidConfig {
        /// What was wrong with it.
        reason: String,
    },
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityExceeded { capacity } => {
                write!(f, "object arena capacity exceeded ({capacity} objects)")
            }
            Self::ShutDown => write!(f, "object arena has been shut down"),
            Self::InvalidConfig { reason } => write!(f, "invalid arena config: {reason}"),
        }
    }
}

impl Error for ArenaError {}
