//! Error types for reflection and tagged serialization.

use std::fmt;

use ember_archive::ArchiveError;
use ember_arena::ArenaError;
use ember_core::ObjectHandle;

/// Errors raised while linking type records or serializing through them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReflectError {
    /// No type record is registered under this name.
    UnknownType {
        /// The name that was looked up.
        name: String,
    },
    /// A type names a parent that is not registered.
    UnknownParent {
        /// The child type.
        type_name: String,
        /// The missing parent.
        parent: String,
    },
    /// Following parent links from this type leads back to it.
    InheritanceCycle {
        /// A type on the cycle.
        type_name: String,
    },
    /// A type's parent upcast yields a different Rust type than the
    /// parent record describes.
    ParentMismatch {
        /// The child type.
        type_name: String,
        /// The declared parent.
        parent: String,
    },
    /// The type cannot be default-constructed (a struct, or an abstract
    /// class).
    NotConstructible {
        /// The type that was requested.
        type_name: String,
    },
    /// An object's runtime type does not match the record registered under
    /// its type name.
    TypeMismatch {
        /// The record name.
        type_name: String,
    },
    /// The object was destroyed by a forced arena shutdown.
    ObjectDestroyed {
        /// Handle of the destroyed object.
        handle: ObjectHandle,
    },
    /// The archive recorded an error during the pass.
    Archive(ArchiveError),
    /// The arena refused an allocation.
    Arena(ArenaError),
}

impl fmt::Display for ReflectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownType { name } => write!(f, "unknown type '{name}'"),
            Self::UnknownParent { type_name, parent } => {
                write!(f, "type '{type_name}' has unknown parent '{parent}'")
            }
            Self::InheritanceCycle { type_name } => {
                write!(f, "inheritance cycle through '{type_name}'")
            }
            Self::ParentMismatch { type_name, parent } => {
                write!(
                    f,
                    "upcast of '{type_name}' does not yield the Rust type registered as '{parent}'"
                )
            }
            Self::NotConstructible { type_name } => {
                write!(f, "type '{type_name}' cannot be default-constructed")
            }
            Self::TypeMismatch { type_name } => {
                write!(f, "object does not have the Rust type registered as '{type_name}'")
            }
            Self::ObjectDestroyed { handle } => write!(f, "object {handle} was destroyed"),
            Self::Archive(e) => write!(f, "archive error: {e}"),
            Self::Arena(e) => write!(f, "arena error: {e}"),
        }
    }
}

impl std::error::Error for ReflectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Archive(e) => Some(e),
            Self::Arena(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ArchiveError> for ReflectError {
    fn from(e: ArchiveError) -> Self {
        Self::Archive(e)
    }
}

impl From<ArenaError> for ReflectError {
    fn from(e: ArenaError) -> Self {
        Self::Arena(e)
    }
}
