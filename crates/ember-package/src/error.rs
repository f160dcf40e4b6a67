//! Error types for package save, mount and load.

use std::fmt;
use std::io;

use ember_archive::{ArchiveError, PackageIndex};
use ember_reflect::ReflectError;

/// Errors raised by the package layer.
#[derive(Debug)]
pub enum PackageError {
    /// Reading a package from a source failed.
    Io(io::Error),
    /// The data does not start with the `b"EMBR"` magic bytes.
    InvalidMagic {
        /// The first four bytes found.
        found: [u8; 4],
    },
    /// The format version is not supported by this build.
    UnsupportedVersion {
        /// The version found in the header.
        found: u32,
    },
    /// The header or a table entry is inconsistent with the data.
    Malformed {
        /// What was wrong.
        detail: String,
    },
    /// No package with this name is mounted or available from a source.
    UnknownPackage {
        /// The package name.
        name: String,
    },
    /// The package name cannot be mapped to a file below the source root.
    InvalidName {
        /// The rejected name.
        name: String,
    },
    /// A package with this name is already mounted.
    AlreadyMounted {
        /// The package name.
        name: String,
    },
    /// The package has no export with this name.
    UnknownExport {
        /// The package searched.
        package: String,
        /// The export name.
        object_name: String,
    },
    /// The package already has an export with this name.
    DuplicateExport {
        /// The package.
        package: String,
        /// The export name.
        object_name: String,
    },
    /// A package index points outside the package's tables.
    IndexOutOfRange {
        /// The package the index belongs to.
        package: String,
        /// The offending index.
        index: PackageIndex,
    },
    /// A package table has more entries than a package index can address.
    TableFull {
        /// The package being built or saved.
        package: String,
        /// Which table overflowed.
        table: &'static str,
    },
    /// The archive recorded an error.
    Archive(ArchiveError),
    /// Creating or serializing an object failed.
    Reflect(ReflectError),
}

impl fmt::Display for PackageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::InvalidMagic { found } => {
                write!(f, "invalid magic bytes {found:?} (expected b\"EMBR\")")
            }
            Self::UnsupportedVersion { found } => {
                write!(f, "unsupported package format version {found}")
            }
            Self::Malformed { detail } => write!(f, "malformed package: {detail}"),
            Self::UnknownPackage { name } => write!(f, "unknown package '{name}'"),
            Self::InvalidName { name } => write!(f, "invalid package name '{name}'"),
            Self::AlreadyMounted { name } => write!(f, "package '{name}' is already mounted"),
            Self::UnknownExport {
                package,
                object_name,
            } => write!(f, "package '{package}' has no export '{object_name}'"),
            Self::DuplicateExport {
                package,
                object_name,
            } => write!(f, "package '{package}' already exports '{object_name}'"),
            Self::IndexOutOfRange { package, index } => {
                write!(f, "{index} is out of range in package '{package}'")
            }
            Self::TableFull { package, table } => {
                write!(f, "the {table} table of package '{package}' is full")
            }
            Self::Archive(e) => write!(f, "archive error: {e}"),
            Self::Reflect(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for PackageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Archive(e) => Some(e),
            Self::Reflect(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for PackageError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ArchiveError> for PackageError {
    fn from(e: ArchiveError) -> Self {
        Self::Archive(e)
    }
}

impl From<ReflectError> for PackageError {
    fn from(e: ReflectError) -> Self {
        Self::Reflect(e)
    }
}
