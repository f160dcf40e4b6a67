//! Where unmounted packages come from.
//!
//! When a load follows an import into a package that is not mounted, the
//! [`PackageLinker`](crate::PackageLinker) asks its sources, in the order
//! they were added, for the package bytes.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::error::PackageError;

/// Provides package bytes by name.
pub trait PackageSource: Send + Sync {
    /// Bytes of package `name`, or `None` if this source does not have it.
    fn read_package(&self, name: &str) -> Result<Option<Arc<[u8]>>, PackageError>;
}

/// Packages held in memory.
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    packages: HashMap<String, Arc<[u8]>>,
}

impl MemorySource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace package `name`.
    pub fn insert(&mut self, name: &str, bytes: impl Into<Arc<[u8]>>) {
        self.packages.insert(name.to_string(), bytes.into());
    }

    /// Number of packages held.
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether no packages are held.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

impl PackageSource for MemorySource {
    fn read_package(&self, name: &str) -> Result<Option<Arc<[u8]>>, PackageError> {
        Ok(self.packages.get(name).cloned())
    }
}

/// Packages stored as `<root>/<name>.embr` files.
///
/// Names may contain `/` separated directories and dots. Names with empty,
/// `.`, `..` or absolute components are rejected with
/// [`PackageError::InvalidName`].
#[derive(Clone, Debug)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    /// File extension of package files.
    pub const EXTENSION: &'static str = "embr";

    /// Serve packages from `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path package `name` is read from.
    pub fn path_of(&self, name: &str) -> Result<PathBuf, PackageError> {
        let relative = Path::new(name);
        let normal = !name.is_empty()
            && !name.ends_with(|c: char| c == '/' || c == '\\')
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !normal {
            return Err(PackageError::InvalidName { name: name.to_string() });
        }
        Ok(self.root.join(format!("{name}.{}", Self::EXTENSION)))
    }
}

impl PackageSource for DirectorySource {
    fn read_package(&self, name: &str) -> Result<Option<Arc<[u8]>>, PackageError> {
        let path = self.path_of(name)?;
        match std::fs::read(path) {
            Ok(bytes) => Ok(Some(bytes.into())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
