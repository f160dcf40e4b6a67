//! Object references stored as qualified names.
//!
//! [`ObjectNameArchive`] writes each reference as the string
//! `"<package>.<export>"` naming the export that holds the object, and an
//! empty string for null. On load the name is split at its last `.`, then
//! looked up among constructed exports with [`PackageLinker::find_object`]
//! and, failing that, loaded with [`PackageLinker::load_object`].
//!
//! The stream is independent of any package's tables, so an object written
//! this way can be read back by any linker that can reach the same
//! packages.

use ember_archive::{Archive, ArchiveProxy};
use ember_arena::ObjectPtr;

use crate::linker::PackageLinker;

/// Split `"<package>.<export>"` at its last `.`.
///
/// Returns `None` unless both halves are non-empty.
pub fn split_qualified_name(name: &str) -> Option<(&str, &str)> {
    name.rsplit_once('.')
        .filter(|(package, object_name)| !package.is_empty() && !object_name.is_empty())
}

/// Proxy that stores object references as qualified export names.
///
/// References that cannot be named (the object is not exported, or its
/// export name contains a `.`) are written as null. Names that do not
/// resolve load as null. Both are counted by
/// [`unresolved`](Self::unresolved).
pub struct ObjectNameArchive<'a> {
    inner: &'a mut dyn Archive,
    linker: &'a mut PackageLinker,
    load_missing: bool,
    unresolved: usize,
}

impl<'a> ObjectNameArchive<'a> {
    /// Wrap `inner`, naming and resolving references through `linker`.
    pub fn new(inner: &'a mut dyn Archive, linker: &'a mut PackageLinker) -> Self {
        Self {
            inner,
            linker,
            load_missing: true,
            unresolved: 0,
        }
    }

    /// Only resolve names to objects that are already constructed; never
    /// mount or load.
    pub fn find_only(mut self) -> Self {
        self.load_missing = false;
        self
    }

    /// References written as null or read as null because they could not
    /// be named or resolved.
    pub fn unresolved(&self) -> usize {
        self.unresolved
    }

    fn name_of(&self, object: &ObjectPtr) -> Option<String> {
        let Some((package, object_name)) = self.linker.object_path(object) else {
            log::warn!(
                "name archive: {} '{}' is not exported, writing null",
                object.handle(),
                object.type_name()
            );
            return None;
        };
        if object_name.contains('.') {
            log::warn!("name archive: export '{object_name}' of '{package}' cannot be named, writing null");
            return None;
        }
        Some(format!("{package}.{object_name}"))
    }

    fn resolve(&mut self, name: &str) -> Option<ObjectPtr> {
        let Some((package, object_name)) = split_qualified_name(name) else {
            log::warn!("name archive: '{name}' is not a qualified object name");
            return None;
        };
        if let Some(object) = self.linker.find_object(package, object_name) {
            return Some(object);
        }
        if !self.load_missing {
            log::debug!("name archive: '{name}' is not loaded");
            return None;
        }
        match self.linker.load_object(package, object_name) {
            Ok(object) => Some(object),
            Err(e) => {
                log::warn!("name archive: cannot load '{name}': {e}");
                None
            }
        }
    }
}

impl ArchiveProxy for ObjectNameArchive<'_> {
    fn inner(&self) -> &dyn Archive {
        &*self.inner
    }

    fn inner_mut(&mut self) -> &mut dyn Archive {
        &mut *self.inner
    }

    fn proxy_serialize_object(&mut self, object: &mut Option<ObjectPtr>) {
        if self.inner.is_writing() {
            let mut name = match object.as_ref() {
                None => String::new(),
                Some(o) => match self.name_of(o) {
                    Some(name) => name,
                    None => {
                        self.unresolved += 1;
                        String::new()
                    }
                },
            };
            self.inner.serialize_string(&mut name);
            return;
        }

        let mut name = String::new();
        self.inner.serialize_string(&mut name);
        if self.inner.has_error() || name.is_empty() {
            *object = None;
            return;
        }
        *object = self.resolve(&name);
        if object.is_none() {
            self.unresolved += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_names_split_at_the_last_dot() {
        assert_eq!(split_qualified_name("level.scout"), Some(("level", "scout")));
        assert_eq!(split_qualified_name("maps/v1.2.scout"), Some(("maps/v1.2", "scout")));
        assert_eq!(split_qualified_name("scout"), None);
        assert_eq!(split_qualified_name(".scout"), None);
        assert_eq!(split_qualified_name("level."), None);
    }
}
