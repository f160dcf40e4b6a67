//! Package-index archives.
//!
//! Inside a package, object references are stored as a [`PackageIndex`]:
//! a signed 32-bit reference into the package's export table (positive),
//! import table (negative), or null (zero). [`PackageIndexArchive`] does
//! the translation in both directions through a [`PackageResolver`]
//! supplied by the package layer, which may load objects on demand.

use std::fmt;

use ember_arena::ObjectPtr;

use crate::archive::Archive;
use crate::proxy::ArchiveProxy;

/// A reference into a package's object tables.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PackageIndex(i32);

impl PackageIndex {
    /// The null reference.
    pub const NULL: Self = Self(0);

    /// Reference to export table entry `index`, if it is representable.
    pub fn try_export(index: usize) -> Option<Self> {
        let raw = i32::try_from(index.checked_add(1)?).ok()?;
        Some(Self(raw))
    }

    /// Reference to import table entry `index`, if it is representable.
    pub fn try_import(index: usize) -> Option<Self> {
        let raw = i32::try_from(index.checked_add(1)?).ok()?;
        Some(Self(-raw))
    }

    /// Reference to export table entry `index`.
    ///
    /// # Panics
    ///
    /// If `index` is `i32::MAX` or larger; see [`try_export`](Self::try_export).
    pub fn export(index: usize) -> Self {
        Self::try_export(index).expect("export table index fits in i32")
    }

    /// Reference to import table entry `index`.
    ///
    /// # Panics
    ///
    /// If `index` is `i32::MAX` or larger; see [`try_import`](Self::try_import).
    pub fn import(index: usize) -> Self {
        Self::try_import(index).expect("import table index fits in i32")
    }

    /// Wrap a raw on-disk value.
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// The raw on-disk value.
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Whether this is the null reference.
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Export table position, if this references an export.
    pub fn export_index(self) -> Option<usize> {
        (self.0 > 0).then(|| (self.0 - 1) as usize)
    }

    /// Import table position, if this references an import.
    pub fn import_index(self) -> Option<usize> {
        (self.0 < 0).then(|| (-(self.0 as i64) - 1) as usize)
    }

    /// Serialize the raw value through `ar`.
    pub fn serialize(&mut self, ar: &mut dyn Archive) {
        ar.serialize_i32(&mut self.0);
    }
}

impl fmt::Display for PackageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.export_index(), self.import_index()) {
            (Some(i), _) => write!(f, "export {i}"),
            (_, Some(i)) => write!(f, "import {i}"),
            _ => write!(f, "null"),
        }
    }
}

/// Maps objects to package indices and back.
///
/// Implemented by the package layer. `index_to_object` may construct and
/// load the referenced object if it is not resident yet.
pub trait PackageResolver {
    /// Index under which `object` is stored, or [`PackageIndex::NULL`] if
    /// the package cannot reference it.
    fn object_to_index(&mut self, object: &ObjectPtr) -> PackageIndex;

    /// Object named by `index`, loading it if necessary.
    fn index_to_object(&mut self, index: PackageIndex) -> Option<ObjectPtr>;
}

/// Proxy that stores object references as package indices.
pub struct PackageIndexArchive<'a> {
    inner: &'a mut dyn Archive,
    resolver: &'a mut dyn PackageResolver,
}

impl<'a> PackageIndexArchive<'a> {
    /// Wrap `inner`, resolving references through `resolver`.
    pub fn new(inner: &'a mut dyn Archive, resolver: &'a mut dyn PackageResolver) -> Self {
        Self { inner, resolver }
    }
}

impl ArchiveProxy for PackageIndexArchive<'_> {
    fn inner(&self) -> &dyn Archive {
        &*self.inner
    }

    fn inner_mut(&mut self) -> &mut dyn Archive {
        &mut *self.inner
    }

    fn proxy_serialize_object(&mut self, object: &mut Option<ObjectPtr>) {
        if self.inner.is_writing() {
            let mut index = object
                .as_ref()
                .map_or(PackageIndex::NULL, |o| self.resolver.object_to_index(o));
            index.serialize(&mut *self.inner);
            return;
        }

        let mut index = PackageIndex::NULL;
        index.serialize(&mut *self.inner);
        if self.inner.has_error() || index.is_null() {
            *object = None;
            return;
        }
        *object = self.resolver.index_to_object(index);
        if object.is_none() {
            log::warn!("package archive: {index} did not resolve to an object");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryReader, MemoryWriter};
    use ember_arena::{ArenaConfig, ObjectArena};

    struct Marker(u32);
    ember_core::impl_object!(Marker, "Marker");

    /// Resolver over a flat list: object i is export i.
    struct ListResolver {
        objects: Vec<ObjectPtr>,
    }

    impl PackageResolver for ListResolver {
        fn object_to_index(&mut self, object: &ObjectPtr) -> PackageIndex {
            self.objects
                .iter()
                .position(|o| o == object)
                .map_or(PackageIndex::NULL, PackageIndex::export)
        }

        fn index_to_object(&mut self, index: PackageIndex) -> Option<ObjectPtr> {
            self.objects.get(index.export_index()?).cloned()
        }
    }

    #[test]
    fn index_encoding() {
        assert!(PackageIndex::NULL.is_null());
        assert_eq!(PackageIndex::export(0).raw(), 1);
        assert_eq!(PackageIndex::import(0).raw(), -1);
        assert_eq!(PackageIndex::export(4).export_index(), Some(4));
        assert_eq!(PackageIndex::import(2).import_index(), Some(2));
        assert_eq!(PackageIndex::import(2).export_index(), None);
        assert_eq!(PackageIndex::from_raw(i32::MIN).import_index(), Some(i32::MAX as usize));
        assert_eq!(PackageIndex::export(3).to_string(), "export 3");
    }

    #[test]
    fn oversized_table_positions_have_no_index() {
        let last = i32::MAX as usize - 1;
        assert_eq!(PackageIndex::try_export(last).map(PackageIndex::raw), Some(i32::MAX));
        assert_eq!(PackageIndex::try_import(last).map(PackageIndex::raw), Some(-i32::MAX));
        assert_eq!(PackageIndex::try_export(last + 1), None);
        assert_eq!(PackageIndex::try_import(last + 1), None);
        assert_eq!(PackageIndex::try_export(usize::MAX), None);
        assert_eq!(PackageIndex::try_import(usize::MAX), None);
    }

    #[test]
    fn references_round_trip_as_indices() {
        let arena = ObjectArena::new(ArenaConfig::new(8)).unwrap();
        let a = arena.insert(Marker(1)).unwrap().into_object();
        let b = arena.insert(Marker(2)).unwrap().into_object();
        let mut resolver = ListResolver {
            objects: vec![a.clone(), b.clone()],
        };

        let mut writer = MemoryWriter::new();
        {
            let mut ar = PackageIndexArchive::new(&mut writer, &mut resolver);
            ar.serialize_object(&mut Some(b.clone()));
            ar.serialize_object(&mut None);
            ar.serialize_object(&mut Some(a.clone()));
        }
        let bytes = writer.into_inner();
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[..4], &2i32.to_le_bytes());

        let mut reader = MemoryReader::new(bytes);
        let mut ar = PackageIndexArchive::new(&mut reader, &mut resolver);
        let mut slots: [Option<ObjectPtr>; 3] = [None, Some(a.clone()), None];
        for slot in &mut slots {
            ar.serialize_object(slot);
        }
        assert_eq!(slots[0].as_ref(), Some(&b));
        assert!(slots[1].is_none());
        assert_eq!(slots[2].as_ref(), Some(&a));
    }
}
