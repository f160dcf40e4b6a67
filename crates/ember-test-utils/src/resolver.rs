//! An in-memory [`PackageResolver`] for tests that serialize object
//! references without a real package.

use ember_archive::{PackageIndex, PackageResolver};
use ember_arena::ObjectPtr;

/// Resolves references against a flat table: entry `i` is export `i`.
///
/// Writing through it appends unseen objects to the table, so a table
/// filled by a writing pass can be handed to the reading pass.
#[derive(Debug, Default)]
pub struct ObjectTable {
    pub objects: Vec<ObjectPtr>,
}

impl ObjectTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_objects(objects: Vec<ObjectPtr>) -> Self {
        Self { objects }
    }
}

impl PackageResolver for ObjectTable {
    fn object_to_index(&mut self, object: &ObjectPtr) -> PackageIndex {
        let index = match self.objects.iter().position(|o| o == object) {
            Some(index) => index,
            None => {
                self.objects.push(object.clone());
                self.objects.len() - 1
            }
        };
        PackageIndex::export(index)
    }

    fn index_to_object(&mut self, index: PackageIndex) -> Option<ObjectPtr> {
        self.objects.get(index.export_index()?).cloned()
    }
}
