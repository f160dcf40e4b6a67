//! Archives that walk object references without producing bytes.
//!
//! Run a writing serialization pass over an object through one of these to
//! visit every object reference it holds: [`ReferenceCollector`] gathers
//! them, [`ReferenceReplacer`] rewrites them.

use std::collections::HashSet;

use ember_arena::ObjectPtr;
use ember_core::ObjectHandle;

use crate::archive::{Archive, ArchiveMode};
use crate::error::ArchiveError;
use crate::proxy::ArchiveProxy;

/// Writing archive that discards its bytes and only tracks size.
///
/// Useful on its own to measure how large a serialized value would be.
#[derive(Debug, Default)]
pub struct NullArchive {
    position: u64,
    len: u64,
    error: Option<ArchiveError>,
}

impl NullArchive {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Archive for NullArchive {
    fn mode(&self) -> ArchiveMode {
        ArchiveMode::Writing
    }

    fn serialize_bytes(&mut self, data: &mut [u8]) {
        self.position += data.len() as u64;
        self.len = self.len.max(self.position);
    }

    fn seek(&mut self, position: u64) {
        self.position = position;
    }

    fn tell(&self) -> u64 {
        self.position
    }

    fn total_size(&self) -> u64 {
        self.len
    }

    fn error(&self) -> Option<&ArchiveError> {
        self.error.as_ref()
    }

    fn set_error(&mut self, error: ArchiveError) {
        self.error.get_or_insert(error);
    }

    fn serialize_object(&mut self, _object: &mut Option<ObjectPtr>) {}
}

/// Collects every distinct object referenced during a writing pass, in
/// first-seen order.
#[derive(Debug, Default)]
pub struct ReferenceCollector {
    sink: NullArchive,
    seen: HashSet<ObjectHandle>,
    found: Vec<ObjectPtr>,
}

impl ReferenceCollector {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// References collected so far.
    pub fn references(&self) -> &[ObjectPtr] {
        &self.found
    }

    /// Consume the collector and return its references.
    pub fn into_references(self) -> Vec<ObjectPtr> {
        self.found
    }
}

impl ArchiveProxy for ReferenceCollector {
    fn inner(&self) -> &dyn Archive {
        &self.sink
    }

    fn inner_mut(&mut self) -> &mut dyn Archive {
        &mut self.sink
    }

    fn proxy_serialize_object(&mut self, object: &mut Option<ObjectPtr>) {
        if let Some(object) = object {
            if self.seen.insert(object.handle()) {
                self.found.push(object.clone());
            }
        }
    }
}

/// Rewrites references to one object into references to another during a
/// writing pass.
#[derive(Debug)]
pub struct ReferenceReplacer {
    sink: NullArchive,
    from: ObjectHandle,
    to: Option<ObjectPtr>,
    replaced: usize,
}

impl ReferenceReplacer {
    /// Replace references to `from` with `to` (`None` clears them).
    pub fn new(from: ObjectHandle, to: Option<ObjectPtr>) -> Self {
        Self {
            sink: NullArchive::new(),
            from,
            to,
            replaced: 0,
        }
    }

    /// Number of references rewritten so far.
    pub fn replaced(&self) -> usize {
        self.replaced
    }
}

impl ArchiveProxy for ReferenceReplacer {
    fn inner(&self) -> &dyn Archive {
        &self.sink
    }

    fn inner_mut(&mut self) -> &mut dyn Archive {
        &mut self.sink
    }

    fn proxy_serialize_object(&mut self, object: &mut Option<ObjectPtr>) {
        if object.as_ref().is_some_and(|o| o.handle() == self.from) {
            *object = self.to.clone();
            self.replaced += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_arena::{ArenaConfig, ObjectArena};

    struct Node;
    ember_core::impl_object!(Node, "Node");

    #[test]
    fn null_archive_measures_size() {
        let mut sink = NullArchive::new();
        sink.serialize_u64(&mut 1);
        sink.serialize_string(&mut "hey".to_string());
        assert_eq!(sink.total_size(), 8 + 8 + 3);
        sink.seek(0);
        sink.serialize_u32(&mut 0);
        assert_eq!(sink.total_size(), 19);
        assert!(!sink.has_error());
    }

    #[test]
    fn collector_deduplicates_in_first_seen_order() {
        let arena = ObjectArena::new(ArenaConfig::new(8)).unwrap();
        let a = arena.insert(Node).unwrap().into_object();
        let b = arena.insert(Node).unwrap().into_object();

        let mut collector = ReferenceCollector::new();
        for r in [&b, &a, &b] {
            collector.serialize_object(&mut Some(r.clone()));
        }
        collector.serialize_object(&mut None);
        assert_eq!(collector.into_references(), vec![b, a]);
    }

    #[test]
    fn replacer_rewrites_matching_references_only() {
        let arena = ObjectArena::new(ArenaConfig::new(8)).unwrap();
        let old = arena.insert(Node).unwrap().into_object();
        let new = arena.insert(Node).unwrap().into_object();
        let other = arena.insert(Node).unwrap().into_object();

        let mut replacer = ReferenceReplacer::new(old.handle(), Some(new.clone()));
        let mut refs = [Some(old.clone()), Some(other.clone()), None];
        for r in &mut refs {
            replacer.serialize_object(r);
        }
        assert_eq!(replacer.replaced(), 1);
        assert_eq!(refs[0].as_ref(), Some(&new));
        assert_eq!(refs[1].as_ref(), Some(&other));
        assert!(refs[2].is_none());
    }
}
