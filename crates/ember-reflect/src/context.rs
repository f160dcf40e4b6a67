//! The object context: one arena plus the registry describing its objects.

use std::sync::Arc;

use ember_archive::Archive;
use ember_arena::{ArenaConfig, ObjectArena, ObjectPtr, StrongPtr};
use ember_core::Object;

use crate::error::ReflectError;
use crate::registry::TypeRegistry;
use crate::tagged::{serialize_tagged, TaggedContext, TaggedReport};

/// Entry point for creating, serializing and tearing down objects.
///
/// Bundles the arena and the linked registry. Cloning shares both.
#[derive(Clone, Debug)]
pub struct ObjectContext {
    arena: Arc<ObjectArena>,
    registry: Arc<TypeRegistry>,
}

impl ObjectContext {
    /// Link every type in `registry`, then create the arena.
    pub fn new(config: ArenaConfig, registry: TypeRegistry) -> Result<Self, ReflectError> {
        registry.link_all()?;
        let arena = ObjectArena::new(config)?;
        log::info!(
            "ember: object context ready ({} types, capacity {})",
            registry.len(),
            arena.capacity()
        );
        Ok(Self {
            arena,
            registry: Arc::new(registry),
        })
    }

    /// Build a context from an existing arena and registry. Links the
    /// registry.
    pub fn from_parts(arena: Arc<ObjectArena>, registry: Arc<TypeRegistry>) -> Result<Self, ReflectError> {
        registry.link_all()?;
        Ok(Self { arena, registry })
    }

    /// The arena objects live in.
    pub fn arena(&self) -> &Arc<ObjectArena> {
        &self.arena
    }

    /// The type registry.
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Move `value` into the arena. Its type must be registered.
    pub fn create<T: Object>(&self, value: T) -> Result<StrongPtr<T>, ReflectError> {
        self.registry.record_for(&value)?;
        Ok(self.arena.insert(value)?)
    }

    /// Default-construct an instance of the class registered as `class`.
    pub fn construct(&self, class: &str) -> Result<ObjectPtr, ReflectError> {
        let object = self.registry.construct(class)?;
        Ok(self.arena.allocate(object)?)
    }

    /// Serialize `object`'s properties through `ar` in either direction.
    ///
    /// Takes the object's write lock for the duration of the pass.
    pub fn serialize_object(&self, object: &ObjectPtr, ar: &mut dyn Archive) -> Result<TaggedReport, ReflectError> {
        let mut guard = object.try_write().ok_or(ReflectError::ObjectDestroyed {
            handle: object.handle(),
        })?;
        let target: &mut dyn Object = &mut *guard;
        let record = self.registry.record_for(target)?;

        let mut cx = TaggedContext::new(&self.registry);
        serialize_tagged(record, target.as_any_mut(), ar, &mut cx);
        match ar.error() {
            Some(e) => Err(ReflectError::Archive(e.clone())),
            None => Ok(cx.into_report()),
        }
    }

    /// Construct an instance of `class`, load its properties from `ar`,
    /// then run its `post_load` hook.
    pub fn load_object(&self, class: &str, ar: &mut dyn Archive) -> Result<ObjectPtr, ReflectError> {
        let object = self.construct(class)?;
        self.serialize_object(&object, ar)?;
        if let Some(mut guard) = object.try_write() {
            guard.post_load();
        }
        Ok(object)
    }

    /// Destroy every live object. Pointers that outlive this report their
    /// object as gone.
    pub fn shutdown(&self) {
        self.arena.shutdown();
    }
}
