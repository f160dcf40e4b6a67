//! Strong and weak pointers to arena objects.
//!
//! Both pointer kinds carry the object's [`ObjectHandle`] and compare and
//! hash by it, so two pointers are equal exactly when they name the same
//! object (same slot, same generation).

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, RwLockReadGuard, RwLockWriteGuard};

use ember_core::{Object, ObjectFlags, ObjectHandle, ObjectType};

use crate::arena::ObjectArena;
use crate::raw::CellRef;

/// A type-erased strong pointer.
pub type ObjectPtr = StrongPtr<dyn Object>;

/// A type-erased weak pointer.
pub type WeakObjectPtr = WeakPtr<dyn Object>;

/// Owning pointer to an arena object.
///
/// Holds one unit of the object's strong count. Cloning adds a unit;
/// dropping removes one, and the drop that removes the last unit destroys
/// the object.
///
/// `T` is either a concrete [`Object`] type or `dyn Object`. The object
/// lives behind a reader-writer lock: use [`read`](Self::read) and
/// [`write`](Self::write) to reach it.
pub struct StrongPtr<T: ?Sized + ObjectType = dyn Object> {
    arena: Arc<ObjectArena>,
    handle: ObjectHandle,
    cell: Option<CellRef>,
    _marker: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized + ObjectType> StrongPtr<T> {
    pub(crate) fn from_parts(arena: Arc<ObjectArena>, handle: ObjectHandle, cell: CellRef) -> Self {
        Self {
            arena,
            handle,
            cell: Some(cell),
            _marker: PhantomData,
        }
    }

    fn cell(&self) -> &CellRef {
        self.cell
            .as_ref()
            .expect("cell is only taken during drop")
    }

    /// Handle naming this object.
    pub fn handle(&self) -> ObjectHandle {
        self.handle
    }

    /// Arena the object lives in.
    pub fn arena(&self) -> &Arc<ObjectArena> {
        &self.arena
    }

    /// Name of the reflected type record of the object.
    pub fn type_name(&self) -> &'static str {
        self.cell().get().type_name
    }

    /// Flags currently set on the object.
    pub fn flags(&self) -> ObjectFlags {
        self.cell().get().flags()
    }

    /// Whether every flag in `flags` is set on the object.
    pub fn has_flags(&self, flags: ObjectFlags) -> bool {
        self.flags().contains(flags)
    }

    /// Set `flags` on the object, keeping the others.
    pub fn insert_flags(&self, flags: ObjectFlags) {
        self.cell().get().insert_flags(flags);
    }

    /// Clear `flags` on the object, keeping the others.
    pub fn remove_flags(&self, flags: ObjectFlags) {
        self.cell().get().remove_flags(flags);
    }

    /// Current strong count, including this pointer.
    pub fn strong_count(&self) -> u32 {
        self.arena.live_slot(self.handle.index).strong_count()
    }

    /// Weak references registered against this object's slot.
    pub fn weak_count(&self) -> u32 {
        self.arena.weak_count(self.handle)
    }

    /// Lock the object for shared access.
    ///
    /// # Panics
    ///
    /// If the object was destroyed by [`ObjectArena::shutdown`].
    pub fn read(&self) -> ObjectRef<'_, T> {
        self.try_read()
            .expect("object was destroyed by arena shutdown")
    }

    /// Lock the object for exclusive access.
    ///
    /// # Panics
    ///
    /// If the object was destroyed by [`ObjectArena::shutdown`].
    pub fn write(&self) -> ObjectMut<'_, T> {
        self.try_write()
            .expect("object was destroyed by arena shutdown")
    }

    /// Lock the object for shared access, or `None` after a forced shutdown.
    pub fn try_read(&self) -> Option<ObjectRef<'_, T>> {
        let guard = self
            .cell()
            .get()
            .value
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        T::cast_ref(guard.as_deref()?)?;
        Some(ObjectRef {
            guard,
            _marker: PhantomData,
        })
    }

    /// Lock the object for exclusive access, or `None` after a forced shutdown.
    pub fn try_write(&self) -> Option<ObjectMut<'_, T>> {
        let mut guard = self
            .cell()
            .get()
            .value
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        T::cast_mut(guard.as_deref_mut()?)?;
        Some(ObjectMut {
            guard,
            _marker: PhantomData,
        })
    }

    /// Create a weak pointer to the same object.
    pub fn downgrade(&self) -> WeakPtr<T> {
        WeakPtr::new(Arc::clone(&self.arena), self.handle)
    }

    /// View this pointer as another object type, if the object is one.
    pub fn cast<U: ?Sized + ObjectType>(&self) -> Option<StrongPtr<U>> {
        if !U::matches(self.cell().get().type_id) {
            return None;
        }
        let slot = self.arena.live_slot(self.handle.index);
        Some(StrongPtr::from_parts(
            Arc::clone(&self.arena),
            self.handle,
            slot.retain(self.cell()),
        ))
    }

    /// Erase the static type.
    pub fn into_object(self) -> ObjectPtr {
        self.cast::<dyn Object>()
            .expect("every object can be viewed as dyn Object")
    }
}

impl<T: ?Sized + ObjectType> Clone for StrongPtr<T> {
    fn clone(&self) -> Self {
        let slot = self.arena.live_slot(self.handle.index);
        Self::from_parts(Arc::clone(&self.arena), self.handle, slot.retain(self.cell()))
    }
}

impl<T: ?Sized + ObjectType> Drop for StrongPtr<T> {
    fn drop(&mut self) {
        if let Some(cell) = self.cell.take() {
            self.arena.release(self.handle.index, cell);
        }
    }
}

impl<T: ?Sized + ObjectType> PartialEq for StrongPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle && Arc::ptr_eq(&self.arena, &other.arena)
    }
}

impl<T: ?Sized + ObjectType> Eq for StrongPtr<T> {}

impl<T: ?Sized + ObjectType> Hash for StrongPtr<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.handle.hash(state);
    }
}

impl<T: ?Sized + ObjectType> fmt::Debug for StrongPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrongPtr")
            .field("handle", &self.handle)
            .field("type", &self.type_name())
            .field("flags", &self.flags())
            .finish()
    }
}

/// Non-owning pointer to an arena object.
///
/// Never keeps the object alive. [`lock`](Self::lock) re-validates the
/// handle and produces a strong pointer only if the object still exists.
pub struct WeakPtr<T: ?Sized + ObjectType = dyn Object> {
    arena: Arc<ObjectArena>,
    handle: ObjectHandle,
    _marker: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized + ObjectType> WeakPtr<T> {
    fn new(arena: Arc<ObjectArena>, handle: ObjectHandle) -> Self {
        if let Some(slot) = arena.slot(handle.index) {
            slot.add_weak();
        }
        Self {
            arena,
            handle,
            _marker: PhantomData,
        }
    }

    /// Handle of the referenced object (possibly stale).
    pub fn handle(&self) -> ObjectHandle {
        self.handle
    }

    /// Upgrade to a strong pointer if the object is still alive.
    pub fn lock(&self) -> Option<StrongPtr<T>> {
        let cell = self.arena.retain_handle(self.handle)?;
        Some(StrongPtr::from_parts(Arc::clone(&self.arena), self.handle, cell))
    }

    /// Whether the referenced object has been destroyed.
    ///
    /// A `false` answer may be out of date immediately; only
    /// [`lock`](Self::lock) gives a usable guarantee.
    pub fn is_stale(&self) -> bool {
        !self.arena.is_alive(self.handle)
    }

    /// Erase the static type.
    pub fn into_object(self) -> WeakObjectPtr {
        WeakPtr::new(Arc::clone(&self.arena), self.handle)
    }
}

impl<T: ?Sized + ObjectType> Clone for WeakPtr<T> {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.arena), self.handle)
    }
}

impl<T: ?Sized + ObjectType> Drop for WeakPtr<T> {
    fn drop(&mut self) {
        if let Some(slot) = self.arena.slot(self.handle.index) {
            slot.remove_weak();
        }
    }
}

impl<T: ?Sized + ObjectType> PartialEq for WeakPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle && Arc::ptr_eq(&self.arena, &other.arena)
    }
}

impl<T: ?Sized + ObjectType> Eq for WeakPtr<T> {}

impl<T: ?Sized + ObjectType> Hash for WeakPtr<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.handle.hash(state);
    }
}

impl<T: ?Sized + ObjectType> fmt::Debug for WeakPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakPtr")
            .field("handle", &self.handle)
            .finish()
    }
}

/// Shared access to an object, returned by [`StrongPtr::read`].
pub struct ObjectRef<'a, T: ?Sized + ObjectType> {
    guard: RwLockReadGuard<'a, Option<Box<dyn Object>>>,
    _marker: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized + ObjectType> Deref for ObjectRef<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.guard
            .as_deref()
            .and_then(|object| T::cast_ref(object))
            .expect("presence and type are checked when the guard is created")
    }
}

/// Exclusive access to an object, returned by [`StrongPtr::write`].
pub struct ObjectMut<'a, T: ?Sized + ObjectType> {
    guard: RwLockWriteGuard<'a, Option<Box<dyn Object>>>,
    _marker: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized + ObjectType> Deref for ObjectMut<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.guard
            .as_deref()
            .and_then(|object| T::cast_ref(object))
            .expect("presence and type are checked when the guard is created")
    }
}

impl<T: ?Sized + ObjectType> DerefMut for ObjectMut<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.guard
            .as_deref_mut()
            .and_then(|object| T::cast_mut(object))
            .expect("presence and type are checked when the guard is created")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArenaConfig;

    #[derive(Debug, PartialEq)]
    struct Gem {
        carats: u32,
    }
    ember_core::impl_object!(Gem, "Gem");

    struct Rock;
    ember_core::impl_object!(Rock, "Rock");

    fn arena() -> Arc<ObjectArena> {
        ObjectArena::new(ArenaConfig::new(64)).unwrap()
    }

    #[test]
    fn clone_and_drop_track_strong_count() {
        let arena = arena();
        let gem = arena.insert(Gem { carats: 3 }).unwrap();
        assert_eq!(gem.strong_count(), 1);
        let again = gem.clone();
        assert_eq!(gem.strong_count(), 2);
        assert_eq!(gem, again);
        drop(again);
        assert_eq!(gem.strong_count(), 1);
    }

    #[test]
    fn write_guard_mutates_object() {
        let arena = arena();
        let gem = arena.insert(Gem { carats: 3 }).unwrap();
        gem.write().carats = 11;
        assert_eq!(gem.read().carats, 11);
    }

    #[test]
    fn cast_respects_runtime_type() {
        let arena = arena();
        let erased = arena.insert(Gem { carats: 1 }).unwrap().into_object();
        assert_eq!(erased.type_name(), "Gem");
        assert!(erased.cast::<Rock>().is_none());
        let gem = erased.cast::<Gem>().unwrap();
        assert_eq!(gem.read().carats, 1);
        assert_eq!(erased.strong_count(), 2);
    }

    #[test]
    fn flags_are_shared_by_every_pointer_and_reset_on_reuse() {
        let arena = ObjectArena::new(ArenaConfig::new(1)).unwrap();
        let gem = arena.insert(Gem { carats: 1 }).unwrap();
        assert!(gem.flags().is_empty());

        let erased = gem.clone().into_object();
        erased.insert_flags(ObjectFlags::PUBLIC | ObjectFlags::TRANSIENT);
        assert!(gem.has_flags(ObjectFlags::PUBLIC | ObjectFlags::TRANSIENT));
        gem.remove_flags(ObjectFlags::TRANSIENT);
        assert_eq!(erased.flags(), ObjectFlags::PUBLIC);
        assert_eq!(gem.downgrade().lock().unwrap().flags(), ObjectFlags::PUBLIC);

        drop((gem, erased));
        let reused = arena.insert(Gem { carats: 2 }).unwrap();
        assert_eq!(reused.handle().index, 0);
        assert!(reused.flags().is_empty());
    }

    #[test]
    fn weak_does_not_keep_object_alive() {
        let arena = arena();
        let gem = arena.insert(Gem { carats: 2 }).unwrap();
        let weak = gem.downgrade();
        assert_eq!(gem.weak_count(), 1);
        assert!(!weak.is_stale());
        assert_eq!(weak.lock().unwrap().read().carats, 2);

        drop(gem);
        assert!(weak.is_stale());
        assert!(weak.lock().is_none());
    }

    #[test]
    fn weak_lock_rejects_reused_slot() {
        let arena = arena();
        let old = arena.insert(Gem { carats: 1 }).unwrap();
        let weak = old.downgrade();
        let old_handle = old.handle();
        drop(old);

        let new = arena.insert(Gem { carats: 9 }).unwrap();
        assert_eq!(new.handle().index, old_handle.index);
        assert_ne!(new.handle(), old_handle);
        assert!(weak.lock().is_none());
    }

    #[test]
    fn weak_pointers_compare_by_handle() {
        let arena = arena();
        let a = arena.insert(Gem { carats: 1 }).unwrap();
        let b = arena.insert(Gem { carats: 1 }).unwrap();
        assert_eq!(a.downgrade(), a.downgrade());
        assert_ne!(a.downgrade(), b.downgrade());
        assert_ne!(a, b);
    }

    #[test]
    fn pointers_are_send_and_sync() {
        fn assert<T: Send + Sync>() {}
        assert::<ObjectPtr>();
        assert::<StrongPtr<Gem>>();
        assert::<WeakObjectPtr>();
    }
}
