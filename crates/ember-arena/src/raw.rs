//! Low-level slot and cell primitives.
//!
//! Every `unsafe` block in this crate lives here. The invariant all of
//! them rely on:
//!
//! - A slot publishes at most one heap-allocated [`ObjectCell`] at a time.
//! - Each unit of the slot's strong count is represented by exactly one
//!   [`CellRef`]. The cell is freed only by the thread whose release takes
//!   the count from one to zero, after unpublishing it.
//! - A count of zero is never incremented ([`Slot::try_retain`] uses a CAS
//!   loop that refuses zero), so a dead cell cannot be resurrected.

#![allow(unsafe_code)]

use std::any::TypeId;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, AtomicU32, Ordering};
use std::sync::RwLock;

use ember_core::{Object, ObjectFlags};

/// Heap cell holding one arena-owned object.
///
/// The object is behind a lock so shared pointers can hand out read and
/// write guards. `None` means the object was destroyed by a forced
/// shutdown while pointers were still outstanding.
pub(crate) struct ObjectCell {
    pub(crate) value: RwLock<Option<Box<dyn Object>>>,
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    flags: AtomicU32,
}

impl ObjectCell {
    pub(crate) fn new(object: Box<dyn Object>) -> Self {
        let type_id = object.as_any().type_id();
        let type_name = object.type_name();
        Self {
            value: RwLock::new(Some(object)),
            type_id,
            type_name,
            flags: AtomicU32::new(ObjectFlags::NONE.bits()),
        }
    }

    pub(crate) fn flags(&self) -> ObjectFlags {
        ObjectFlags::from_bits(self.flags.load(Ordering::Acquire))
    }

    pub(crate) fn insert_flags(&self, flags: ObjectFlags) {
        self.flags.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    pub(crate) fn remove_flags(&self, flags: ObjectFlags) {
        self.flags.fetch_and(!flags.bits(), Ordering::AcqRel);
    }

    /// Run the destruction hook and drop the object.
    ///
    /// Returns `false` if it was already destroyed.
    pub(crate) fn destroy(&self) -> bool {
        let taken = self
            .value
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        match taken {
            Some(mut object) => {
                object.on_destroy();
                drop(object);
                true
            }
            None => false,
        }
    }
}

/// One retained unit of a slot's strong count, pointing at its cell.
pub(crate) struct CellRef(NonNull<ObjectCell>);

// SAFETY: `ObjectCell` is `Send + Sync` (its object is `Send + Sync` and
// guarded by an `RwLock`); `CellRef` is only a counted reference to it.
unsafe impl Send for CellRef {}
// SAFETY: see above.
unsafe impl Sync for CellRef {}

impl CellRef {
    pub(crate) fn get(&self) -> &ObjectCell {
        // SAFETY: a `CellRef` exists only while it holds a unit of the
        // slot's strong count, and the cell is freed only once that count
        // has reached zero.
        unsafe { self.0.as_ref() }
    }
}

/// One arena cell: the published object plus its atomic bookkeeping.
pub(crate) struct Slot {
    cell: AtomicPtr<ObjectCell>,
    generation: AtomicU32,
    strong: AtomicU32,
    weak: AtomicU32,
}

impl Slot {
    pub(crate) const fn new() -> Self {
        Self {
            cell: AtomicPtr::new(ptr::null_mut()),
            generation: AtomicU32::new(0),
            strong: AtomicU32::new(0),
            weak: AtomicU32::new(0),
        }
    }

    pub(crate) fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }

    /// Advance the generation, invalidating every outstanding handle.
    /// Returns the new generation.
    pub(crate) fn bump_generation(&self) -> u32 {
        self.generation
            .fetch_add(1, Ordering::AcqRel)
            .wrapping_add(1)
    }

    pub(crate) fn strong_count(&self) -> u32 {
        self.strong.load(Ordering::Acquire)
    }

    pub(crate) fn weak_count(&self) -> u32 {
        self.weak.load(Ordering::Acquire)
    }

    pub(crate) fn add_weak(&self) {
        self.weak.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn remove_weak(&self) {
        let prev = self.weak.fetch_sub(1, Ordering::Release);
        debug_assert!(prev > 0, "weak reference count underflow");
    }

    /// Publish a fresh cell into an empty slot with a strong count of one.
    ///
    /// Must be called by the allocator that popped this slot off the free
    /// list (or claimed it past the high-water mark). Returns the new
    /// generation and the initial strong reference.
    pub(crate) fn publish(&self, cell: ObjectCell) -> (u32, CellRef) {
        let raw = NonNull::from(Box::leak(Box::new(cell)));
        let previous = self.cell.swap(raw.as_ptr(), Ordering::AcqRel);
        debug_assert!(previous.is_null(), "publishing into an occupied slot");
        self.strong.store(1, Ordering::Release);
        let generation = self.bump_generation();
        (generation, CellRef(raw))
    }

    /// Take a strong reference if the count is non-zero.
    ///
    /// The caller must re-check the generation afterwards: the slot may
    /// have been recycled since it was last observed.
    pub(crate) fn try_retain(&self) -> Option<CellRef> {
        let mut current = self.strong.load(Ordering::Relaxed);
        loop {
            if current == 0 {
                return None;
            }
            assert!(current < u32::MAX, "strong reference count overflow");
            match self.strong.compare_exchange_weak(
                current,
                current + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
        match NonNull::new(self.cell.load(Ordering::Acquire)) {
            Some(raw) => Some(CellRef(raw)),
            None => {
                self.strong.fetch_sub(1, Ordering::AcqRel);
                None
            }
        }
    }

    /// Take another strong reference on behalf of an existing holder.
    pub(crate) fn retain(&self, held: &CellRef) -> CellRef {
        let prev = self.strong.fetch_add(1, Ordering::Relaxed);
        assert!(prev < u32::MAX, "strong reference count overflow");
        CellRef(held.0)
    }

    /// Give back a strong reference.
    ///
    /// Returns the unpublished cell if this was the last one; the caller is
    /// then responsible for destroying the object and recycling the slot.
    pub(crate) fn release(&self, held: CellRef) -> Option<Box<ObjectCell>> {
        let CellRef(_) = held;
        let prev = self.strong.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "strong reference count underflow");
        if prev != 1 {
            return None;
        }
        let raw = NonNull::new(self.cell.swap(ptr::null_mut(), Ordering::AcqRel))?;
        // SAFETY: the strong count reached zero, so no `CellRef` to this
        // cell remains and none can be created (zero is never retained).
        // The swap above unpublished it, so we are its only owner.
        Some(unsafe { Box::from_raw(raw.as_ptr()) })
    }

    /// Unpublish whatever cell remains when the arena itself is dropped.
    pub(crate) fn take_exclusive(&mut self) -> Option<Box<ObjectCell>> {
        let raw = NonNull::new(std::mem::replace(self.cell.get_mut(), ptr::null_mut()))?;
        *self.strong.get_mut() = 0;
        // SAFETY: `&mut self` proves no other thread can reach the slot, and
        // every `CellRef` keeps the arena (and therefore this slot) alive,
        // so none can exist while the arena is being dropped.
        Some(unsafe { Box::from_raw(raw.as_ptr()) })
    }

    #[cfg(test)]
    pub(crate) fn force_generation(&self, generation: u32) {
        self.generation.store(generation, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Token;
    ember_core::impl_object!(Token, "Token");

    #[test]
    fn publish_starts_at_generation_one() {
        let slot = Slot::new();
        let (generation, cell) = slot.publish(ObjectCell::new(Box::new(Token)));
        assert_eq!(generation, 1);
        assert_eq!(slot.strong_count(), 1);
        assert_eq!(cell.get().type_name, "Token");
        assert!(cell.get().flags().is_empty());
        assert!(slot.release(cell).is_some());
    }

    #[test]
    fn retain_refuses_zero() {
        let slot = Slot::new();
        assert!(slot.try_retain().is_none());
        assert_eq!(slot.strong_count(), 0);
    }

    #[test]
    fn only_last_release_unpublishes() {
        let slot = Slot::new();
        let (_, first) = slot.publish(ObjectCell::new(Box::new(Token)));
        let second = slot.try_retain().unwrap();
        assert!(slot.release(first).is_none());
        let cell = slot.release(second).unwrap();
        assert!(cell.destroy());
        assert!(!cell.destroy());
        assert!(slot.try_retain().is_none());
    }
}
