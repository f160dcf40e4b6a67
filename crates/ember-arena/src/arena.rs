//! The generational object arena.
//!
//! Slots are grouped into fixed-size chunks that are allocated on first use
//! and never moved or individually freed, so slot addresses stay stable and
//! lookups need no lock. Only the free list and high-water mark sit behind a
//! mutex, taken by allocation and by the final release of an object.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use ember_core::{Object, ObjectHandle};

use crate::config::ArenaConfig;
use crate::error::ArenaError;
use crate::ptr::{ObjectPtr, StrongPtr};
use crate::raw::{CellRef, ObjectCell, Slot};

/// Free-list state protected by the allocation lock.
#[derive(Debug, Default)]
struct AllocState {
    free: Vec<u32>,
    high_water: u32,
    retired: u32,
}

/// A chunked, generational pool of engine objects.
///
/// Objects are inserted with [`allocate`](ObjectArena::allocate) or
/// [`insert`](ObjectArena::insert), which return an owning strong pointer.
/// When the last strong pointer to an object is dropped, the object's
/// [`on_destroy`](Object::on_destroy) hook runs, the object is dropped, and
/// its slot returns to the free list with a new generation, so every handle
/// previously issued for it is stale forever.
///
/// The arena is always shared through an `Arc`; pointers keep it alive.
pub struct ObjectArena {
    config: ArenaConfig,
    chunks: Box<[OnceLock<Box<[Slot]>>]>,
    state: Mutex<AllocState>,
    live: AtomicU32,
    shut_down: AtomicBool,
}

impl ObjectArena {
    /// Create an arena for the given configuration.
    pub fn new(config: ArenaConfig) -> Result<Arc<Self>, ArenaError> {
        config.validate()?;
        let chunks = (0..config.chunk_count()).map(|_| OnceLock::new()).collect();
        Ok(Arc::new(Self {
            config,
            chunks,
            state: Mutex::new(AllocState::default()),
            live: AtomicU32::new(0),
            shut_down: AtomicBool::new(false),
        }))
    }

    /// The configuration this arena was built with.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Move a type-erased object into the arena.
    ///
    /// The returned pointer owns the initial strong reference; its
    /// [`handle`](StrongPtr::handle) names the object.
    pub fn allocate(self: &Arc<Self>, object: Box<dyn Object>) -> Result<ObjectPtr, ArenaError> {
        let (handle, cell) = self.allocate_cell(object)?;
        Ok(StrongPtr::from_parts(Arc::clone(self), handle, cell))
    }

    /// Move a concrete object into the arena, keeping its static type.
    pub fn insert<T: Object>(self: &Arc<Self>, object: T) -> Result<StrongPtr<T>, ArenaError> {
        let (handle, cell) = self.allocate_cell(Box::new(object))?;
        Ok(StrongPtr::from_parts(Arc::clone(self), handle, cell))
    }

    fn allocate_cell(&self, object: Box<dyn Object>) -> Result<(ObjectHandle, CellRef), ArenaError> {
        if self.is_shut_down() {
            return Err(ArenaError::ShutDown);
        }
        let index = {
            let mut state = self.lock_state();
            let index = match state.free.pop() {
                Some(index) => index,
                None => {
                    if state.high_water >= self.config.max_objects {
                        log::error!(
                            "object arena exhausted: {} slots in use, {} retired",
                            state.high_water - state.retired,
                            state.retired
                        );
                        return Err(ArenaError::CapacityExceeded {
                            capacity: self.config.max_objects,
                        });
                    }
                    let index = state.high_water;
                    state.high_water += 1;
                    index
                }
            };
            let chunk = index as usize / self.config.chunk_size as usize;
            self.chunks[chunk].get_or_init(|| {
                log::debug!("object arena: allocating chunk {chunk}");
                (0..self.config.chunk_size).map(|_| Slot::new()).collect()
            });
            index
        };

        let slot = self.live_slot(index);
        let (generation, cell) = slot.publish(ObjectCell::new(object));
        self.live.fetch_add(1, Ordering::Relaxed);
        Ok((ObjectHandle::new(index, generation), cell))
    }

    /// Resolve a handle to a strong pointer.
    ///
    /// Snapshots the generation, takes a reference only if the strong count
    /// is non-zero, then re-checks the generation. Any mismatch releases the
    /// reference and yields `None`, so a destroyed object is never returned
    /// even if its slot has been reused in between.
    pub fn resolve(self: &Arc<Self>, handle: ObjectHandle) -> Option<ObjectPtr> {
        let cell = self.retain_handle(handle)?;
        Some(StrongPtr::from_parts(Arc::clone(self), handle, cell))
    }

    pub(crate) fn retain_handle(&self, handle: ObjectHandle) -> Option<CellRef> {
        let slot = self.slot(handle.index)?;
        if slot.generation() != handle.generation {
            return None;
        }
        let cell = slot.try_retain()?;
        if slot.generation() != handle.generation {
            self.release(handle.index, cell);
            return None;
        }
        Some(cell)
    }

    /// Best-effort liveness check that takes no reference.
    ///
    /// The answer may be out of date by the time the caller acts on it; use
    /// [`resolve`](Self::resolve) to actually reach the object.
    pub fn is_alive(&self, handle: ObjectHandle) -> bool {
        self.slot(handle.index).is_some_and(|slot| {
            slot.generation() == handle.generation && slot.strong_count() > 0
        })
    }

    /// Current strong count of the object behind `handle`, or 0 if stale.
    pub fn strong_count(&self, handle: ObjectHandle) -> u32 {
        match self.slot(handle.index) {
            Some(slot) if slot.generation() == handle.generation => slot.strong_count(),
            _ => 0,
        }
    }

    /// Weak references currently registered against the slot of `handle`.
    ///
    /// The count is per slot: weak pointers to earlier occupants still
    /// holding the slot are included.
    pub fn weak_count(&self, handle: ObjectHandle) -> u32 {
        self.slot(handle.index).map_or(0, Slot::weak_count)
    }

    /// Number of objects currently alive.
    pub fn live_objects(&self) -> u32 {
        self.live.load(Ordering::Relaxed)
    }

    /// Configured maximum object count.
    pub fn capacity(&self) -> u32 {
        self.config.max_objects
    }

    /// Number of slots ever handed out (the high-water mark).
    pub fn high_water(&self) -> u32 {
        self.lock_state().high_water
    }

    /// Number of chunks allocated so far.
    pub fn chunk_count(&self) -> usize {
        self.chunks.iter().filter(|c| c.get().is_some()).count()
    }

    /// Handles of every object alive at the time of the call.
    pub fn live_handles(&self) -> Vec<ObjectHandle> {
        let high_water = self.high_water();
        (0..high_water)
            .filter_map(|index| {
                let slot = self.slot(index)?;
                (slot.strong_count() > 0).then(|| ObjectHandle::new(index, slot.generation()))
            })
            .collect()
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Force-destroy every live object, bypassing reference counts.
    ///
    /// All handles become stale and further allocation fails. Pointers that
    /// outlive the shutdown stay memory-safe but see the object as gone
    /// ([`StrongPtr::try_read`] returns `None`). Chunk memory is released
    /// when the last pointer (and the arena itself) is dropped.
    ///
    /// Intended to be called once, from a single thread, at teardown.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let high_water = self.high_water();
        let mut destroyed = 0u32;
        for index in 0..high_water {
            let Some(slot) = self.slot(index) else {
                continue;
            };
            let Some(cell) = slot.try_retain() else {
                continue;
            };
            slot.bump_generation();
            if cell.get().destroy() {
                self.live.fetch_sub(1, Ordering::Relaxed);
                destroyed += 1;
            }
            self.release(index, cell);
        }
        log::info!("object arena shut down: destroyed {destroyed} live objects");
    }

    /// Give back one strong reference to slot `index`.
    pub(crate) fn release(&self, index: u32, cell: CellRef) {
        let slot = self.live_slot(index);
        if let Some(cell) = slot.release(cell) {
            self.deallocate(index, slot, cell);
        }
    }

    /// Destroy the object whose last strong reference was just released and
    /// recycle its slot.
    fn deallocate(&self, index: u32, slot: &Slot, cell: Box<ObjectCell>) {
        let generation = slot.bump_generation();
        if cell.destroy() {
            self.live.fetch_sub(1, Ordering::Relaxed);
        }
        drop(cell);

        if self.is_shut_down() {
            return;
        }
        let mut state = self.lock_state();
        // A wrapped generation would collide with handles from the slot's
        // first life, so the slot is retired instead.
        if generation == 0 {
            state.retired += 1;
            log::warn!("object arena: retiring slot {index} after generation wrap");
        } else {
            state.free.push(index);
        }
    }

    pub(crate) fn slot(&self, index: u32) -> Option<&Slot> {
        let chunk_size = self.config.chunk_size as usize;
        let index = index as usize;
        self.chunks
            .get(index / chunk_size)?
            .get()?
            .get(index % chunk_size)
    }

    pub(crate) fn live_slot(&self, index: u32) -> &Slot {
        self.slot(index)
            .expect("slot of an allocated index always exists")
    }

    fn lock_state(&self) -> MutexGuard<'_, AllocState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for ObjectArena {
    fn drop(&mut self) {
        for chunk in self.chunks.iter_mut() {
            let Some(slots) = chunk.get_mut() else {
                continue;
            };
            for slot in slots.iter_mut() {
                if let Some(cell) = slot.take_exclusive() {
                    cell.destroy();
                }
            }
        }
    }
}

impl std::fmt::Debug for ObjectArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectArena")
            .field("capacity", &self.config.max_objects)
            .field("live", &self.live_objects())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

// Compile-time assertion: ObjectArena must be Send + Sync to be shared
// between threads behind an Arc.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<ObjectArena>();
};
