//! Generational object arena for the Ember object model.
//!
//! Owns the lifetime bookkeeping of every engine object: a slot pool that
//! issues stable [`ObjectHandle`](ember_core::ObjectHandle)s, strong and
//! weak pointers built on those handles, and forced teardown. This is the
//! only Ember crate that contains `unsafe` code.
//!
//! # Architecture
//!
//! ```text
//! Arc<ObjectArena>
//! ├── chunk directory: [OnceLock<Box<[Slot]>>; max_objects / chunk_size]
//! │   └── Slot { cell ptr, generation, strong, weak }   (all atomic)
//! │       └── ObjectCell { RwLock<Option<Box<dyn Object>>>, type id/name }
//! └── Mutex<AllocState> { free list, high-water mark, retired count }
//! ```
//!
//! # Handle validity
//!
//! A fresh slot is published at generation 1. Destroying its object bumps
//! the generation, and reusing the slot bumps it again, so live objects
//! always have odd generations and a handle never matches a later
//! occupant. A slot whose generation wraps is retired.
//!
//! # Safety
//!
//! All `unsafe` is confined to the private `raw` module, which owns the
//! reference-counting protocol that keeps a cell allocated while any
//! strong pointer refers to it.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod arena;
pub mod config;
pub mod error;
pub mod ptr;
mod raw;

// Public re-exports for the primary API surface.
pub use arena::ObjectArena;
pub use config::ArenaConfig;
pub use error::ArenaError;
pub use ptr::{ObjectMut, ObjectPtr, ObjectRef, StrongPtr, WeakObjectPtr, WeakPtr};
