//! Ember: arena-allocated reflected objects with versioned serialization.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Ember sub-crates. For most users, adding `ember` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use ember::prelude::*;
//!
//! #[derive(Clone, Copy, Debug, Default, PartialEq)]
//! struct Point {
//!     x: f32,
//!     y: f32,
//! }
//! ember::reflect_struct!(Point, "Point");
//!
//! #[derive(Default)]
//! struct Marker {
//!     label: String,
//!     at: Point,
//!     next: Option<ObjectPtr>,
//! }
//! ember::impl_object!(Marker, "Marker");
//!
//! let mut registry = TypeRegistry::new();
//! registry.register_type(
//!     TypeRecord::structure::<Point>("Point")
//!         .property("x", |p: &mut Point| &mut p.x)
//!         .property("y", |p: &mut Point| &mut p.y),
//! );
//! registry.register_type(
//!     TypeRecord::class::<Marker>("Marker")
//!         .property("label", |m: &mut Marker| &mut m.label)
//!         .property("at", |m: &mut Marker| &mut m.at)
//!         .property("next", |m: &mut Marker| &mut m.next),
//! );
//!
//! let cx = ObjectContext::new(ArenaConfig::default(), registry).unwrap();
//! let marker = cx
//!     .create(Marker {
//!         label: "start".into(),
//!         at: Point { x: 1.0, y: 2.0 },
//!         next: None,
//!     })
//!     .unwrap();
//! let weak = marker.downgrade();
//!
//! let mut writer = MemoryWriter::new();
//! cx.serialize_object(&marker.clone().into_object(), &mut writer).unwrap();
//! let copy = cx
//!     .load_object("Marker", &mut MemoryReader::new(writer.into_inner()))
//!     .unwrap();
//! assert_eq!(copy.cast::<Marker>().unwrap().read().at, Point { x: 1.0, y: 2.0 });
//!
//! drop(marker);
//! assert!(weak.lock().is_none());
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `ember-core` | Handles and the `Object` trait |
//! | [`arena`] | `ember-arena` | Object arena, strong and weak pointers |
//! | [`archive`] | `ember-archive` | Archives, proxies, package indices |
//! | [`reflect`] | `ember-reflect` | Type registry, tagged properties, object context |
//! | [`package`] | `ember-package` | Package files and the package linker |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Object handles and the [`types::Object`] trait (`ember-core`).
pub use ember_core as types;

/// Object arena and pointers (`ember-arena`).
///
/// [`arena::StrongPtr`] owns an object, [`arena::WeakPtr`] observes it and
/// can be upgraded while the object is alive.
pub use ember_arena as arena;

/// Archives in both directions (`ember-archive`).
pub use ember_archive as archive;

/// Reflection and tagged serialization (`ember-reflect`).
///
/// Register types in a [`reflect::TypeRegistry`], then create and
/// serialize objects through an [`reflect::ObjectContext`].
pub use ember_reflect as reflect;

/// Package files and lazy cross-package loading (`ember-package`).
pub use ember_package as package;

pub use ember_core::impl_object;
pub use ember_reflect::{reflect_enum, reflect_struct};

/// Common imports for typical Ember usage.
///
/// ```rust
/// use ember::prelude::*;
/// ```
pub mod prelude {
    // Core
    pub use ember_core::{Object, ObjectFlags, ObjectHandle};

    // Arena
    pub use ember_arena::{ArenaConfig, ObjectArena, ObjectPtr, StrongPtr, WeakObjectPtr, WeakPtr};

    // Archives
    pub use ember_archive::{Archive, MemoryReader, MemoryWriter, PackageIndex};

    // Reflection
    pub use ember_reflect::{ObjectContext, Reflected, ReflectEnum, TypeRecord, TypeRegistry};

    // Packages
    pub use ember_package::{MemorySource, ObjectNameArchive, PackageLinker, PackageSource};

    // Errors
    pub use ember_arena::ArenaError;
    pub use ember_archive::ArchiveError;
    pub use ember_package::PackageError;
    pub use ember_reflect::ReflectError;
}
