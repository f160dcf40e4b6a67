//! Reflection graph and tagged property serialization for Ember objects.
//!
//! Every serializable type is described by a [`TypeRecord`]: its name, its
//! parent type (single inheritance expressed as composition plus an upcast
//! accessor), and one [`PropertyDescriptor`] per field. Records live in a
//! [`TypeRegistry`] and are linked once at start-up, which flattens
//! inherited properties in front of each type's own.
//!
//! The tagged serializer walks a linked record and writes every property
//! behind a [`PropertyTag`] naming its type and carrying its payload size.
//! Loading matches tags by (type, name), so data written by an older or
//! newer version of a type still loads: unknown properties are skipped and
//! missing ones keep their defaults.
//!
//! [`ObjectContext`] ties a registry to an
//! [`ObjectArena`](ember_arena::ObjectArena) and is the usual entry point.
//!
//! # Example
//!
//! ```
//! use ember_arena::ArenaConfig;
//! use ember_archive::{MemoryReader, MemoryWriter};
//! use ember_reflect::{ObjectContext, TypeRecord, TypeRegistry};
//!
//! #[derive(Default)]
//! struct Torch {
//!     fuel: f32,
//!     lit: bool,
//! }
//! ember_core::impl_object!(Torch, "Torch");
//!
//! let mut registry = TypeRegistry::new();
//! registry.register_type(
//!     TypeRecord::class::<Torch>("Torch")
//!         .property("fuel", |t: &mut Torch| &mut t.fuel)
//!         .property("lit", |t: &mut Torch| &mut t.lit),
//! );
//! let cx = ObjectContext::new(ArenaConfig::new(64), registry).unwrap();
//!
//! let torch = cx.create(Torch { fuel: 0.75, lit: true }).unwrap().into_object();
//! let mut writer = MemoryWriter::new();
//! cx.serialize_object(&torch, &mut writer).unwrap();
//!
//! let copy = cx
//!     .load_object("Torch", &mut MemoryReader::new(writer.into_inner()))
//!     .unwrap();
//! let copy = copy.cast::<Torch>().unwrap();
//! assert_eq!(copy.read().fuel, 0.75);
//! assert!(copy.read().lit);
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod context;
pub mod error;
pub mod property;
pub mod record;
pub mod registry;
pub mod tag;
pub mod tagged;

pub use context::ObjectContext;
pub use error::ReflectError;
pub use property::{PropertyDescriptor, PropertyType, ReflectEnum, Reflected, PREALLOCATE_LIMIT};
pub use record::{TypeKind, TypeRecord, TypeRecordBuilder};
pub use registry::TypeRegistry;
pub use tag::PropertyTag;
pub use tagged::{serialize_reflected, serialize_tagged, SkippedProperty, TaggedContext, TaggedReport};

/// Re-exported for the `reflect_*` macros.
pub use ember_archive::Archive;
