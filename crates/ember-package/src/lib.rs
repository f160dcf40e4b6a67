//! Package files for Ember objects.
//!
//! A package is a named set of exported objects stored in one file. Object
//! references between exports are stored as package indices, and
//! references into other packages go through an import table naming the
//! other package and its export. Loading is lazy: mounting a package parses
//! its tables, and each export's payload is read on first use.
//!
//! # Architecture
//!
//! - [`PackageLinker`] creates, saves, mounts and loads packages
//! - [`ObjectNameArchive`] stores references as `"package.export"` names
//!   resolved through a linker, outside any package file
//! - [`PackageSource`] supplies bytes of packages that are not mounted yet
//!   ([`MemorySource`], [`DirectorySource`])
//! - [`format`] holds the on-disk header and table entries
//!
//! # Format
//!
//! ```text
//! [MAGIC "EMBR"] [VERSION u32] [import_count u32] [export_count u32]
//! [import_table_offset u64] [export_table_offset u64]
//! [export payload 0] ... [export payload N-1]
//! [import table] [export table]
//! ```
//!
//! All integers are little-endian. Each payload is the export's tagged
//! property stream, so packages written by an older schema still load.
//!
//! # Example
//!
//! ```
//! use ember_arena::ArenaConfig;
//! use ember_package::PackageLinker;
//! use ember_reflect::{ObjectContext, TypeRecord, TypeRegistry};
//!
//! #[derive(Default)]
//! struct Lamp {
//!     lumens: u32,
//! }
//! ember_core::impl_object!(Lamp, "Lamp");
//!
//! let registry = || {
//!     let mut registry = TypeRegistry::new();
//!     registry.register_type(
//!         TypeRecord::class::<Lamp>("Lamp").property("lumens", |l: &mut Lamp| &mut l.lumens),
//!     );
//!     registry
//! };
//!
//! let cx = ObjectContext::new(ArenaConfig::new(64), registry()).unwrap();
//! let mut linker = PackageLinker::new(cx);
//! linker.create_package("house").unwrap();
//! let lamp = linker.context().create(Lamp { lumens: 800 }).unwrap();
//! linker.add_export("house", "porch", lamp.into_object()).unwrap();
//! let bytes = linker.save_package("house").unwrap();
//!
//! let cx = ObjectContext::new(ArenaConfig::new(64), registry()).unwrap();
//! let mut linker = PackageLinker::new(cx);
//! linker.mount_package("house", bytes).unwrap();
//! let porch = linker.load_object("house", "porch").unwrap();
//! assert_eq!(porch.cast::<Lamp>().unwrap().read().lumens, 800);
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod format;
pub mod linker;
pub mod names;
pub mod source;

pub use error::PackageError;
pub use format::{read_tables, ExportEntry, ImportEntry, PackageHeader, PackageTables};
pub use linker::{Export, ExportState, Package, PackageLinker};
pub use names::{split_qualified_name, ObjectNameArchive};
pub use source::{DirectorySource, MemorySource, PackageSource};

/// Magic bytes at the start of every package.
pub const MAGIC: [u8; 4] = *b"EMBR";

/// Current package format version.
pub const FORMAT_VERSION: u32 = 1;
