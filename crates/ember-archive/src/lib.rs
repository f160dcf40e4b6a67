//! Bidirectional binary archives for the Ember object model.
//!
//! A single serialization routine drives both directions: it passes
//! mutable references to an [`Archive`], which writes them out or
//! overwrites them with what it reads. Scalars are little-endian; strings
//! and arrays carry a `u64` length prefix that is bounds-checked before
//! anything is allocated.
//!
//! # Layers
//!
//! - [`MemoryWriter`] / [`MemoryReader`]: byte-buffer archives.
//! - [`ArchiveProxy`]: wrap an archive and intercept selected operations.
//!   [`PackageIndexArchive`] stores object references as
//!   [`PackageIndex`] values; [`ReferenceCollector`] and
//!   [`ReferenceReplacer`] walk references without producing bytes.
//! - [`StructuredArchive`]: scope-checked records and arrays over a
//!   pluggable [`StructuredFormatter`].
//!
//! # Errors
//!
//! Archives carry a sticky error flag rather than returning `Result` from
//! every call. After a complete pass, check [`Archive::error`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod archive;
pub mod config;
pub mod error;
pub mod memory;
pub mod package;
pub mod proxy;
pub mod reference;
pub mod structured;

pub use archive::{Archive, ArchiveMode};
pub use config::ArchiveConfig;
pub use error::ArchiveError;
pub use memory::{MemoryReader, MemoryWriter};
pub use package::{PackageIndex, PackageIndexArchive, PackageResolver};
pub use proxy::{ArchiveProxy, ProxyArchive};
pub use reference::{NullArchive, ReferenceCollector, ReferenceReplacer};
pub use structured::{
    ArraySlot, BinaryFormatter, Record, Slot, StructuredArchive, StructuredFormatter,
};
