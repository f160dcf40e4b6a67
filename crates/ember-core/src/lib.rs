//! Core types and traits for the Ember object model.
//!
//! This is the leaf crate in the Ember dependency graph. It defines the
//! [`Object`] trait every arena-managed engine object implements and the
//! [`ObjectHandle`] used to name an object without owning it, plus the
//! [`ObjectFlags`] recorded for each object.
//!
//! Lifetime bookkeeping lives in `ember-arena`; layout description and
//! serialization live in `ember-reflect`.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod flags;
pub mod id;
pub mod object;

pub use flags::ObjectFlags;
pub use id::ObjectHandle;
pub use object::{Object, ObjectType};
