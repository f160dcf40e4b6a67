//! Fixture types and registries for Ember development.
//!
//! Provides a reflected scene hierarchy ([`Actor`] deriving from
//! [`Entity`], with nested [`Vec3`] and [`Color`] fields), two versions of
//! a schema for compatibility tests, an in-memory reference resolver, and
//! helpers for building contexts.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;
pub mod resolver;

pub use fixtures::{
    pawn_v1_registry, pawn_v2_registry, register_scene_types, sample_actor, scene_registry, Actor,
    Color, DropCounter, Entity, PawnV1, PawnV2, Vec3,
};
pub use resolver::ObjectTable;

use ember_arena::ArenaConfig;
use ember_reflect::{ObjectContext, TypeRegistry};

/// Small arena capacity used by most tests.
pub const TEST_CAPACITY: u32 = 1024;

/// Context over `registry` with a [`TEST_CAPACITY`] arena.
pub fn context_with(registry: TypeRegistry) -> ObjectContext {
    ObjectContext::new(ArenaConfig::new(TEST_CAPACITY), registry).expect("fixture registry links")
}

/// Context over the scene types.
pub fn scene_context() -> ObjectContext {
    context_with(scene_registry())
}
