//! Reflected fixture types.
//!
//! - [`Vec3`] and [`Color`]: a nested struct and an enum.
//! - [`Entity`] and [`Actor`]: a two-level class hierarchy exercising every
//!   property kind, including object references.
//! - [`PawnV1`] and [`PawnV2`]: two versions of the same `"Pawn"` schema for
//!   schema-evolution tests.
//! - [`DropCounter`]: counts its own destruction.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ember_arena::{ObjectPtr, WeakObjectPtr};
use ember_core::Object;
use ember_reflect::{reflect_enum, reflect_struct, TypeRecord, TypeRegistry};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}
reflect_struct!(Vec3, "Vec3");

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Color {
    #[default]
    Red,
    Green,
    Blue,
}
reflect_enum!(Color, "Color", [Red, Green, Blue]);

#[derive(Debug, Default, PartialEq)]
pub struct Entity {
    pub id: u32,
    pub name: String,
    pub tags: Vec<String>,
}
ember_core::impl_object!(Entity, "Entity");

#[derive(Debug, Default)]
pub struct Actor {
    pub base: Entity,
    pub position: Vec3,
    pub waypoints: Vec<Vec3>,
    pub color: Color,
    pub health: f32,
    pub samples: Vec<f32>,
    pub alive: bool,
    pub target: Option<ObjectPtr>,
    pub owner: Option<WeakObjectPtr>,
    pub post_loads: u32,
}

impl Object for Actor {
    fn type_name(&self) -> &'static str {
        "Actor"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn post_load(&mut self) {
        self.post_loads += 1;
    }
}

/// Register `Vec3`, `Entity` and `Actor`.
pub fn register_scene_types(registry: &mut TypeRegistry) {
    registry.register_type(
        TypeRecord::structure::<Vec3>("Vec3")
            .property("x", |v: &mut Vec3| &mut v.x)
            .property("y", |v: &mut Vec3| &mut v.y)
            .property("z", |v: &mut Vec3| &mut v.z),
    );
    registry.register_type(
        TypeRecord::class::<Entity>("Entity")
            .property("id", |e: &mut Entity| &mut e.id)
            .property("name", |e: &mut Entity| &mut e.name)
            .property("tags", |e: &mut Entity| &mut e.tags),
    );
    registry.register_type(
        TypeRecord::class::<Actor>("Actor")
            .parent("Entity", |a: &mut Actor| &mut a.base)
            .property("position", |a: &mut Actor| &mut a.position)
            .property("waypoints", |a: &mut Actor| &mut a.waypoints)
            .property("color", |a: &mut Actor| &mut a.color)
            .property("health", |a: &mut Actor| &mut a.health)
            .property("samples", |a: &mut Actor| &mut a.samples)
            .property("alive", |a: &mut Actor| &mut a.alive)
            .property("target", |a: &mut Actor| &mut a.target)
            .property("owner", |a: &mut Actor| &mut a.owner),
    );
}

/// Registry holding the scene types.
pub fn scene_registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    register_scene_types(&mut registry);
    registry
}

/// An actor with every non-reference property set to a non-default value.
pub fn sample_actor() -> Actor {
    Actor {
        base: Entity {
            id: 7,
            name: "scout".into(),
            tags: vec!["flying".into(), "hostile".into()],
        },
        position: Vec3::new(1.0, 2.0, 3.0),
        waypoints: vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(4.0, -1.5, 8.25)],
        color: Color::Blue,
        health: 87.5,
        samples: vec![0.25, 0.5, 0.75],
        alive: true,
        ..Actor::default()
    }
}

/// First version of the `"Pawn"` schema.
#[derive(Debug, Default, PartialEq)]
pub struct PawnV1 {
    pub name: String,
    pub health: f32,
    pub legacy_score: i32,
    pub color: Color,
}
ember_core::impl_object!(PawnV1, "Pawn");

/// Second version of the `"Pawn"` schema: `legacy_score` removed, `armor`
/// and `spawn` added, `color` moved to the front.
#[derive(Debug, PartialEq)]
pub struct PawnV2 {
    pub color: Color,
    pub name: String,
    pub health: f32,
    pub armor: u16,
    pub spawn: Vec3,
}
ember_core::impl_object!(PawnV2, "Pawn");

impl Default for PawnV2 {
    fn default() -> Self {
        Self {
            color: Color::default(),
            name: String::new(),
            health: 0.0,
            armor: 25,
            spawn: Vec3::new(0.0, 0.0, 1.0),
        }
    }
}

pub fn pawn_v1_registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry.register_type(
        TypeRecord::class::<PawnV1>("Pawn")
            .property("name", |p: &mut PawnV1| &mut p.name)
            .property("health", |p: &mut PawnV1| &mut p.health)
            .property("legacy_score", |p: &mut PawnV1| &mut p.legacy_score)
            .property("color", |p: &mut PawnV1| &mut p.color),
    );
    registry
}

pub fn pawn_v2_registry() -> TypeRegistry {
    let mut registry = scene_registry();
    registry.register_type(
        TypeRecord::class::<PawnV2>("Pawn")
            .property("color", |p: &mut PawnV2| &mut p.color)
            .property("name", |p: &mut PawnV2| &mut p.name)
            .property("health", |p: &mut PawnV2| &mut p.health)
            .property("armor", |p: &mut PawnV2| &mut p.armor)
            .property("spawn", |p: &mut PawnV2| &mut p.spawn),
    );
    registry
}

/// Object that bumps a shared counter when its arena destroys it.
pub struct DropCounter {
    pub destroyed: Arc<AtomicUsize>,
}
ember_core::impl_object!(DropCounter, "DropCounter");

impl DropCounter {
    /// A counter and the object reporting to it.
    pub fn tracked() -> (Arc<AtomicUsize>, Self) {
        let destroyed = Arc::new(AtomicUsize::new(0));
        let counter = Self {
            destroyed: Arc::clone(&destroyed),
        };
        (destroyed, counter)
    }
}

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}
