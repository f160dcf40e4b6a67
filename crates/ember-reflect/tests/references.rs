//! Reference rewriting through reflected objects.
//!
//! Runs `ReferenceReplacer` and `ReferenceCollector` over an `Actor` whose
//! strong `target` and weak `owner` both point at the same object.

use ember_archive::{ReferenceCollector, ReferenceReplacer};
use ember_arena::ObjectPtr;
use ember_reflect::ObjectContext;
use ember_test_utils::{sample_actor, scene_context, Actor, Entity};

// ── Helpers ─────────────────────────────────────────────────────

fn entity(cx: &ObjectContext, id: u32) -> ObjectPtr {
    cx.create(Entity {
        id,
        ..Entity::default()
    })
    .unwrap()
    .into_object()
}

/// An actor whose target and owner both reference `object`.
fn actor_pointing_at(cx: &ObjectContext, object: &ObjectPtr) -> ObjectPtr {
    let mut actor = sample_actor();
    actor.target = Some(object.clone());
    actor.owner = Some(object.downgrade());
    cx.create(actor).unwrap().into_object()
}

fn owner_of(actor: &ObjectPtr) -> Option<ObjectPtr> {
    let actor = actor.cast::<Actor>().unwrap();
    let owner = actor.read().owner.clone();
    owner.and_then(|weak| weak.lock())
}

fn target_of(actor: &ObjectPtr) -> Option<ObjectPtr> {
    actor.cast::<Actor>().unwrap().read().target.clone()
}

// ── Tests ───────────────────────────────────────────────────────

#[test]
fn replacer_rewrites_strong_and_weak_fields() {
    let cx = scene_context();
    let old = entity(&cx, 1);
    let new = entity(&cx, 2);
    let actor = actor_pointing_at(&cx, &old);

    let mut replacer = ReferenceReplacer::new(old.handle(), Some(new.clone()));
    cx.serialize_object(&actor, &mut replacer).unwrap();

    assert_eq!(replacer.replaced(), 2);
    assert_eq!(target_of(&actor), Some(new.clone()));
    assert_eq!(owner_of(&actor), Some(new));
}

#[test]
fn replacer_clears_weak_fields() {
    let cx = scene_context();
    let old = entity(&cx, 1);
    let actor = actor_pointing_at(&cx, &old);

    let mut replacer = ReferenceReplacer::new(old.handle(), None);
    cx.serialize_object(&actor, &mut replacer).unwrap();

    assert_eq!(replacer.replaced(), 2);
    assert!(target_of(&actor).is_none());
    assert!(actor.cast::<Actor>().unwrap().read().owner.is_none());
}

#[test]
fn unmatched_references_are_left_alone() {
    let cx = scene_context();
    let kept = entity(&cx, 1);
    let other = entity(&cx, 2);
    let actor = actor_pointing_at(&cx, &kept);

    let mut replacer = ReferenceReplacer::new(other.handle(), None);
    cx.serialize_object(&actor, &mut replacer).unwrap();

    assert_eq!(replacer.replaced(), 0);
    assert_eq!(target_of(&actor), Some(kept.clone()));
    assert_eq!(owner_of(&actor), Some(kept));
}

#[test]
fn collector_sees_weak_references_once() {
    let cx = scene_context();
    let shared = entity(&cx, 1);
    let actor = actor_pointing_at(&cx, &shared);

    let mut collector = ReferenceCollector::new();
    cx.serialize_object(&actor, &mut collector).unwrap();
    assert_eq!(collector.references(), &[shared][..]);
}
