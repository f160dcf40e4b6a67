//! Tagged round trips of the scene fixture types.
//!
//! Serializes a fully populated `Actor` (inherited fields, nested structs,
//! arrays of structs, enums, strong and weak references) through a
//! package-index archive and loads it back into a fresh object.

use ember_archive::{MemoryReader, MemoryWriter, PackageIndexArchive};
use ember_arena::ObjectPtr;
use ember_reflect::{ObjectContext, ReflectError, TaggedReport};
use ember_test_utils::{sample_actor, scene_context, Actor, Color, Entity, ObjectTable};

// ── Helpers ─────────────────────────────────────────────────────

fn save(cx: &ObjectContext, object: &ObjectPtr, table: &mut ObjectTable) -> (Vec<u8>, TaggedReport) {
    let mut writer = MemoryWriter::new();
    let report = {
        let mut ar = PackageIndexArchive::new(&mut writer, table);
        cx.serialize_object(object, &mut ar).unwrap()
    };
    (writer.into_inner(), report)
}

fn load(cx: &ObjectContext, class: &str, bytes: &[u8], table: &mut ObjectTable) -> Result<ObjectPtr, ReflectError> {
    let mut reader = MemoryReader::new(bytes);
    let mut ar = PackageIndexArchive::new(&mut reader, table);
    cx.load_object(class, &mut ar)
}

// ── Tests ───────────────────────────────────────────────────────

#[test]
fn actor_round_trips_every_property_kind() {
    let cx = scene_context();
    let target = cx
        .create(Entity {
            id: 99,
            name: "beacon".into(),
            tags: Vec::new(),
        })
        .unwrap()
        .into_object();
    let owner = cx.create(Entity::default()).unwrap().into_object();

    let mut actor = sample_actor();
    actor.target = Some(target.clone());
    actor.owner = Some(owner.downgrade());
    let actor = cx.create(actor).unwrap().into_object();

    let mut table = ObjectTable::new();
    let (bytes, _) = save(&cx, &actor, &mut table);
    assert_eq!(table.objects, vec![target.clone(), owner.clone()]);

    let loaded = load(&cx, "Actor", &bytes, &mut table).unwrap();
    assert_ne!(loaded, actor);
    let loaded = loaded.cast::<Actor>().unwrap();
    let a = loaded.read();
    let expected = sample_actor();
    assert_eq!(a.base, expected.base);
    assert_eq!(a.position, expected.position);
    assert_eq!(a.waypoints, expected.waypoints);
    assert_eq!(a.color, Color::Blue);
    assert_eq!(a.health, expected.health);
    assert_eq!(a.samples, expected.samples);
    assert!(a.alive);
    assert_eq!(a.target.as_ref(), Some(&target));
    assert_eq!(a.owner.as_ref().and_then(|w| w.lock()), Some(owner));
    assert_eq!(a.post_loads, 1);
}

#[test]
fn report_lists_inherited_fields_first() {
    let cx = scene_context();
    let actor = cx.create(sample_actor()).unwrap().into_object();
    let (_, report) = save(&cx, &actor, &mut ObjectTable::new());

    assert_eq!(&report.serialized[..3], ["id", "name", "tags"]);
    for path in ["position.x", "position.y", "position.z", "position", "color", "owner"] {
        assert!(report.serialized.iter().any(|p| p == path), "missing {path}");
    }
    assert!(report.skipped.is_empty());
}

#[test]
fn null_and_stale_references_load_as_none() {
    let cx = scene_context();
    let owner = cx.create(Entity::default()).unwrap().into_object();
    let mut actor = sample_actor();
    actor.owner = Some(owner.downgrade());
    drop(owner);
    let actor = cx.create(actor).unwrap().into_object();

    let mut table = ObjectTable::new();
    let (bytes, _) = save(&cx, &actor, &mut table);
    assert!(table.objects.is_empty());

    let loaded = load(&cx, "Actor", &bytes, &mut table).unwrap();
    let loaded = loaded.cast::<Actor>().unwrap();
    assert!(loaded.read().target.is_none());
    assert!(loaded.read().owner.is_none());
}

#[test]
fn plain_archives_reject_reference_properties() {
    let cx = scene_context();
    let actor = cx.create(sample_actor()).unwrap().into_object();
    let err = cx
        .serialize_object(&actor, &mut MemoryWriter::new())
        .unwrap_err();
    assert!(matches!(
        err,
        ReflectError::Archive(ember_archive::ArchiveError::ObjectReferencesUnsupported)
    ));
}

#[test]
fn empty_arrays_and_strings_round_trip() {
    let cx = scene_context();
    let entity = cx.create(Entity::default()).unwrap().into_object();
    let (bytes, _) = save(&cx, &entity, &mut ObjectTable::new());

    let loaded = load(&cx, "Entity", &bytes, &mut ObjectTable::new()).unwrap();
    assert_eq!(*loaded.cast::<Entity>().unwrap().read(), Entity::default());
}

#[test]
fn loading_a_struct_name_as_a_class_fails() {
    let cx = scene_context();
    let err = load(&cx, "Vec3", &[], &mut ObjectTable::new()).unwrap_err();
    assert_eq!(
        err,
        ReflectError::NotConstructible {
            type_name: "Vec3".into()
        }
    );
}
