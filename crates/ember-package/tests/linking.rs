//! Package save, mount and load.
//!
//! Objects are saved by one linker and loaded by another with a fresh
//! arena, so every reference in a loaded object must have come back through
//! the package's export or import tables.

use ember_arena::ObjectPtr;
use ember_core::ObjectFlags;
use ember_package::{DirectorySource, ExportState, MemorySource, PackageError, PackageLinker};
use ember_reflect::ObjectContext;
use ember_test_utils::{
    context_with, pawn_v1_registry, pawn_v2_registry, sample_actor, scene_context, Actor, Color, Entity, PawnV1,
    PawnV2,
};
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────

fn entity(cx: &ObjectContext, id: u32, name: &str) -> ObjectPtr {
    cx.create(Entity {
        id,
        name: name.into(),
        tags: vec!["static".into()],
    })
    .unwrap()
    .into_object()
}

/// Package "level": export "root" is an entity, export "scout" an actor
/// that targets it strongly and is owned by it weakly.
fn level_bytes() -> Vec<u8> {
    let mut linker = PackageLinker::new(scene_context());
    linker.create_package("level").unwrap();
    let root = entity(linker.context(), 1, "root");
    let scout = linker
        .context()
        .create(Actor {
            target: Some(root.clone()),
            owner: Some(root.downgrade()),
            ..sample_actor()
        })
        .unwrap()
        .into_object();
    linker.add_export("level", "root", root).unwrap();
    linker.add_export("level", "scout", scout).unwrap();
    linker.save_package("level").unwrap()
}

fn mounted(name: &str, bytes: Vec<u8>) -> PackageLinker {
    let mut linker = PackageLinker::new(scene_context());
    linker.mount_package(name, bytes).unwrap();
    linker
}

fn state_of<'a>(linker: &'a PackageLinker, package: &str, object_name: &str) -> &'a ExportState {
    linker
        .package(package)
        .unwrap()
        .export(object_name)
        .unwrap()
        .state()
}

/// Packages "world" (exporting entity "sun") and "level" (exporting an
/// actor targeting the sun), saved by the same linker.
fn world_and_level() -> (Vec<u8>, Vec<u8>) {
    let mut linker = PackageLinker::new(scene_context());
    linker.create_package("world").unwrap();
    linker.create_package("level").unwrap();
    let sun = entity(linker.context(), 99, "sun");
    let scout = linker
        .context()
        .create(Actor {
            target: Some(sun.clone()),
            ..sample_actor()
        })
        .unwrap()
        .into_object();
    linker.add_export("world", "sun", sun).unwrap();
    linker.add_export("level", "scout", scout).unwrap();
    (
        linker.save_package("world").unwrap(),
        linker.save_package("level").unwrap(),
    )
}

// ── Round trip ──────────────────────────────────────────────────

#[test]
fn saved_objects_load_with_their_references() {
    let mut linker = mounted("level", level_bytes());
    let scout = linker.load_object("level", "scout").unwrap();
    let root = linker.load_object("level", "root").unwrap();

    let scout = scout.cast::<Actor>().unwrap();
    let a = scout.read();
    let expected = sample_actor();
    assert_eq!(a.base, expected.base);
    assert_eq!(a.position, expected.position);
    assert_eq!(a.waypoints, expected.waypoints);
    assert_eq!(a.color, Color::Blue);
    assert_eq!(a.samples, expected.samples);
    assert_eq!(a.post_loads, 1);
    assert_eq!(a.target.as_ref(), Some(&root));
    let owner = a.owner.as_ref().and_then(|w| w.lock());
    assert_eq!(owner.as_ref(), Some(&root));

    let root = root.cast::<Entity>().unwrap();
    assert_eq!(root.read().name, "root");
    assert_eq!(root.read().tags, ["static"]);
}

#[test]
fn repeat_loads_return_the_same_object() {
    let mut linker = mounted("level", level_bytes());
    let first = linker.load_object("level", "root").unwrap();
    let second = linker.load_object("level", "root").unwrap();
    assert_eq!(first, second);
    assert_eq!(linker.context().arena().live_objects(), 1);
}

#[test]
fn loading_is_lazy() {
    let mut linker = mounted("level", level_bytes());
    assert_eq!(linker.context().arena().live_objects(), 0);

    linker.load_object("level", "root").unwrap();
    assert!(state_of(&linker, "level", "root").is_loaded());
    assert!(matches!(
        state_of(&linker, "level", "scout"),
        ExportState::Unloaded
    ));
}

#[test]
fn loading_follows_references() {
    let mut linker = mounted("level", level_bytes());
    linker.load_object("level", "scout").unwrap();
    assert!(state_of(&linker, "level", "root").is_loaded());
    assert_eq!(linker.context().arena().live_objects(), 2);
}

#[test]
fn fully_load_returns_exports_in_order() {
    let mut linker = mounted("level", level_bytes());
    let objects = linker.fully_load("level").unwrap();
    assert_eq!(objects.len(), 2);
    assert_eq!(objects[0].type_name(), "Entity");
    assert_eq!(objects[1].type_name(), "Actor");
}

#[test]
fn resaving_a_loaded_package_is_stable() {
    let bytes = level_bytes();
    let mut linker = mounted("level", bytes.clone());
    assert_eq!(linker.save_package("level").unwrap(), bytes);
}

#[test]
fn reference_cycles_terminate() {
    let mut writer = PackageLinker::new(scene_context());
    writer.create_package("pair").unwrap();
    let cx = writer.context().clone();
    let left = cx.create(Actor::default()).unwrap();
    let right = cx.create(Actor::default()).unwrap();
    left.write().target = Some(right.clone().into_object());
    right.write().target = Some(left.clone().into_object());
    writer.add_export("pair", "left", left.into_object()).unwrap();
    writer.add_export("pair", "right", right.into_object()).unwrap();
    let bytes = writer.save_package("pair").unwrap();

    let mut linker = mounted("pair", bytes);
    let left = linker.load_object("pair", "left").unwrap();
    let right = linker.load_object("pair", "right").unwrap();
    assert_eq!(left.cast::<Actor>().unwrap().read().target.as_ref(), Some(&right));
    assert_eq!(right.cast::<Actor>().unwrap().read().target.as_ref(), Some(&left));
    assert_eq!(left.cast::<Actor>().unwrap().read().post_loads, 1);
}

#[test]
fn unexported_references_are_saved_as_null() {
    let mut writer = PackageLinker::new(scene_context());
    writer.create_package("level").unwrap();
    let stray = entity(writer.context(), 5, "stray");
    let scout = writer
        .context()
        .create(Actor {
            target: Some(stray),
            ..sample_actor()
        })
        .unwrap()
        .into_object();
    writer.add_export("level", "scout", scout).unwrap();
    let bytes = writer.save_package("level").unwrap();
    assert!(writer.package("level").unwrap().imports().is_empty());

    let mut linker = mounted("level", bytes);
    let scout = linker.load_object("level", "scout").unwrap();
    assert!(scout.cast::<Actor>().unwrap().read().target.is_none());
}

// ── Imports ─────────────────────────────────────────────────────

#[test]
fn references_into_other_packages_become_imports() {
    let (_, level) = world_and_level();
    let linker = mounted("level", level);
    let imports = linker.package("level").unwrap().imports();
    assert_eq!(imports.len(), 1);
    assert_eq!(imports[0].package, "world");
    assert_eq!(imports[0].object_name, "sun");
    assert_eq!(imports[0].class_name, "Entity");
}

#[test]
fn imports_mount_their_package_from_a_source() {
    let (world, level) = world_and_level();
    let mut source = MemorySource::new();
    source.insert("world", world);

    let mut linker = mounted("level", level);
    linker.add_source(source);
    assert!(!linker.is_mounted("world"));

    let scout = linker.load_object("level", "scout").unwrap();
    assert!(linker.is_mounted("world"));
    let sun = linker.load_object("world", "sun").unwrap();
    assert_eq!(scout.cast::<Actor>().unwrap().read().target.as_ref(), Some(&sun));
    assert_eq!(sun.cast::<Entity>().unwrap().read().id, 99);
}

#[test]
fn unresolvable_import_loads_as_null() {
    let (_, level) = world_and_level();
    let mut linker = mounted("level", level);
    let scout = linker.load_object("level", "scout").unwrap();
    assert!(scout.cast::<Actor>().unwrap().read().target.is_none());
    assert!(!linker.is_mounted("world"));
}

#[test]
fn directory_source_serves_package_files() {
    let (world, level) = world_and_level();
    let dir = std::env::temp_dir().join(format!("ember-package-linking-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let source = DirectorySource::new(&dir);
    std::fs::write(source.path_of("world").unwrap(), world).unwrap();
    std::fs::write(source.path_of("level").unwrap(), level).unwrap();

    let mut linker = PackageLinker::new(scene_context());
    linker.add_source(source);
    let scout = linker.load_object("level", "scout").unwrap();
    let target = scout.cast::<Actor>().unwrap().read().target.clone().unwrap();
    assert_eq!(target.cast::<Entity>().unwrap().read().name, "sun");
    std::fs::remove_dir_all(&dir).unwrap();
}

// ── Schema evolution ────────────────────────────────────────────

#[test]
fn packages_load_across_schema_versions() {
    let mut writer = PackageLinker::new(context_with(pawn_v1_registry()));
    writer.create_package("pawns").unwrap();
    let pawn = writer
        .context()
        .create(PawnV1 {
            name: "old".into(),
            health: 40.0,
            legacy_score: 3,
            color: Color::Green,
        })
        .unwrap()
        .into_object();
    writer.add_export("pawns", "hero", pawn).unwrap();
    let bytes = writer.save_package("pawns").unwrap();

    let mut linker = PackageLinker::new(context_with(pawn_v2_registry()));
    linker.mount_package("pawns", bytes).unwrap();
    let hero = linker.load_object("pawns", "hero").unwrap();
    let hero = hero.cast::<PawnV2>().unwrap();
    assert_eq!(hero.read().name, "old");
    assert_eq!(hero.read().color, Color::Green);
    assert_eq!(hero.read().armor, 25);
}

// ── Errors ──────────────────────────────────────────────────────

#[test]
fn mount_errors() {
    let mut linker = mounted("level", level_bytes());
    assert!(matches!(
        linker.mount_package("level", level_bytes()),
        Err(PackageError::AlreadyMounted { .. })
    ));
    assert!(matches!(
        linker.mount_package("junk", vec![0u8; 64]),
        Err(PackageError::InvalidMagic { .. })
    ));
    assert!(matches!(
        linker.load_object("level", "nobody"),
        Err(PackageError::UnknownExport { .. })
    ));
    assert!(linker.unmount_package("level"));
    assert!(!linker.is_mounted("level"));
}

#[test]
fn every_truncation_is_rejected_at_mount() {
    let bytes = level_bytes();
    for len in 0..bytes.len() {
        let mut linker = PackageLinker::new(scene_context());
        assert!(
            linker.mount_package("level", bytes[..len].to_vec()).is_err(),
            "prefix of {len} bytes mounted"
        );
    }
}

#[test]
fn failed_load_leaves_export_unloaded() {
    let mut writer = PackageLinker::new(scene_context());
    writer.create_package("level").unwrap();
    let root = entity(writer.context(), 1, "root");
    writer.add_export("level", "root", root).unwrap();
    let mut bytes = writer.save_package("level").unwrap();

    // Inflate the name's length prefix inside the payload.
    let at = bytes
        .windows(4)
        .position(|w| w == b"root")
        .expect("name in payload")
        - 8;
    bytes[at..at + 8].copy_from_slice(&u64::MAX.to_le_bytes());

    let mut linker = mounted("level", bytes);
    assert!(matches!(
        linker.load_object("level", "root"),
        Err(PackageError::Reflect(_))
    ));
    assert!(matches!(
        state_of(&linker, "level", "root"),
        ExportState::Unloaded
    ));
}

/// Package "level" exporting two actors that target each other.
fn cycle_bytes() -> Vec<u8> {
    let mut linker = PackageLinker::new(scene_context());
    linker.create_package("level").unwrap();
    let cx = linker.context().clone();
    let first = cx.create(sample_actor()).unwrap();
    let second = cx
        .create(Actor {
            target: Some(first.clone().into_object()),
            ..sample_actor()
        })
        .unwrap();
    first.write().target = Some(second.clone().into_object());
    linker.add_export("level", "first", first.into_object()).unwrap();
    linker.add_export("level", "second", second.into_object()).unwrap();
    linker.save_package("level").unwrap()
}

#[test]
fn failed_load_clears_references_to_the_half_loaded_object() {
    let mut bytes = cycle_bytes();
    let offset = mounted("level", bytes.clone())
        .package("level")
        .unwrap()
        .export("second")
        .unwrap()
        .offset() as usize;
    // One more property than the payload holds: "second" fails after its
    // target, "first", has loaded and taken a reference back to it.
    let count = u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap());
    bytes[offset..offset + 4].copy_from_slice(&(count + 1).to_le_bytes());

    let mut linker = mounted("level", bytes);
    assert!(matches!(
        linker.load_object("level", "second"),
        Err(PackageError::Reflect(_))
    ));
    assert!(matches!(state_of(&linker, "level", "second"), ExportState::Unloaded));

    let first = state_of(&linker, "level", "first").clone();
    assert!(first.is_loaded());
    let first = first.object().unwrap().cast::<Actor>().unwrap();
    assert!(first.read().target.is_none());
}

#[test]
fn flags_follow_the_load_state() {
    let mut linker = mounted("level", level_bytes());
    let scout = linker.load_object("level", "scout").unwrap();
    assert!(scout.has_flags(ObjectFlags::PUBLIC | ObjectFlags::WAS_LOADED));
    assert!(!scout.has_flags(ObjectFlags::NEEDS_LOAD));
    let root = scout.cast::<Actor>().unwrap().read().target.clone().unwrap();
    assert!(root.has_flags(ObjectFlags::PUBLIC | ObjectFlags::WAS_LOADED));

    linker.create_package("scratch").unwrap();
    let fresh = entity(linker.context(), 5, "fresh");
    assert!(fresh.flags().is_empty());
    linker.add_export("scratch", "fresh", fresh.clone()).unwrap();
    assert_eq!(fresh.flags(), ObjectFlags::PUBLIC);
}

#[test]
fn transient_references_are_saved_as_null() {
    let mut linker = PackageLinker::new(scene_context());
    linker.create_package("world").unwrap();
    linker.create_package("level").unwrap();
    let preview = entity(linker.context(), 3, "preview");
    let scout = linker
        .context()
        .create(Actor {
            target: Some(preview.clone()),
            owner: Some(preview.downgrade()),
            ..sample_actor()
        })
        .unwrap()
        .into_object();
    linker.add_export("world", "preview", preview.clone()).unwrap();
    linker.add_export("level", "scout", scout).unwrap();
    preview.insert_flags(ObjectFlags::TRANSIENT);
    let bytes = linker.save_package("level").unwrap();

    let mut linker = mounted("level", bytes);
    assert!(linker.package("level").unwrap().imports().is_empty());
    let scout = linker.load_object("level", "scout").unwrap();
    let scout = scout.cast::<Actor>().unwrap();
    assert!(scout.read().target.is_none());
    assert!(scout.read().owner.is_none());
}

proptest! {
    #[test]
    fn corrupted_packages_never_panic(
        flips in proptest::collection::vec((any::<prop::sample::Index>(), any::<u8>()), 1..8)
    ) {
        let mut bytes = level_bytes();
        for (index, value) in flips {
            let at = index.index(bytes.len());
            bytes[at] = value;
        }
        let mut linker = PackageLinker::new(scene_context());
        if linker.mount_package("level", bytes).is_ok() {
            let _ = linker.fully_load("level");
        }
    }
}
