use modhost_core::{
    resolve, CoreError, EventKind, HotReloadTracker, ModEvent, ModHostConfig, ModManager,
    ResolveError,
};
use modhost_registry::{
    AssetRegistry, AssetStore, FieldKind, TypeCatalog, TypeDescriptor, TypeRegistry, Value,
};
use modhost_schema::{parse_manifest_str, Manifest, PackageId};
use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Element {
    #[default]
    Physical,
    Fire,
    Frost,
}

impl std::str::FromStr for Element {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "Physical" => Ok(Element::Physical),
            "Fire" => Ok(Element::Fire),
            "Frost" => Ok(Element::Frost),
            other => Err(other.to_owned()),
        }
    }
}

#[derive(Debug, Default, PartialEq)]
struct Effect {
    element: Element,
    magnitude: f64,
}

#[derive(Debug, Default)]
struct Item {
    name: String,
    value: i64,
    stackable: bool,
    element: Element,
    tags: Vec<String>,
    effect: Option<Effect>,
    effects: Vec<Effect>,
    icon: Option<Arc<modhost_registry::Texture>>,
}

fn catalog() -> TypeCatalog {
    let mut catalog = TypeCatalog::new();
    catalog.register(
        "Effect",
        TypeDescriptor::builder::<Effect>()
            .field(
                "element",
                FieldKind::enumeration(["Physical", "Fire", "Frost"]),
                |e: &mut Effect, v| {
                    e.element = v.parse_enum()?;
                    Ok(())
                },
            )
            .field("magnitude", FieldKind::Float, |e: &mut Effect, v| {
                e.magnitude = v.into_f64()?;
                Ok(())
            })
            .build(),
    );
    catalog.register(
        "Item",
        TypeDescriptor::builder::<Item>()
            .field("name", FieldKind::String, |i: &mut Item, v| {
                i.name = v.into_string()?;
                Ok(())
            })
            .field("value", FieldKind::Int, |i: &mut Item, v| {
                i.value = v.into_i64()?;
                Ok(())
            })
            .field("stackable", FieldKind::Bool, |i: &mut Item, v| {
                i.stackable = v.into_bool()?;
                Ok(())
            })
            .field(
                "element",
                FieldKind::enumeration(["Physical", "Fire", "Frost"]),
                |i: &mut Item, v| {
                    i.element = v.parse_enum()?;
                    Ok(())
                },
            )
            .field(
                "tags",
                FieldKind::list_of(FieldKind::String),
                |i: &mut Item, v| {
                    i.tags = v.into_list_of(Value::into_string)?;
                    Ok(())
                },
            )
            .field("effect", FieldKind::object(), |i: &mut Item, v| {
                i.effect = Some(v.into_object()?);
                Ok(())
            })
            .field(
                "effects",
                FieldKind::list_of(FieldKind::object_of("Effect")),
                |i: &mut Item, v| {
                    i.effects = v.into_list_of(Value::into_object)?;
                    Ok(())
                },
            )
            .field("icon", FieldKind::Image, |i: &mut Item, v| {
                i.icon = Some(v.into_image()?);
                Ok(())
            })
            .build(),
    );
    catalog
}

fn write_package(root: &Path, id: &str, extra: &str) {
    let dir = root.join(id);
    fs::create_dir_all(dir.join("content")).unwrap();
    fs::write(
        dir.join("manifest.json"),
        format!(r#"{{"Id": "{id}", "Name": "{id}", "Version": "1.0.0"{extra}}}"#),
    )
    .unwrap();
}

fn write_content(root: &Path, id: &str, file: &str, body: &str) {
    let path = root.join(id).join("content").join(file);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

fn bump_mtime(path: &Path) {
    let file = fs::File::options().write(true).open(path).unwrap();
    let then = file.metadata().unwrap().modified().unwrap();
    file.set_modified(then + Duration::from_secs(30)).unwrap();
}

fn manager(root: &Path) -> ModManager {
    ModManager::new(ModHostConfig::new(root), catalog(), AssetStore::new())
}

fn keys(mgr: &ModManager, prefix: &str) -> Vec<String> {
    mgr.assets()
        .all_keys()
        .into_iter()
        .filter(|k| k.starts_with(prefix))
        .collect()
}

fn bare(id: &str, deps: &[&str]) -> Manifest {
    let mut m = parse_manifest_str(&format!(r#"{{"Id": "{id}"}}"#)).unwrap();
    m.dependencies = deps.iter().map(|d| PackageId::from(*d)).collect();
    m
}

#[test]
fn resolve_puts_dependencies_first() {
    let ordered = resolve(vec![
        bare("ui", &["core", "gfx"]),
        bare("gfx", &["core"]),
        bare("extra", &[]),
        bare("core", &[]),
    ])
    .unwrap();
    let ids: Vec<&str> = ordered.iter().map(|m| m.id.as_str()).collect();
    for m in &ordered {
        let pos = ids.iter().position(|i| *i == m.id.as_str()).unwrap();
        for dep in &m.dependencies {
            let dep_pos = ids.iter().position(|i| *i == dep.as_str()).unwrap();
            assert!(dep_pos < pos, "{dep} must precede {}", m.id);
        }
        assert_eq!(m.load_order, pos);
    }
}

#[test]
fn resolve_rejects_three_node_cycle() {
    let err = resolve(vec![bare("a", &["b"]), bare("b", &["c"]), bare("c", &["a"])]).unwrap_err();
    match err {
        ResolveError::CircularDependency { cycle } => {
            assert_eq!(cycle.first(), cycle.last());
            assert_eq!(cycle.len(), 4);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn load_all_fails_whole_batch_on_cycle() {
    let dir = tempfile::tempdir().unwrap();
    write_package(dir.path(), "a", r#", "Dependencies": ["b"]"#);
    write_package(dir.path(), "b", r#", "Dependencies": ["a"]"#);
    write_package(dir.path(), "c", "");

    let mut mgr = manager(dir.path());
    let err = mgr.load_all().unwrap_err();
    assert!(matches!(err, CoreError::Resolve(ResolveError::CircularDependency { .. })));
    assert!(mgr.loaded_ids().is_empty());
}

#[test]
fn missing_dependency_fails_only_that_package() {
    let dir = tempfile::tempdir().unwrap();
    write_package(dir.path(), "p", "");
    write_package(dir.path(), "q", r#", "Dependencies": ["absent"]"#);
    write_content(dir.path(), "p", "coin.json", r#"{"$type": "Item", "value": 1}"#);

    let errors = Rc::new(RefCell::new(Vec::new()));
    let mut mgr = manager(dir.path());
    let seen = Rc::clone(&errors);
    mgr.events_mut().on(EventKind::LoadError, move |e| {
        if let ModEvent::LoadError { package, .. } = e {
            seen.borrow_mut().push(package.clone());
        }
    });

    let summary = mgr.load_all().unwrap();
    assert_eq!(summary.loaded, vec![PackageId::from("p")]);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].id, "q");
    assert_eq!(*errors.borrow(), vec![PackageId::from("q")]);
    assert!(mgr.assets().has("p:coin"));
}

#[test]
fn conflict_blocks_second_package() {
    let dir = tempfile::tempdir().unwrap();
    write_package(dir.path(), "p", "");
    write_package(dir.path(), "q", r#", "Dependencies": ["p"], "Conflicts": ["r"]"#);
    write_package(dir.path(), "r", "");

    let mut mgr = manager(dir.path());
    let summary = mgr.load_all().unwrap();
    assert_eq!(summary.loaded, vec![PackageId::from("p"), PackageId::from("q")]);
    assert_eq!(summary.failed[0].id, "r");
    assert!(summary.failed[0].error.contains("conflicts"));
}

#[test]
fn disabled_packages_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    write_package(dir.path(), "off", r#", "Enabled": false"#);
    write_package(dir.path(), "on", "");

    let mut mgr = manager(dir.path());
    let summary = mgr.load_all().unwrap();
    assert_eq!(summary.skipped_disabled, vec![PackageId::from("off")]);
    assert_eq!(summary.loaded, vec![PackageId::from("on")]);

    let again = mgr.load_all().unwrap();
    assert!(again.loaded.is_empty());
    assert_eq!(again.already_loaded, vec![PackageId::from("on")]);
}

#[test]
fn broken_manifest_is_reported_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write_package(dir.path(), "good", "");
    fs::create_dir_all(dir.path().join("bad")).unwrap();
    fs::write(dir.path().join("bad/manifest.json"), "{ nope").unwrap();
    fs::create_dir_all(dir.path().join("empty")).unwrap();

    let mut mgr = manager(dir.path());
    let summary = mgr.load_all().unwrap();
    assert_eq!(summary.loaded, vec![PackageId::from("good")]);
    assert_eq!(summary.discovery_errors.len(), 2);
}

#[test]
fn unload_blocked_until_dependent_goes() {
    let dir = tempfile::tempdir().unwrap();
    write_package(dir.path(), "p", "");
    write_package(dir.path(), "q", r#", "Dependencies": ["p"]"#);
    write_content(dir.path(), "p", "coin.json", r#"{"$type": "Item"}"#);

    let mut mgr = manager(dir.path());
    mgr.load_all().unwrap();

    let err = mgr.unload("p").unwrap_err();
    match err {
        CoreError::DependentStillLoaded { dependents, .. } => {
            assert_eq!(dependents, vec![PackageId::from("q")]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(mgr.assets().has("p:coin"));

    mgr.unload("q").unwrap();
    mgr.unload("p").unwrap();
    assert!(!mgr.assets().has("p:coin"));
    assert!(mgr.loaded_ids().is_empty());
}

#[test]
fn reload_replaces_every_old_key() {
    let dir = tempfile::tempdir().unwrap();
    write_package(dir.path(), "p", "");
    write_package(dir.path(), "pp", "");
    write_content(dir.path(), "p", "old_a.json", r#"{"$type": "Item"}"#);
    write_content(dir.path(), "p", "old_b.json", r#"{"$type": "Item"}"#);
    write_content(dir.path(), "pp", "neighbour.json", r#"{"$type": "Item"}"#);

    let mut mgr = manager(dir.path());
    mgr.load_all().unwrap();
    assert_eq!(keys(&mgr, "p:"), vec!["p:old_a", "p:old_b"]);

    fs::remove_file(dir.path().join("p/content/old_a.json")).unwrap();
    fs::remove_file(dir.path().join("p/content/old_b.json")).unwrap();
    write_content(dir.path(), "p", "new.json", r#"{"$type": "Item", "value": 5}"#);

    let reloaded = Rc::new(RefCell::new(0));
    let r = Rc::clone(&reloaded);
    mgr.events_mut().on(EventKind::Reloaded, move |_| *r.borrow_mut() += 1);

    mgr.reload("p").unwrap();
    assert_eq!(keys(&mgr, "p:"), vec!["p:new"]);
    assert_eq!(keys(&mgr, "pp:"), vec!["pp:neighbour"]);
    assert_eq!(mgr.asset::<Item>("p:new").map(|i| i.value), Some(5));
    assert_eq!(*reloaded.borrow(), 1);
}

#[test]
fn reload_with_broken_manifest_keeps_old_package() {
    let dir = tempfile::tempdir().unwrap();
    write_package(dir.path(), "p", "");
    write_content(dir.path(), "p", "coin.json", r#"{"$type": "Item"}"#);

    let mut mgr = manager(dir.path());
    mgr.load_all().unwrap();
    fs::write(dir.path().join("p/manifest.json"), "{").unwrap();

    assert!(matches!(mgr.reload("p"), Err(CoreError::Manifest(_))));
    assert!(mgr.is_loaded("p"));
    assert!(mgr.assets().has("p:coin"));
}

#[test]
fn change_detection_follows_mtime() {
    let dir = tempfile::tempdir().unwrap();
    write_package(dir.path(), "p", "");
    write_package(dir.path(), "q", "");
    write_content(dir.path(), "p", "coin.json", r#"{"$type": "Item"}"#);

    let mut mgr = manager(dir.path());
    mgr.load_all().unwrap();
    assert!(mgr.detect_changed_packages().is_empty());

    let coin = dir.path().join("p/content/coin.json");
    let then = fs::metadata(&coin).unwrap().modified().unwrap();
    fs::File::options()
        .write(true)
        .open(&coin)
        .unwrap()
        .set_modified(then)
        .unwrap();
    assert!(mgr.detect_changed_packages().is_empty());

    bump_mtime(&coin);
    let changed: Vec<PackageId> = mgr.detect_changed_packages().into_iter().collect();
    assert_eq!(changed, vec![PackageId::from("p")]);

    let drift = mgr.package_drift("p").unwrap();
    assert_eq!(drift.modified.len(), 1);
    assert!(drift.added.is_empty());
}

#[test]
fn new_content_file_counts_as_change() {
    let dir = tempfile::tempdir().unwrap();
    write_package(dir.path(), "p", "");

    let mut mgr = manager(dir.path());
    mgr.load_all().unwrap();
    write_content(dir.path(), "p", "later.json", r#"{"$type": "Item"}"#);

    let drift = mgr.package_drift("p").unwrap();
    assert!(drift.has_drift);
    assert_eq!(drift.added.len(), 1);
}

#[test]
fn unknown_type_skips_one_file_only() {
    let dir = tempfile::tempdir().unwrap();
    write_package(dir.path(), "p", "");
    write_content(dir.path(), "p", "a.json", r#"{"$type": "Item", "name": "A"}"#);
    write_content(dir.path(), "p", "b.json", r#"{"$type": "Dragon", "name": "B"}"#);
    write_content(dir.path(), "p", "c.json", r#"{"$type": "Item", "name": "C"}"#);

    let mut mgr = manager(dir.path());
    let summary = mgr.load_all().unwrap();
    assert_eq!(summary.loaded, vec![PackageId::from("p")]);
    assert_eq!(keys(&mgr, "p:"), vec!["p:a", "p:c"]);

    let package = mgr.loaded_package("p").unwrap();
    assert_eq!(package.failed_files.len(), 1);
    assert!(package.failed_files[0].ends_with("b.json"));
}

#[test]
fn nested_record_binds_both_levels() {
    let dir = tempfile::tempdir().unwrap();
    write_package(dir.path(), "p", "");
    write_content(
        dir.path(),
        "p",
        "torch.json",
        r#"{"$type": "Item", "name": "Torch", "element": "Fire",
            "effect": {"$type": "Effect", "element": "frost", "magnitude": 2.5}}"#,
    );

    let mut mgr = manager(dir.path());
    mgr.load_all().unwrap();
    let torch = mgr.asset::<Item>("p:torch").unwrap();
    assert_eq!(torch.name, "Torch");
    assert_eq!(torch.element, Element::Fire);
    assert_eq!(
        torch.effect,
        Some(Effect {
            element: Element::Frost,
            magnitude: 2.5
        })
    );
}

#[test]
fn primitive_enum_and_list_fields_match_source() {
    let dir = tempfile::tempdir().unwrap();
    write_package(dir.path(), "p", "");
    write_content(
        dir.path(),
        "p",
        "nested/potion.json",
        r#"{"$type": "Item", "name": "Potion", "value": 25, "stackable": true,
            "element": "Frost", "tags": ["consumable", "blue"],
            "effects": [{"element": "Physical", "magnitude": 1.0},
                        {"element": "Fire", "magnitude": 0.5}]}"#,
    );

    let mut mgr = manager(dir.path());
    mgr.load_all().unwrap();
    let potion = mgr.asset::<Item>("p:potion").unwrap();
    assert_eq!(potion.name, "Potion");
    assert_eq!(potion.value, 25);
    assert!(potion.stackable);
    assert_eq!(potion.element, Element::Frost);
    assert_eq!(potion.tags, vec!["consumable", "blue"]);
    assert_eq!(potion.effects.len(), 2);
    assert_eq!(potion.effects[1].element, Element::Fire);
    assert_eq!(mgr.asset_keys("p").unwrap().len(), 1);
}

#[test]
fn image_field_decodes_png() {
    let dir = tempfile::tempdir().unwrap();
    write_package(dir.path(), "p", "");
    fs::create_dir_all(dir.path().join("p/icons")).unwrap();
    image::RgbaImage::from_pixel(3, 2, image::Rgba([255, 0, 0, 255]))
        .save(dir.path().join("p/icons/gem.png"))
        .unwrap();
    write_content(
        dir.path(),
        "p",
        "gem.json",
        r#"{"$type": "Item", "icon": "icons/gem.png"}"#,
    );

    let mut mgr = manager(dir.path());
    mgr.load_all().unwrap();
    let icon = mgr.asset::<Item>("p:gem").unwrap().icon.clone().unwrap();
    assert_eq!((icon.width, icon.height), (3, 2));
    assert_eq!(&icon.pixels[..4], &[255, 0, 0, 255]);
}

#[test]
fn image_path_outside_package_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_package(dir.path(), "p", "");
    image::RgbaImage::from_pixel(1, 1, image::Rgba([0, 0, 255, 255]))
        .save(dir.path().join("secret.png"))
        .unwrap();
    let absolute = dir.path().join("secret.png");
    write_content(
        dir.path(),
        "p",
        "up.json",
        r#"{"$type": "Item", "icon": "../secret.png"}"#,
    );
    write_content(
        dir.path(),
        "p",
        "abs.json",
        &serde_json::json!({"$type": "Item", "icon": absolute}).to_string(),
    );

    let mut mgr = manager(dir.path());
    mgr.load_all().unwrap();
    assert!(mgr.asset::<Item>("p:up").unwrap().icon.is_none());
    assert!(mgr.asset::<Item>("p:abs").unwrap().icon.is_none());
}

#[test]
fn hot_reload_batches_after_one_tick() {
    let dir = tempfile::tempdir().unwrap();
    write_package(dir.path(), "p", "");
    write_package(dir.path(), "q", r#", "Dependencies": ["p"]"#);
    write_content(dir.path(), "p", "coin.json", r#"{"$type": "Item", "value": 1}"#);
    write_content(dir.path(), "q", "gem.json", r#"{"$type": "Item", "value": 2}"#);

    let mut mgr = manager(dir.path());
    mgr.load_all().unwrap();

    let batches = Rc::new(RefCell::new(Vec::new()));
    let b = Rc::clone(&batches);
    mgr.events_mut().on(EventKind::BatchReloaded, move |e| {
        if let ModEvent::BatchReloaded(ids) = e {
            b.borrow_mut().push(ids.clone());
        }
    });

    write_content(dir.path(), "q", "gem.json", r#"{"$type": "Item", "value": 20}"#);
    write_content(dir.path(), "p", "coin.json", r#"{"$type": "Item", "value": 10}"#);
    bump_mtime(&dir.path().join("q/content/gem.json"));
    bump_mtime(&dir.path().join("p/content/coin.json"));

    let mut tracker = HotReloadTracker::from_config(mgr.config());
    let first = tracker.tick(&mut mgr);
    assert_eq!(first.queued.len(), 2);
    assert!(first.reloaded.is_empty());
    assert_eq!(mgr.asset::<Item>("p:coin").unwrap().value, 1);

    let second = tracker.tick(&mut mgr);
    assert_eq!(second.reloaded, vec![PackageId::from("p"), PackageId::from("q")]);
    assert_eq!(mgr.asset::<Item>("p:coin").unwrap().value, 10);
    assert_eq!(mgr.asset::<Item>("q:gem").unwrap().value, 20);
    assert_eq!(batches.borrow().len(), 1);

    assert!(tracker.tick(&mut mgr).is_idle());
}

#[test]
fn load_from_path_appends_package() {
    let mods = tempfile::tempdir().unwrap();
    let downloads = tempfile::tempdir().unwrap();
    write_package(mods.path(), "base", "");
    write_package(downloads.path(), "addon", r#", "Dependencies": ["base"]"#);
    write_content(downloads.path(), "addon", "bonus.json", r#"{"$type": "Item"}"#);

    let mut mgr = manager(mods.path());
    mgr.load_all().unwrap();
    let id = mgr.load_from_path(&downloads.path().join("addon")).unwrap();
    assert_eq!(id, "addon");
    assert!(mgr.assets().has("addon:bonus"));
    assert_eq!(
        mgr.loaded_ids(),
        vec![PackageId::from("base"), PackageId::from("addon")]
    );
}

#[test]
fn dependency_added_on_reload_orders_teardown() {
    let dir = tempfile::tempdir().unwrap();
    write_package(dir.path(), "a", "");
    write_package(dir.path(), "b", "");

    let mut mgr = manager(dir.path());
    mgr.load_all().unwrap();
    assert_eq!(mgr.loaded_ids(), vec![PackageId::from("a"), PackageId::from("b")]);

    write_package(dir.path(), "a", r#", "Dependencies": ["b"]"#);
    mgr.reload("a").unwrap();
    assert_eq!(mgr.loaded_ids(), vec![PackageId::from("b"), PackageId::from("a")]);

    let unloaded = mgr.unload_all();
    assert_eq!(unloaded, vec![PackageId::from("a"), PackageId::from("b")]);
    assert!(mgr.loaded_ids().is_empty());
}

#[test]
fn unload_all_survives_dependency_cycle() {
    let dir = tempfile::tempdir().unwrap();
    write_package(dir.path(), "a", "");
    write_package(dir.path(), "b", r#", "Dependencies": ["a"]"#);

    let mut mgr = manager(dir.path());
    mgr.load_all().unwrap();
    write_package(dir.path(), "a", r#", "Dependencies": ["b"]"#);
    mgr.reload("a").unwrap();
    assert!(mgr.unload("a").is_err());
    assert!(mgr.unload("b").is_err());

    assert_eq!(mgr.unload_all().len(), 2);
    assert!(mgr.loaded_ids().is_empty());
}

#[test]
fn event_order_follows_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    write_package(dir.path(), "p", "");

    let log = Rc::new(RefCell::new(Vec::new()));
    let mut mgr = manager(dir.path());
    let l = Rc::clone(&log);
    mgr.events_mut().on_any(move |e| l.borrow_mut().push(e.kind()));

    mgr.load_all().unwrap();
    mgr.reload("p").unwrap();
    mgr.unload("p").unwrap();
    assert_eq!(
        *log.borrow(),
        vec![EventKind::Loaded, EventKind::Reloaded, EventKind::Unloaded]
    );
}

#[test]
fn host_registers_types_after_construction() {
    let dir = tempfile::tempdir().unwrap();
    write_package(dir.path(), "p", "");
    write_content(dir.path(), "p", "note.json", r#"{"$type": "Note"}"#);

    #[derive(Debug, Default)]
    struct Note;

    let mut mgr = ModManager::new(
        ModHostConfig::new(dir.path()),
        TypeCatalog::new(),
        AssetStore::new(),
    );
    mgr.types_mut()
        .register("Note", TypeDescriptor::builder::<Note>().build());
    assert!(mgr.types().has("Note"));

    mgr.load_all().unwrap();
    assert!(mgr.asset::<Note>("p:note").is_some());
}
