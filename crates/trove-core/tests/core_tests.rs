use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use trove_core::{
    DataKind, Entry, EntryKind, Location, LocationBuilder, LocationType, MemoryBackend, Payload,
    Repository, RepositoryError, RepositoryEvent, RepositoryKind, RepositoryListener,
    RepositoryMeta,
};

fn hash_of(location: &Location) -> u64 {
    let mut hasher = DefaultHasher::new();
    location.hash(&mut hasher);
    hasher.finish()
}

fn local(backend: Arc<MemoryBackend>) -> Repository {
    Repository::new(
        "Local",
        RepositoryMeta::new(RepositoryKind::Local).with_connections(true),
        backend,
    )
}

fn recorder(repository: &Repository) -> Arc<Mutex<Vec<RepositoryEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    repository.add_listener(Arc::new(move |event: &RepositoryEvent| {
        sink.lock().unwrap().push(event.clone());
    }));
    events
}

#[test]
fn test_absolute_round_trip() {
    for text in [
        "//Local/",
        "//Local/a",
        "//Local/a/b/c",
        "//Samples/processes/01 - Basics",
        "//Remote Server/data.v2/x",
    ] {
        let location = Location::parse(text).unwrap();
        assert_eq!(location.to_absolute_string(), text);
        assert_eq!(location.to_string(), text);
    }
}

#[test]
fn test_parent_plus_name_round_trip() {
    for text in ["//Local/a", "//Local/a/b", "//Local/a/b/c d"] {
        let location = Location::parse(text).unwrap();
        let parent = location.parent().unwrap();
        let rebuilt =
            Location::parse(&format!("{}/{}", parent.to_absolute_string(), location.name()))
                .unwrap();
        assert_eq!(rebuilt, location);
    }
    assert!(Location::parse("//Local/").unwrap().parent().is_none());
}

#[test]
fn test_make_relative_round_trip() {
    let builder = LocationBuilder::new();
    let cases = [
        ("//Local/a/b/c", "//Local/a/x/y"),
        ("//Local/a/b", "//Local/a/b"),
        ("//Local/a/b/c", "//Local/a"),
        ("//Local/p", "//Local/q/r/s"),
        ("//Local/a", "//Local/"),
    ];

    for (target, base) in cases {
        let target = Location::parse(target).unwrap();
        let base = Location::parse(base).unwrap();
        let relative = target.make_relative(&base);
        let resolved = builder.build_from_parent(&base, &relative).unwrap();
        assert_eq!(resolved, target, "{relative} against {base}");
    }
}

#[test]
fn test_make_relative_special_cases() {
    let base = Location::parse("//Local/projects/etl").unwrap();

    let other_repository = Location::parse("//Remote/projects/etl/p").unwrap();
    assert_eq!(
        other_repository.make_relative(&base),
        "//Remote/projects/etl/p"
    );

    let connection = Location::parse("//Local/Connections/db").unwrap();
    assert_eq!(connection.make_relative(&base), "/Connections/db");

    let lenient = Location::parse("//Local/connections/db").unwrap();
    assert_eq!(
        lenient.make_relative_with(&base, |n| n.eq_ignore_ascii_case("connections")),
        "/connections/db"
    );
}

#[test]
fn test_excess_parent_tokens_are_clamped() {
    let base = Location::parse("//Local/a").unwrap();
    let resolved = LocationBuilder::new()
        .build_from_parent(&base, "../../../../b/./c")
        .unwrap();
    assert_eq!(resolved.to_absolute_string(), "//Local/b/c");
}

#[test]
fn test_location_equality_and_hash() {
    let plain = LocationBuilder::new()
        .with_location_type(LocationType::DataEntry)
        .build_from_absolute("//Local/a/p")
        .unwrap();
    let strict = LocationBuilder::new()
        .with_location_type(LocationType::DataEntry)
        .with_strict_on_duplicate(true)
        .build_from_absolute("//Local/a/p")
        .unwrap();
    let folder = LocationBuilder::new()
        .with_location_type(LocationType::Folder)
        .build_from_absolute("//Local/a/p")
        .unwrap();
    let process = LocationBuilder::new()
        .with_expected_kind(DataKind::Process)
        .build_from_absolute("//Local/a/p")
        .unwrap();

    assert_eq!(plain, strict);
    assert_eq!(hash_of(&plain), hash_of(&strict));
    assert_ne!(plain, folder);
    assert_ne!(plain, process);
    assert_eq!(process.location_type(), LocationType::DataEntry);
}

#[test]
fn test_location_serializes_identity_fields() {
    let location = LocationBuilder::new()
        .with_expected_kind(DataKind::IoObject)
        .build_from_absolute("//Local/results/r")
        .unwrap();
    let json = serde_json::to_value(&location).unwrap();
    assert_eq!(json["repository"], "Local");
    assert_eq!(json["components"][1], "r");
    assert_eq!(json["location_type"], "data_entry");
    assert_eq!(json["expected_kind"], "io_object");

    let back: Location = serde_json::from_value(json).unwrap();
    assert_eq!(back, location);

    let invalid = serde_json::json!({ "repository": "", "components": ["a"] });
    assert!(serde_json::from_value::<Location>(invalid).is_err());
}

#[test]
fn test_repository_location_of() {
    let backend = MemoryBackend::new().into_shared();
    let b = backend.ensure_folders(&["a", "b"]);
    let p = backend.insert_data(b, "p", EntryKind::data(DataKind::Process), "<process/>");
    let repository = local(backend);

    let entry = repository.entry(p).unwrap();
    let location = repository.location_of(&entry).unwrap();
    assert_eq!(location.to_absolute_string(), "//Local/a/b/p");
    assert_eq!(location.expected_kind(), DataKind::Process);

    let root = repository.root().unwrap();
    assert!(repository.location_of(&root).unwrap().is_root());
}

#[test]
fn test_repository_emits_events() {
    let backend = MemoryBackend::new().into_shared();
    let repository = local(backend);
    let events = recorder(&repository);
    let root = repository.root().unwrap();

    let a = repository.create_folder(&root, "a").unwrap();
    let b = repository.create_folder(&root, "b").unwrap();
    let p = repository
        .create_data_entry(&a, "p", &EntryKind::data(DataKind::Process), "v1".into())
        .unwrap();
    repository.write(&p, Payload::from("v2")).unwrap();
    let moved = repository.relocate(&p, &b, Some("q")).unwrap();
    repository.refresh(&b).unwrap();
    repository.delete(&moved).unwrap();

    let tags: Vec<&str> = events
        .lock()
        .unwrap()
        .iter()
        .map(|e| match e {
            RepositoryEvent::EntryAdded { .. } => "added",
            RepositoryEvent::EntryChanged { .. } => "changed",
            RepositoryEvent::EntryRemoved { .. } => "removed",
            RepositoryEvent::EntryMoved { .. } => "moved",
            RepositoryEvent::FolderRefreshed { .. } => "refreshed",
        })
        .collect();

    // The closure listener predates moves and sees a change instead.
    assert_eq!(
        tags,
        ["added", "added", "added", "changed", "changed", "refreshed", "removed"]
    );
}

#[test]
fn test_move_aware_listener() {
    struct Aware(Mutex<Vec<RepositoryEvent>>);

    impl RepositoryListener for Aware {
        fn on_event(&self, event: &RepositoryEvent) {
            self.0.lock().unwrap().push(event.clone());
        }

        fn understands_moves(&self) -> bool {
            true
        }
    }

    let backend = MemoryBackend::new().into_shared();
    let a = backend.ensure_folders(&["a"]);
    let b = backend.ensure_folders(&["b"]);
    let repository = local(backend);
    let aware = Arc::new(Aware(Mutex::new(Vec::new())));
    repository.add_listener(aware.clone());

    let a = repository.entry(a).unwrap();
    let b = repository.entry(b).unwrap();
    repository.relocate(&a, &b, None).unwrap();

    let seen = aware.0.lock().unwrap();
    match &seen[0] {
        RepositoryEvent::EntryMoved {
            former_name,
            former_parent,
            entry,
            ..
        } => {
            assert_eq!(former_name, "a");
            assert_eq!(*former_parent, Some(repository.backend().root()));
            assert_eq!(entry.parent, Some(b.id));
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn test_custom_connections_folder_name() {
    let backend = MemoryBackend::new()
        .with_connections_folder("Links")
        .into_shared();
    let links = backend.ensure_folders(&["Links"]);
    let plain = backend.ensure_folders(&["Connections"]);
    let repository = local(backend);
    let links = repository.entry(links).unwrap();
    let plain = repository.entry(plain).unwrap();

    assert!(repository.is_connections_folder(&links));
    assert!(!repository.is_connections_folder(&plain));
    assert!(matches!(
        repository.delete(&links),
        Err(RepositoryError::ConnectionFolderImmutable { .. })
    ));
    repository.delete(&plain).unwrap();

    let location = Location::parse("//Local/Links/db").unwrap();
    let base = Location::parse("//Local/a/b").unwrap();
    assert_eq!(
        location.make_relative_with(&base, |name| repository.is_connections_folder_name(name)),
        "/Links/db"
    );
}

#[test]
fn test_connections_folder_is_immutable() {
    let backend = MemoryBackend::new().into_shared();
    let connections = backend.ensure_folders(&["Connections"]);
    let other = backend.ensure_folders(&["other"]);
    let repository = local(backend);
    let connections = repository.entry(connections).unwrap();
    let other = repository.entry(other).unwrap();

    assert!(repository.is_connections_folder(&connections));
    assert!(matches!(
        repository.create_folder(&connections, "nested"),
        Err(RepositoryError::ConnectionFolderImmutable { .. })
    ));
    assert!(matches!(
        repository.rename(&connections, "Links"),
        Err(RepositoryError::ConnectionFolderImmutable { .. })
    ));
    assert!(matches!(
        repository.delete(&connections),
        Err(RepositoryError::ConnectionFolderImmutable { .. })
    ));
    assert!(matches!(
        repository.relocate(&other, &connections, None),
        Err(RepositoryError::ConnectionFolderImmutable { .. })
    ));

    let connection = repository
        .create_data_entry(
            &connections,
            "warehouse",
            &EntryKind::data(DataKind::Connection),
            "jdbc:".into(),
        )
        .unwrap();
    assert_eq!(connection.data_kind(), Some(DataKind::Connection));
}

#[test]
fn test_connections_unsupported() {
    let backend = MemoryBackend::new().into_shared();
    let repository = Repository::new(
        "Remote",
        RepositoryMeta::new(RepositoryKind::Remote),
        backend,
    );
    let root = repository.root().unwrap();
    let err = repository
        .create_data_entry(
            &root,
            "db",
            &EntryKind::data(DataKind::Connection),
            Payload::default(),
        )
        .unwrap_err();
    assert!(matches!(err, RepositoryError::ConnectionsUnsupported { .. }));
}

#[test]
fn test_writes_validate_names() {
    let backend = MemoryBackend::new().into_shared();
    let repository = local(backend);
    let root = repository.root().unwrap();

    for name in ["a/b", "a:b", ".git", "", " x"] {
        assert!(
            matches!(
                repository.create_folder(&root, name),
                Err(RepositoryError::InvalidName { .. })
            ),
            "{name:?} should be rejected"
        );
    }
}

#[test]
fn test_backend_failures_are_wrapped_once() {
    let backend = MemoryBackend::new().into_shared();
    let p = backend.insert_data(
        backend.ensure_folders(&["a"]),
        "p",
        EntryKind::data(DataKind::Binary),
        "bytes",
    );
    backend.fail_reads_of(p);
    let repository = local(backend);
    let entry = repository.entry(p).unwrap();

    let err = repository.read(&entry).unwrap_err();
    assert!(err.is_backend_failure());
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn test_read_only_bundle() {
    let backend = MemoryBackend::new().with_read_only(true).into_shared();
    backend.ensure_folders(&["processes"]);
    let repository = Repository::new(
        "Samples",
        RepositoryMeta::new(RepositoryKind::ResourceBundle),
        backend,
    );
    assert!(repository.is_read_only());

    let root = repository.root().unwrap();
    assert!(repository.create_folder(&root, "mine").is_err());
    assert_eq!(repository.list_folders(&root).unwrap().len(), 1);
}

#[test]
fn test_list_complete_refreshes_only_when_blocking() {
    let backend = MemoryBackend::new().into_shared();
    let root_id = backend.ensure_folders(&[]);
    backend.insert_data(root_id, "ready", EntryKind::data(DataKind::Blob), "x");
    let repository = local(backend.clone());
    let root = repository.root().unwrap();

    assert_eq!(repository.list_complete(&root).unwrap().len(), 1);
    assert_eq!(backend.refresh_count(root_id), 0);

    backend.insert_lazy(
        root_id,
        "late",
        EntryKind::data(DataKind::Blob),
        Payload::default(),
        1,
    );
    assert_eq!(repository.list_complete(&root).unwrap().len(), 2);
    assert_eq!(backend.refresh_count(root_id), 1);
}

#[test]
fn test_entry_kind_helpers() {
    let entry = Entry::new_data(
        trove_core::NodeId::new(9),
        "r",
        EntryKind::data_with_format(DataKind::IoObject, "table"),
        trove_core::NodeId::new(1),
    );
    assert!(entry.is_data());
    assert_eq!(entry.kind.location_type(), LocationType::DataEntry);
}
