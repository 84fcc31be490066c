use std::sync::Arc;

use trove_core::{
    DataKind, EntryKind, Location, LocationBuilder, MemoryBackend, Payload, Repository,
    RepositoryError, RepositoryKind, RepositoryMeta,
};
use trove_ops::{
    ChannelProgress, CopyOptions, MoveOptions, NullProgress, OperationType, PROGRESS_TOTAL,
    ProgressInterval, ProgressListener, Resolution, copy_to, locate, locate_data, move_to,
    resolve,
};

/// Records every completed value it is given.
#[derive(Default)]
struct Recorder {
    total: u64,
    completed: Vec<u64>,
    finished: bool,
}

impl ProgressListener for Recorder {
    fn set_total(&mut self, total: u64) {
        self.total = total;
    }

    fn set_completed(&mut self, completed: u64) {
        self.completed.push(completed);
    }

    fn complete(&mut self) {
        self.finished = true;
    }
}

fn mount(name: &str) -> (Arc<MemoryBackend>, Vec<Arc<Repository>>) {
    let backend = MemoryBackend::new().into_shared();
    let repository = Arc::new(Repository::new(
        name,
        RepositoryMeta::new(RepositoryKind::Local).with_connections(true),
        backend.clone(),
    ));
    (backend, vec![repository])
}

fn exists(lookup: &[Arc<Repository>], text: &str) -> bool {
    resolve(lookup, &Location::parse(text).unwrap(), false)
        .unwrap()
        .is_found()
}

#[test]
fn test_copy_folder_with_collision_end_to_end() {
    let (backend, lookup) = mount("R");
    let b = backend.ensure_folders(&["a", "b"]);
    backend.insert_folder(b, "c");
    backend.insert_data(b, "d", EntryKind::data(DataKind::Process), "<process/>");
    backend.ensure_folders(&["x", "b"]);

    let copy = copy_to(
        &lookup,
        &Location::parse("//R/a/b").unwrap(),
        &Location::parse("//R/x").unwrap(),
        &CopyOptions::default(),
        &mut NullProgress,
    )
    .unwrap()
    .unwrap();

    assert_eq!(copy.to_absolute_string(), "//R/x/b - 2");
    assert!(exists(&lookup, "//R/x/b - 2/c"));
    assert!(exists(&lookup, "//R/x/b - 2/d"));
    assert!(exists(&lookup, "//R/a/b/c"));
}

#[test]
fn test_collision_counter_continues_past_taken_names() {
    let (backend, lookup) = mount("R");
    let source = backend.ensure_folders(&["src"]);
    backend.insert_data(source, "X", EntryKind::data(DataKind::Binary), "new");
    let destination = backend.ensure_folders(&["dst"]);
    for name in ["X", "X - 2", "X - 3", "X - 4", "X - 5"] {
        backend.insert_data(destination, name, EntryKind::data(DataKind::Binary), "old");
    }

    let copy = copy_to(
        &lookup,
        &Location::parse("//R/src/X").unwrap(),
        &Location::parse("//R/dst").unwrap(),
        &CopyOptions::default(),
        &mut NullProgress,
    )
    .unwrap()
    .unwrap();
    assert_eq!(copy.name(), "X - 6");
}

#[test]
fn test_same_name_of_another_kind_collides() {
    let (backend, lookup) = mount("R");
    let source = backend.ensure_folders(&["src"]);
    backend.insert_data(source, "X", EntryKind::data(DataKind::Process), "p");
    let destination = backend.ensure_folders(&["dst"]);
    backend.insert_data(destination, "X", EntryKind::data(DataKind::IoObject), "i");

    let copy = copy_to(
        &lookup,
        &Location::parse("//R/src/X").unwrap(),
        &Location::parse("//R/dst").unwrap(),
        &CopyOptions::default(),
        &mut NullProgress,
    )
    .unwrap()
    .unwrap();
    assert_eq!(copy.name(), "X - 2");
    assert!(exists(&lookup, "//R/dst/X - 2"));
}

#[test]
fn test_folder_collides_with_data_entry() {
    let (backend, lookup) = mount("R");
    let b = backend.ensure_folders(&["a", "b"]);
    backend.insert_data(b, "d", EntryKind::data(DataKind::Binary), "bytes");
    let x = backend.ensure_folders(&["x"]);
    backend.insert_data(x, "b", EntryKind::data(DataKind::Process), "<process/>");

    let copy = copy_to(
        &lookup,
        &Location::parse("//R/a/b").unwrap(),
        &Location::parse("//R/x").unwrap(),
        &CopyOptions::default(),
        &mut NullProgress,
    )
    .unwrap()
    .unwrap();
    assert_eq!(copy.to_absolute_string(), "//R/x/b - 2");
    assert!(exists(&lookup, "//R/x/b - 2/d"));
    assert!(exists(&lookup, "//R/x/b"));
}

#[test]
fn test_overwrite_replaces_entry_of_another_kind() {
    let (backend, lookup) = mount("R");
    backend.ensure_folders(&["a", "b"]);
    let x = backend.ensure_folders(&["x"]);
    backend.insert_data(x, "b", EntryKind::data(DataKind::Process), "<process/>");

    let copy = copy_to(
        &lookup,
        &Location::parse("//R/a/b").unwrap(),
        &Location::parse("//R/x").unwrap(),
        &CopyOptions::default().with_overwrite(true),
        &mut NullProgress,
    )
    .unwrap()
    .unwrap();
    assert_eq!(copy.to_absolute_string(), "//R/x/b");
    assert!(!exists(&lookup, "//R/x/b - 2"));

    let resolution = resolve(&lookup, &Location::parse("//R/x").unwrap(), false).unwrap();
    let Resolution::Found(x) = resolution else {
        panic!("destination folder missing");
    };
    let snapshot = lookup[0].list_complete(&x).unwrap();
    assert_eq!(snapshot.len(), 1);
    assert!(snapshot.entries()[0].is_folder());
}

#[test]
fn test_overwrite_replaces_existing() {
    let (backend, lookup) = mount("R");
    let source = backend.ensure_folders(&["src"]);
    backend.insert_data(source, "X", EntryKind::data(DataKind::Binary), "new");
    let destination = backend.ensure_folders(&["dst"]);
    backend.insert_data(destination, "X", EntryKind::data(DataKind::Binary), "old");

    copy_to(
        &lookup,
        &Location::parse("//R/src/X").unwrap(),
        &Location::parse("//R/dst").unwrap(),
        &CopyOptions::default().with_overwrite(true),
        &mut NullProgress,
    )
    .unwrap();

    let repository = &lookup[0];
    let folder = repository.entry(destination).unwrap();
    let entries = repository.list_data_entries(&folder).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(repository.read(&entries[0]).unwrap(), Payload::from("new"));
}

#[test]
fn test_nested_copy_progress_stays_in_bounds() {
    let (backend, lookup) = mount("R");
    let top = backend.ensure_folders(&["top"]);
    for i in 0..3 {
        let sub = backend.insert_folder(top, &format!("sub{i}"));
        for j in 0..=i {
            backend.insert_data(sub, &format!("d{j}"), EntryKind::data(DataKind::Blob), "x");
        }
    }
    backend.insert_data(top, "leaf", EntryKind::data(DataKind::Blob), "x");
    backend.ensure_folders(&["dst"]);

    let mut recorder = Recorder::default();
    copy_to(
        &lookup,
        &Location::parse("//R/top").unwrap(),
        &Location::parse("//R/dst").unwrap(),
        &CopyOptions::default(),
        &mut recorder,
    )
    .unwrap();

    assert_eq!(recorder.total, PROGRESS_TOTAL);
    assert!(recorder.finished);
    assert!(recorder.completed.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(recorder.completed.last().copied(), Some(PROGRESS_TOTAL));
}

#[test]
fn test_progress_partition() {
    let interval = ProgressInterval::new(1_000, 9_000);
    for parts in 1..=9 {
        let pieces = interval.split(parts);
        assert_eq!(pieces.first().map(|p| p.min), Some(1_000));
        assert_eq!(pieces.last().map(|p| p.max), Some(9_000));
        for pair in pieces.windows(2) {
            assert_eq!(pair[0].max, pair[1].min);
            assert!(pair[0].max > pair[0].min);
        }
    }
}

#[test]
fn test_miss_refreshes_exactly_once() {
    let (backend, lookup) = mount("R");
    let folder = backend.ensure_folders(&["a"]);
    backend.insert_lazy(
        folder,
        "late",
        EntryKind::data(DataKind::Process),
        Payload::default(),
        2,
    );

    let location = Location::parse("//R/a/late").unwrap();
    let resolution = resolve(&lookup, &location, false).unwrap();
    assert_eq!(resolution, Resolution::NotFound);
    assert_eq!(backend.refresh_count(folder), 1);
    assert_eq!(backend.total_refreshes(), 1);

    // The second refresh materializes it.
    assert!(resolve(&lookup, &location, false).unwrap().is_found());
    assert_eq!(backend.refresh_count(folder), 2);
}

#[test]
fn test_miss_in_intermediate_segment_refreshes_once() {
    let (backend, lookup) = mount("R");
    let root = backend.ensure_folders(&[]);
    backend.insert_lazy(root, "a", EntryKind::Folder, Payload::default(), 5);

    let resolution = resolve(&lookup, &Location::parse("//R/a/b/c").unwrap(), false).unwrap();
    assert_eq!(resolution, Resolution::NotFound);
    assert_eq!(backend.total_refreshes(), 1);
}

#[test]
fn test_move_into_descendant_leaves_tree_unchanged() {
    let (backend, lookup) = mount("R");
    let b = backend.ensure_folders(&["a", "b"]);
    backend.insert_data(b, "d", EntryKind::data(DataKind::Process), "x");
    let before = backend.node_count();

    for destination in ["//R/a", "//R/a/b"] {
        let err = move_to(
            &lookup,
            &Location::parse("//R/a").unwrap(),
            &Location::parse(destination).unwrap(),
            &MoveOptions::default(),
            &mut NullProgress,
        )
        .unwrap_err();
        assert!(err.is_backend_failure());
    }

    assert_eq!(backend.node_count(), before);
    assert!(exists(&lookup, "//R/a/b/d"));
}

#[test]
fn test_strict_duplicates() {
    let (backend, lookup) = mount("R");
    let folder = backend.ensure_folders(&["results"]);
    backend.insert_data(
        folder,
        "r",
        EntryKind::data_with_format(DataKind::IoObject, "table"),
        "t",
    );
    backend.insert_data(
        folder,
        "r",
        EntryKind::data_with_format(DataKind::IoObject, "model"),
        "m",
    );
    let repository = &lookup[0];

    let lenient = LocationBuilder::new()
        .with_expected_kind(DataKind::IoObject)
        .build_from_absolute("//R/results/r")
        .unwrap();
    let first = locate_data(repository, &lenient, false)
        .unwrap()
        .found()
        .unwrap();
    assert_eq!(
        first.kind,
        EntryKind::data_with_format(DataKind::IoObject, "table")
    );

    let strict = LocationBuilder::new()
        .with_expected_kind(DataKind::IoObject)
        .with_strict_on_duplicate(true)
        .build_from_absolute("//R/results/r")
        .unwrap();
    assert!(matches!(
        locate_data(repository, &strict, false),
        Err(RepositoryError::DuplicateDataEntry { count: 2, .. })
    ));
}

#[test]
fn test_locate_with_fail_fast_on_stale_folder() {
    let (backend, lookup) = mount("R");
    let root = backend.ensure_folders(&[]);
    backend.insert_lazy(root, "a", EntryKind::Folder, Payload::default(), 1);

    let location = Location::parse("//R/a").unwrap();
    assert_eq!(
        locate(&lookup[0], &location, true).unwrap(),
        Resolution::WouldBlock
    );
    assert_eq!(backend.total_refreshes(), 0);
}

#[test]
fn test_locate_with_fail_fast_on_loaded_folder() {
    let (backend, lookup) = mount("R");
    backend.ensure_folders(&["a"]);

    let location = Location::parse("//R/a/missing").unwrap();
    assert_eq!(
        locate(&lookup[0], &location, true).unwrap(),
        Resolution::NotFound
    );
    assert_eq!(backend.total_refreshes(), 0);
}

#[test]
fn test_cross_repository_copy_reports_through_channel() {
    let (source_backend, mut lookup) = mount("A");
    let (_, other) = mount("B");
    lookup.extend(other);
    let folder = source_backend.ensure_folders(&["f"]);
    source_backend.insert_data(folder, "one", EntryKind::data(DataKind::Binary), "1");
    source_backend.insert_data(folder, "two", EntryKind::data(DataKind::Binary), "2");

    let (mut progress, mut rx) = ChannelProgress::new(OperationType::Copy);
    copy_to(
        &lookup,
        &Location::parse("//A/f").unwrap(),
        &Location::parse("//B/").unwrap(),
        &CopyOptions::default().with_new_name("g"),
        &mut progress,
    )
    .unwrap();

    let updates: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
    assert!(updates.last().is_some_and(|u| u.finished));
    assert!(exists(&lookup, "//B/g/one"));
    assert!(exists(&lookup, "//B/g/two"));
}

#[test]
fn test_unknown_repository() {
    let (_, lookup) = mount("R");
    let err = resolve(&lookup, &Location::parse("//Nope/a").unwrap(), false).unwrap_err();
    assert!(matches!(err, RepositoryError::UnknownRepository { .. }));
}
