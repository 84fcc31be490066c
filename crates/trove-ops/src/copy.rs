//! Recursive copy with proportional progress.

use tracing::debug;
use trove_core::{
    Entry, Location, LocationType, Repository, RepositoryError, RepositoryLookup, Result,
};

use crate::conflict::{Placement, place};
use crate::progress::{PROGRESS_TOTAL, ProgressInterval, ProgressListener};
use crate::resolver::{require_entry, require_folder};

/// Options for copy operations.
#[derive(Debug, Clone)]
pub struct CopyOptions {
    /// Name of the copy; defaults to the source's name.
    pub new_name: Option<String>,
    /// Replace a conflicting entry instead of picking a free name.
    pub overwrite: bool,
    /// Progress scale for whole-operation calls.
    pub progress_total: u64,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            new_name: None,
            overwrite: false,
            progress_total: PROGRESS_TOTAL,
        }
    }
}

impl CopyOptions {
    /// Copy under a different name.
    pub fn with_new_name(mut self, name: impl Into<String>) -> Self {
        self.new_name = Some(name.into());
        self
    }

    /// Replace conflicting entries.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

/// Reject copying or moving a folder into itself or below itself.
pub(crate) fn reject_cycle(
    source_repository: &Repository,
    source: &Entry,
    destination_repository: &Repository,
    destination: &Entry,
) -> Result<()> {
    if !source.is_folder() || source_repository.name() != destination_repository.name() {
        return Ok(());
    }

    let source_location = source_repository.location_of(source)?;
    let destination_location = destination_repository.location_of(destination)?;
    if destination_location.same_path_as(&source_location) {
        return Err(RepositoryError::failure(format!(
            "Source and destination are the same folder: {source_location}"
        )));
    }
    if destination_location.is_descendant_of(&source_location) {
        return Err(RepositoryError::failure(format!(
            "Cannot place {source_location} inside itself ({destination_location})"
        )));
    }
    Ok(())
}

/// Reject overwriting an entry that contains the source.
pub(crate) fn reject_replacing_ancestor(
    source_repository: &Repository,
    source: &Entry,
    destination_repository: &Repository,
    existing: &Entry,
) -> Result<()> {
    if !existing.is_folder() || source_repository.name() != destination_repository.name() {
        return Ok(());
    }

    let source_location = source_repository.location_of(source)?;
    let existing_location = destination_repository.location_of(existing)?;
    if source_location.is_descendant_of(&existing_location) {
        return Err(RepositoryError::failure(format!(
            "Cannot overwrite {existing_location}: it contains {source_location}"
        )));
    }
    Ok(())
}

fn require_destination_folder(repository: &Repository, destination: &Entry) -> Result<()> {
    if destination.is_folder() {
        return Ok(());
    }
    Err(RepositoryError::WrongLocationType {
        location: repository
            .location_of(destination)
            .map(|l| l.to_absolute_string())
            .unwrap_or_else(|_| destination.name.to_string()),
        expected: LocationType::Folder,
        actual: LocationType::DataEntry,
    })
}

/// Copy `source` into the folder `destination`, reporting within `interval`.
///
/// Returns the new entry, or `None` when an overwriting copy onto the source
/// itself was suppressed. Copies are not transactional: a folder copy that fails
/// partway leaves the children copied so far in place.
pub fn copy_entry(
    source_repository: &Repository,
    source: &Entry,
    destination_repository: &Repository,
    destination: &Entry,
    options: &CopyOptions,
    progress: &mut dyn ProgressListener,
    interval: ProgressInterval,
) -> Result<Option<Entry>> {
    require_destination_folder(destination_repository, destination)?;
    reject_cycle(source_repository, source, destination_repository, destination)?;
    if source.is_folder() && destination_repository.is_connections_folder(destination) {
        return Err(RepositoryError::ConnectionFolderImmutable {
            location: destination_repository.location_of(destination)?.to_absolute_string(),
        });
    }

    let name = options.new_name.as_deref().unwrap_or(source.name.as_str());
    let name = match place(
        source_repository,
        source,
        destination_repository,
        destination,
        name,
        options.overwrite,
    )? {
        Placement::Free(name) => name,
        Placement::Unchanged => {
            debug!(entry = %source.name, "copy onto itself suppressed");
            progress.set_completed(interval.max);
            return Ok(None);
        }
        Placement::Replace { name, existing } => {
            reject_replacing_ancestor(
                source_repository,
                source,
                destination_repository,
                &existing,
            )?;
            destination_repository.delete(&existing)?;
            name
        }
    };

    copy_as(
        source_repository,
        source,
        destination_repository,
        destination,
        &name,
        progress,
        interval,
    )
    .map(Some)
}

fn copy_as(
    source_repository: &Repository,
    source: &Entry,
    destination_repository: &Repository,
    destination: &Entry,
    name: &str,
    progress: &mut dyn ProgressListener,
    interval: ProgressInterval,
) -> Result<Entry> {
    progress.set_message(&format!("Copying {}", source.name));

    if !source.is_folder() {
        let payload = source_repository.read(source)?;
        progress.set_completed(interval.midpoint());
        let copy =
            destination_repository.create_data_entry(destination, name, &source.kind, payload)?;
        progress.set_completed(interval.max);
        return Ok(copy);
    }

    let folder = destination_repository.create_folder(destination, name)?;
    let snapshot = source_repository.list_complete(source)?;
    let children: Vec<&Entry> = snapshot.folders_then_data().collect();
    debug!(
        folder = %source.name,
        children = children.len(),
        "copying folder"
    );

    if children.is_empty() {
        progress.set_completed(interval.max);
        return Ok(folder);
    }

    for (child, sub) in children.into_iter().zip(interval.split(snapshot.len())) {
        copy_as(
            source_repository,
            child,
            destination_repository,
            &folder,
            &child.name,
            progress,
            sub,
        )?;
    }
    Ok(folder)
}

/// Copy the entry at `source` into the folder at `destination`.
///
/// Reports over the whole progress scale and returns the location of the copy.
pub fn copy_to<L>(
    lookup: &L,
    source: &Location,
    destination: &Location,
    options: &CopyOptions,
    progress: &mut dyn ProgressListener,
) -> Result<Option<Location>>
where
    L: RepositoryLookup + ?Sized,
{
    let (source_repository, source_entry) = require_entry(lookup, source)?;
    let (destination_repository, folder) = require_folder(lookup, destination)?;

    progress.set_total(options.progress_total);
    let copy = copy_entry(
        &source_repository,
        &source_entry,
        &destination_repository,
        &folder,
        options,
        progress,
        ProgressInterval::whole(options.progress_total),
    )?;
    progress.complete();

    copy.map(|entry| destination_repository.location_of(&entry))
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use trove_core::{
        DataKind, EntryKind, MemoryBackend, Payload, RepositoryKind, RepositoryMeta,
    };

    use super::*;
    use crate::progress::NullProgress;

    fn setup() -> (Arc<MemoryBackend>, Repository) {
        let backend = MemoryBackend::new().into_shared();
        let repository = Repository::new(
            "R",
            RepositoryMeta::new(RepositoryKind::Local).with_connections(true),
            backend.clone(),
        );
        (backend, repository)
    }

    #[test]
    fn test_copy_leaf_keeps_kind_and_payload() {
        let (backend, repo) = setup();
        let a = backend.ensure_folders(&["a"]);
        let x = backend.ensure_folders(&["x"]);
        let p = backend.insert_data(
            a,
            "p",
            EntryKind::data_with_format(DataKind::IoObject, "table"),
            "rows",
        );

        let source = repo.entry(p).unwrap();
        let destination = repo.entry(x).unwrap();
        let copy = copy_entry(
            &repo,
            &source,
            &repo,
            &destination,
            &CopyOptions::default(),
            &mut NullProgress,
            ProgressInterval::whole(10),
        )
        .unwrap()
        .unwrap();

        assert_eq!(copy.kind, source.kind);
        assert_eq!(repo.read(&copy).unwrap(), Payload::from("rows"));
    }

    #[test]
    fn test_overwrite_onto_itself_is_noop() {
        let (backend, repo) = setup();
        let a = backend.ensure_folders(&["a"]);
        let p = backend.insert_data(a, "p", EntryKind::data(DataKind::Process), "x");
        let before = backend.node_count();

        let source = repo.entry(p).unwrap();
        let folder = repo.entry(a).unwrap();
        let result = copy_entry(
            &repo,
            &source,
            &repo,
            &folder,
            &CopyOptions::default().with_overwrite(true),
            &mut NullProgress,
            ProgressInterval::whole(10),
        )
        .unwrap();

        assert!(result.is_none());
        assert_eq!(backend.node_count(), before);
    }

    #[test]
    fn test_copy_folder_into_itself_is_rejected() {
        let (backend, repo) = setup();
        let a = backend.ensure_folders(&["a"]);
        let b = backend.ensure_folders(&["a", "b"]);
        let before = backend.node_count();

        let source = repo.entry(a).unwrap();
        for target in [a, b] {
            let destination = repo.entry(target).unwrap();
            let err = copy_entry(
                &repo,
                &source,
                &repo,
                &destination,
                &CopyOptions::default(),
                &mut NullProgress,
                ProgressInterval::whole(10),
            )
            .unwrap_err();
            assert!(err.is_backend_failure());
        }
        assert_eq!(backend.node_count(), before);
    }

    #[test]
    fn test_folder_into_connections_is_rejected() {
        let (backend, repo) = setup();
        let a = backend.ensure_folders(&["a"]);
        let connections = backend.ensure_folders(&["Connections"]);

        let err = copy_entry(
            &repo,
            &repo.entry(a).unwrap(),
            &repo,
            &repo.entry(connections).unwrap(),
            &CopyOptions::default(),
            &mut NullProgress,
            ProgressInterval::whole(10),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::ConnectionFolderImmutable { .. }
        ));
    }
}
