//! Move within a repository or across repositories.
//!
//! A move inside one repository is a reparent performed by its backend. Between
//! repositories there is no shared primitive, so the entry is copied and the
//! source deleted afterwards.

use tracing::debug;
use trove_core::{Entry, Location, Repository, RepositoryError, RepositoryLookup, Result};

use crate::conflict::{Placement, place};
use crate::copy::{CopyOptions, copy_entry, reject_cycle, reject_replacing_ancestor};
use crate::progress::{PROGRESS_TOTAL, ProgressInterval, ProgressListener};
use crate::resolver::{require_entry, require_folder};

/// Options for move operations.
#[derive(Debug, Clone)]
pub struct MoveOptions {
    /// Name at the destination; defaults to the source's name.
    pub new_name: Option<String>,
    /// Replace a conflicting entry instead of picking a free name.
    pub overwrite: bool,
    /// Progress scale for whole-operation calls.
    pub progress_total: u64,
}

impl Default for MoveOptions {
    fn default() -> Self {
        Self {
            new_name: None,
            overwrite: false,
            progress_total: PROGRESS_TOTAL,
        }
    }
}

impl MoveOptions {
    /// Move under a different name.
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

/// Move `source` into the folder `destination`, reporting within `interval`.
///
/// Returns the moved entry, or `None` if the move was a no-op.
pub fn move_entry(
    source_repository: &Repository,
    source: &Entry,
    destination_repository: &Repository,
    destination: &Entry,
    options: &MoveOptions,
    progress: &mut dyn ProgressListener,
    interval: ProgressInterval,
) -> Result<Option<Entry>> {
    if source.is_root() {
        return Err(RepositoryError::failure(format!(
            "Cannot move the root of repository '{}'",
            source_repository.name()
        )));
    }
    reject_cycle(source_repository, source, destination_repository, destination)?;

    if source_repository.name() != destination_repository.name() {
        debug!(
            from = source_repository.name(),
            to = destination_repository.name(),
            entry = %source.name,
            "moving across repositories"
        );
        let copy_options = CopyOptions {
            new_name: options.new_name.clone(),
            overwrite: options.overwrite,
            progress_total: options.progress_total,
        };
        let copy = copy_entry(
            source_repository,
            source,
            destination_repository,
            destination,
            &copy_options,
            progress,
            interval,
        )?;
        source_repository.delete(source)?;
        return Ok(copy);
    }

    progress.set_message(&format!("Moving {}", source.name));
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

    let moved = source_repository.relocate(source, destination, Some(&name))?;
    progress.set_completed(interval.max);
    Ok(Some(moved))
}

/// Move the entry at `source` into the folder at `destination`.
///
/// Reports over the whole progress scale and returns the new location.
pub fn move_to<L>(
    lookup: &L,
    source: &Location,
    destination: &Location,
    options: &MoveOptions,
    progress: &mut dyn ProgressListener,
) -> Result<Option<Location>>
where
    L: RepositoryLookup + ?Sized,
{
    let (source_repository, source_entry) = require_entry(lookup, source)?;
    let (destination_repository, folder) = require_folder(lookup, destination)?;

    progress.set_total(options.progress_total);
    let moved = move_entry(
        &source_repository,
        &source_entry,
        &destination_repository,
        &folder,
        options,
        progress,
        ProgressInterval::whole(options.progress_total),
    )?;
    progress.complete();

    moved
        .map(|entry| destination_repository.location_of(&entry))
        .transpose()
}
