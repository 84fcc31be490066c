//! Name collisions at a copy or move destination.

use tracing::debug;
use trove_core::{Entry, EntryKind, Repository, Result};

/// Separator between a name and its collision counter.
pub const COLLISION_SEPARATOR: &str = " - ";

/// First counter tried when a name is taken.
const FIRST_COUNTER: u64 = 2;

/// Find a free variant of `base`: `base`, then `base - 2`, `base - 3`, ...
pub fn collision_free_name(base: &str, is_taken: impl Fn(&str) -> bool) -> String {
    if !is_taken(base) {
        return base.to_string();
    }

    let mut counter = FIRST_COUNTER;
    loop {
        let candidate = format!("{base}{COLLISION_SEPARATOR}{counter}");
        if !is_taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Where an incoming entry lands in its destination folder.
#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    /// The name is free.
    Free(String),
    /// The entry would replace itself; nothing to do.
    Unchanged,
    /// `existing` must be deleted first.
    Replace { name: String, existing: Entry },
}

/// Decide the placement of `source` (of `source_repository`) as `name` in `folder`.
///
/// Any child with the same name counts as taken, whatever its kind. With
/// `overwrite`, that child is replaced unless it is the source itself; a
/// same-kind child is preferred when several share the name. Without it, the
/// collision counter picks a free name.
pub(crate) fn place(
    source_repository: &Repository,
    source: &Entry,
    repository: &Repository,
    folder: &Entry,
    name: &str,
    overwrite: bool,
) -> Result<Placement> {
    let snapshot = repository.list_complete(folder)?;
    let kind: &EntryKind = &source.kind;

    let Some(existing) = snapshot
        .find_conflicting(name, kind)
        .or_else(|| snapshot.find_named(name))
    else {
        return Ok(Placement::Free(name.to_string()));
    };

    if overwrite {
        if existing.id == source.id && source_repository.name() == repository.name() {
            return Ok(Placement::Unchanged);
        }
        return Ok(Placement::Replace {
            name: name.to_string(),
            existing: existing.clone(),
        });
    }

    let free = collision_free_name(name, |candidate| snapshot.contains_name(candidate));
    debug!(repository = repository.name(), from = name, to = %free, "name taken, renaming");
    Ok(Placement::Free(free))
}
