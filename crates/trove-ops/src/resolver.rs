//! Location resolution against a lazily materialized tree.
//!
//! Resolution walks the path one segment at a time over the folder snapshots a
//! repository already holds. A miss triggers at most one refresh of the folder
//! being searched, and the match is retried once against the new snapshot.
//! Absence is an ordinary outcome ([`Resolution::NotFound`]); only backend
//! failures and contract violations are errors.

use std::sync::Arc;

use tracing::{debug, warn};
use trove_core::{
    DataKind, Entry, Location, LocationType, Repository, RepositoryError, RepositoryLookup,
    Result, Snapshot,
};

/// Outcome of resolving a location.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The addressed entry.
    Found(Entry),
    /// Nothing exists at the location, even after a refresh.
    NotFound,
    /// A fail-fast lookup missed and would have had to refresh.
    WouldBlock,
}

impl Resolution {
    /// The entry, if found.
    pub fn found(self) -> Option<Entry> {
        match self {
            Self::Found(entry) => Some(entry),
            Self::NotFound | Self::WouldBlock => None,
        }
    }

    /// Check if an entry was found.
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

enum Lookup<T> {
    Hit(T),
    Miss,
    WouldBlock,
}

/// Search one folder, refreshing it once on a miss.
///
/// With `fail_fast`, a miss never refreshes: it reports `WouldBlock` when the
/// folder has unloaded children and a plain miss otherwise.
fn search<T>(
    repository: &Repository,
    folder: &Entry,
    fail_fast: bool,
    find: impl Fn(&Snapshot) -> Option<T>,
) -> Result<Lookup<T>> {
    let snapshot = repository.list(folder)?;
    if let Some(hit) = find(&snapshot) {
        return Ok(Lookup::Hit(hit));
    }
    if fail_fast {
        if repository.will_block(folder) {
            return Ok(Lookup::WouldBlock);
        }
        return Ok(Lookup::Miss);
    }

    debug!(
        repository = repository.name(),
        folder = %folder.name,
        "miss, refreshing folder once"
    );
    let refreshed = repository.refresh(folder)?;
    Ok(find(&refreshed).map_or(Lookup::Miss, Lookup::Hit))
}

fn data_candidates(snapshot: &Snapshot, name: &str, expected: DataKind) -> Option<Vec<Entry>> {
    let matches: Vec<Entry> = snapshot.matching_data(name, expected).cloned().collect();
    (!matches.is_empty()).then_some(matches)
}

/// Pick one of several same-named data entries.
fn pick_data(location: &Location, mut candidates: Vec<Entry>) -> Result<Entry> {
    let mut distinct: Vec<&Entry> = Vec::new();
    for candidate in &candidates {
        if !distinct.iter().any(|d| d.kind == candidate.kind) {
            distinct.push(candidate);
        }
    }

    if distinct.len() > 1 {
        if location.strict_on_duplicate() && location.expected_kind().is_ambiguity_prone() {
            return Err(RepositoryError::DuplicateDataEntry {
                location: location.to_absolute_string(),
                count: distinct.len(),
            });
        }
        warn!(
            location = %location,
            count = distinct.len(),
            "several data entries share this name, using the first"
        );
    }

    Ok(candidates.swap_remove(0))
}

/// Resolve `location` inside `repository`.
///
/// With `fail_fast`, a miss returns [`Resolution::WouldBlock`] instead of
/// refreshing.
pub fn locate(repository: &Repository, location: &Location, fail_fast: bool) -> Result<Resolution> {
    if location.repository_name() != repository.name() {
        return Err(RepositoryError::failure(format!(
            "{location} does not belong to repository '{}'",
            repository.name()
        )));
    }

    let mut cursor = repository.root()?;
    let Some((last, ancestors)) = location.components().split_last() else {
        return Ok(match location.location_type() {
            LocationType::DataEntry => Resolution::NotFound,
            LocationType::Folder | LocationType::Unknown => Resolution::Found(cursor),
        });
    };

    for segment in ancestors {
        match search(repository, &cursor, fail_fast, |s| s.find_folder(segment).cloned())? {
            Lookup::Hit(folder) => cursor = folder,
            Lookup::Miss => return Ok(Resolution::NotFound),
            Lookup::WouldBlock => return Ok(Resolution::WouldBlock),
        }
    }

    let expected = location.expected_kind();
    let lookup = match location.location_type() {
        LocationType::Folder => {
            search(repository, &cursor, fail_fast, |s| {
                s.find_folder(last).cloned().map(|f| vec![f])
            })?
        }
        LocationType::DataEntry => search(repository, &cursor, fail_fast, |s| {
            data_candidates(s, last, expected)
        })?,
        LocationType::Unknown => search(repository, &cursor, fail_fast, |s| {
            s.find_folder(last)
                .cloned()
                .map(|f| vec![f])
                .or_else(|| data_candidates(s, last, DataKind::Any))
        })?,
    };

    match lookup {
        Lookup::Hit(candidates) if candidates[0].is_folder() => {
            Ok(Resolution::Found(candidates[0].clone()))
        }
        Lookup::Hit(candidates) => pick_data(location, candidates).map(Resolution::Found),
        Lookup::Miss => Ok(Resolution::NotFound),
        Lookup::WouldBlock => Ok(Resolution::WouldBlock),
    }
}

/// Resolve a folder location. Fails before walking if the location addresses a data entry.
pub fn locate_folder(
    repository: &Repository,
    location: &Location,
    fail_fast: bool,
) -> Result<Resolution> {
    if location.location_type() == LocationType::DataEntry {
        return Err(RepositoryError::WrongLocationType {
            location: location.to_absolute_string(),
            expected: LocationType::Folder,
            actual: LocationType::DataEntry,
        });
    }
    locate(repository, &location.to_folder(), fail_fast)
}

/// Resolve a data entry location. Fails before walking if the location addresses a folder.
pub fn locate_data(
    repository: &Repository,
    location: &Location,
    fail_fast: bool,
) -> Result<Resolution> {
    if location.location_type() == LocationType::Folder {
        return Err(RepositoryError::WrongLocationType {
            location: location.to_absolute_string(),
            expected: LocationType::DataEntry,
            actual: LocationType::Folder,
        });
    }
    locate(repository, &location.to_data_entry(), fail_fast)
}

/// Look up the location's repository and resolve the location in it.
pub fn resolve<L>(lookup: &L, location: &Location, fail_fast: bool) -> Result<Resolution>
where
    L: RepositoryLookup + ?Sized,
{
    let repository = lookup.repository(location.repository_name())?;
    locate(&repository, location, fail_fast)
}

fn require(
    location: &Location,
    repository: Arc<Repository>,
    resolution: Resolution,
) -> Result<(Arc<Repository>, Entry)> {
    match resolution {
        Resolution::Found(entry) => Ok((repository, entry)),
        Resolution::NotFound | Resolution::WouldBlock => Err(RepositoryError::not_found(location)),
    }
}

/// Resolve an entry that must exist.
pub fn require_entry<L>(lookup: &L, location: &Location) -> Result<(Arc<Repository>, Entry)>
where
    L: RepositoryLookup + ?Sized,
{
    let repository = lookup.repository(location.repository_name())?;
    let resolution = locate(&repository, location, false)?;
    require(location, repository, resolution)
}

/// Resolve a folder that must exist.
pub fn require_folder<L>(lookup: &L, location: &Location) -> Result<(Arc<Repository>, Entry)>
where
    L: RepositoryLookup + ?Sized,
{
    let repository = lookup.repository(location.repository_name())?;
    let resolution = locate_folder(&repository, location, false)?;
    require(location, repository, resolution)
}

/// Resolve a data entry that must exist.
pub fn require_data<L>(lookup: &L, location: &Location) -> Result<(Arc<Repository>, Entry)>
where
    L: RepositoryLookup + ?Sized,
{
    let repository = lookup.repository(location.repository_name())?;
    let resolution = locate_data(&repository, location, false)?;
    require(location, repository, resolution)
}
