//! Folder creation along a path.

use tracing::debug;
use trove_core::{
    Entry, Location, LocationType, Repository, RepositoryError, RepositoryLookup, Result,
};

use crate::resolver::{Resolution, locate};

/// Create the folder at `location` and every missing folder above it.
///
/// A create that fails because another writer created the same folder first is
/// recovered by resolving the folder again; the failure is raised only if the
/// folder still cannot be found.
pub fn create_folders_recursively(repository: &Repository, location: &Location) -> Result<Entry> {
    if location.location_type() == LocationType::DataEntry {
        return Err(RepositoryError::WrongLocationType {
            location: location.to_absolute_string(),
            expected: LocationType::Folder,
            actual: LocationType::DataEntry,
        });
    }

    let mut missing = Vec::new();
    let mut cursor = Some(location.to_folder());
    let mut parent = loop {
        let Some(current) = cursor else {
            break repository.root()?;
        };
        match locate(repository, &current, false)? {
            Resolution::Found(folder) => break folder,
            Resolution::NotFound | Resolution::WouldBlock => {
                cursor = current.parent();
                missing.push(current);
            }
        }
    };

    for folder in missing.into_iter().rev() {
        parent = match repository.create_folder(&parent, folder.name()) {
            Ok(created) => created,
            Err(err) if err.is_backend_failure() => {
                debug!(location = %folder, error = %err, "create failed, resolving again");
                match locate(repository, &folder, false)? {
                    Resolution::Found(existing) => existing,
                    Resolution::NotFound | Resolution::WouldBlock => return Err(err),
                }
            }
            Err(err) => return Err(err),
        };
    }

    Ok(parent)
}

/// Look up the location's repository and create the folder chain in it.
pub fn create_folders<L>(lookup: &L, location: &Location) -> Result<(Location, Entry)>
where
    L: RepositoryLookup + ?Sized,
{
    let repository = lookup.repository(location.repository_name())?;
    let folder = create_folders_recursively(&repository, location)?;
    Ok((repository.location_of(&folder)?, folder))
}
