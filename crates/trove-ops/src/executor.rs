//! High-level operation executor with unified result handling.

use tracing::{debug, info};
use trove_core::{Location, RepositoryLookup, Result};

use crate::copy::{CopyOptions, copy_entry};
use crate::create::create_folders;
use crate::move_op::{MoveOptions, move_entry};
use crate::operation::{OperationError, RepositoryOperation};
use crate::progress::{OperationComplete, PROGRESS_TOTAL, ProgressInterval, ProgressListener};
use crate::resolver::{require_entry, require_folder};

/// Executes [`RepositoryOperation`]s against a set of mounted repositories.
///
/// Items of a multi-source operation run in order. A failing item is recorded
/// and the remaining items still run.
#[derive(Debug)]
pub struct OperationExecutor<L> {
    lookup: L,
    progress_total: u64,
}

impl<L: RepositoryLookup> OperationExecutor<L> {
    /// Create an executor over `lookup`.
    pub fn new(lookup: L) -> Self {
        Self {
            lookup,
            progress_total: PROGRESS_TOTAL,
        }
    }

    /// Use a different progress scale.
    pub fn with_progress_total(mut self, total: u64) -> Self {
        self.progress_total = total.max(1);
        self
    }

    /// The repositories operated on.
    pub fn lookup(&self) -> &L {
        &self.lookup
    }

    /// Run one operation to completion.
    pub fn execute(
        &self,
        operation: &RepositoryOperation,
        progress: &mut dyn ProgressListener,
    ) -> OperationComplete {
        let mut complete = OperationComplete::new(operation.operation_type());
        info!(operation = %complete.operation_type, items = operation.item_count(), "executing");

        progress.set_total(self.progress_total);
        let whole = ProgressInterval::whole(self.progress_total);

        match operation {
            RepositoryOperation::Copy {
                sources,
                destination,
                overwrite,
            } => {
                let options = CopyOptions {
                    overwrite: *overwrite,
                    progress_total: self.progress_total,
                    ..CopyOptions::default()
                };
                for (source, interval) in sources.iter().zip(whole.split(sources.len())) {
                    let result = self.copy_one(source, destination, &options, progress, interval);
                    record(&mut complete, source, result);
                }
            }
            RepositoryOperation::Move {
                sources,
                destination,
                overwrite,
            } => {
                let options = MoveOptions {
                    overwrite: *overwrite,
                    progress_total: self.progress_total,
                    ..MoveOptions::default()
                };
                for (source, interval) in sources.iter().zip(whole.split(sources.len())) {
                    let result = self.move_one(source, destination, &options, progress, interval);
                    record(&mut complete, source, result);
                }
            }
            RepositoryOperation::CreateFolders { location } => {
                let result = create_folders(&self.lookup, location).map(|(l, _)| Some(l));
                record(&mut complete, location, result);
            }
            RepositoryOperation::Delete { targets } => {
                for (target, interval) in targets.iter().zip(whole.split(targets.len())) {
                    progress.set_message(&format!("Deleting {target}"));
                    let result = self.delete_one(target);
                    progress.set_completed(interval.max);
                    record(&mut complete, target, result);
                }
            }
            RepositoryOperation::Rename { source, new_name } => {
                let result = self.rename_one(source, new_name);
                record(&mut complete, source, result);
            }
        }

        progress.complete();
        debug!(summary = %complete.summary(), "operation finished");
        complete
    }

    /// Run several operations in order.
    pub fn execute_all(
        &self,
        operations: &[RepositoryOperation],
        progress: &mut dyn ProgressListener,
    ) -> Vec<OperationComplete> {
        operations
            .iter()
            .map(|operation| self.execute(operation, progress))
            .collect()
    }

    fn copy_one(
        &self,
        source: &Location,
        destination: &Location,
        options: &CopyOptions,
        progress: &mut dyn ProgressListener,
        interval: ProgressInterval,
    ) -> Result<Option<Location>> {
        let (source_repository, entry) = require_entry(&self.lookup, source)?;
        let (destination_repository, folder) = require_folder(&self.lookup, destination)?;
        copy_entry(
            &source_repository,
            &entry,
            &destination_repository,
            &folder,
            options,
            progress,
            interval,
        )?
        .map(|copy| destination_repository.location_of(&copy))
        .transpose()
    }

    fn move_one(
        &self,
        source: &Location,
        destination: &Location,
        options: &MoveOptions,
        progress: &mut dyn ProgressListener,
        interval: ProgressInterval,
    ) -> Result<Option<Location>> {
        let (source_repository, entry) = require_entry(&self.lookup, source)?;
        let (destination_repository, folder) = require_folder(&self.lookup, destination)?;
        move_entry(
            &source_repository,
            &entry,
            &destination_repository,
            &folder,
            options,
            progress,
            interval,
        )?
        .map(|moved| destination_repository.location_of(&moved))
        .transpose()
    }

    fn delete_one(&self, target: &Location) -> Result<Option<Location>> {
        let (repository, entry) = require_entry(&self.lookup, target)?;
        repository.delete(&entry)?;
        Ok(None)
    }

    fn rename_one(&self, source: &Location, new_name: &str) -> Result<Option<Location>> {
        let (repository, entry) = require_entry(&self.lookup, source)?;
        let renamed = repository.rename(&entry, new_name)?;
        repository.location_of(&renamed).map(Some)
    }
}

fn record(complete: &mut OperationComplete, location: &Location, result: Result<Option<Location>>) {
    match result {
        Ok(produced) => {
            complete.succeeded += 1;
            complete.produced.extend(produced.map(|l| l.to_absolute_string()));
        }
        Err(err) => {
            complete.failed += 1;
            complete.errors.push(OperationError::from_error(location, &err));
        }
    }
}
