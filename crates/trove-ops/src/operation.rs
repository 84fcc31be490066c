//! Repository operation types.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use trove_core::{Location, RepositoryError};

use crate::progress::OperationType;

/// A repository operation to be executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RepositoryOperation {
    /// Copy entries into a destination folder.
    Copy {
        sources: Vec<Location>,
        destination: Location,
        overwrite: bool,
    },
    /// Move entries into a destination folder.
    Move {
        sources: Vec<Location>,
        destination: Location,
        overwrite: bool,
    },
    /// Create a folder and its missing ancestors.
    CreateFolders { location: Location },
    /// Delete entries.
    Delete { targets: Vec<Location> },
    /// Rename a single entry in place.
    Rename { source: Location, new_name: String },
}

impl RepositoryOperation {
    /// Create a copy operation.
    pub fn copy(sources: Vec<Location>, destination: Location) -> Self {
        Self::Copy {
            sources,
            destination,
            overwrite: false,
        }
    }

    /// Create a move operation.
    pub fn move_to(sources: Vec<Location>, destination: Location) -> Self {
        Self::Move {
            sources,
            destination,
            overwrite: false,
        }
    }

    /// Create a folder creation operation.
    pub fn create_folders(location: Location) -> Self {
        Self::CreateFolders { location }
    }

    /// Create a delete operation.
    pub fn delete(targets: Vec<Location>) -> Self {
        Self::Delete { targets }
    }

    /// Create a rename operation.
    pub fn rename(source: Location, new_name: impl Into<String>) -> Self {
        Self::Rename {
            source,
            new_name: new_name.into(),
        }
    }

    /// Replace conflicting entries. Only affects copy and move.
    pub fn overwriting(mut self) -> Self {
        if let Self::Copy { overwrite, .. } | Self::Move { overwrite, .. } = &mut self {
            *overwrite = true;
        }
        self
    }

    /// The kind of operation.
    pub fn operation_type(&self) -> OperationType {
        match self {
            Self::Copy { .. } => OperationType::Copy,
            Self::Move { .. } => OperationType::Move,
            Self::CreateFolders { .. } => OperationType::CreateFolders,
            Self::Delete { .. } => OperationType::Delete,
            Self::Rename { .. } => OperationType::Rename,
        }
    }

    /// Number of items the operation processes.
    pub fn item_count(&self) -> usize {
        match self {
            Self::Copy { sources, .. } | Self::Move { sources, .. } => sources.len(),
            Self::Delete { targets } => targets.len(),
            Self::CreateFolders { .. } | Self::Rename { .. } => 1,
        }
    }
}

/// An error that occurred during a repository operation.
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
#[error("{location}: {message}")]
pub struct OperationError {
    /// The location that caused the error.
    pub location: String,
    /// A human-readable error message.
    pub message: String,
}

impl OperationError {
    /// Create a new operation error.
    pub fn new(location: impl ToString, message: impl Into<String>) -> Self {
        Self {
            location: location.to_string(),
            message: message.into(),
        }
    }

    /// Record a repository error for `location`.
    pub fn from_error(location: &Location, error: &RepositoryError) -> Self {
        Self::new(location, error.to_string())
    }
}
