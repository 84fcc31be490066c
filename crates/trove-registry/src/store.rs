//! Persistence of the known-repositories list.

use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;
use trove_core::{Repository, RepositoryMeta};

use crate::error::StoreError;

/// Current version of the repositories file.
const FILE_VERSION: u32 = 1;

/// Persisted description of a mounted repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryDescriptor {
    /// Mount name.
    pub name: String,
    /// Mount metadata.
    #[serde(flatten)]
    pub meta: RepositoryMeta,
}

impl RepositoryDescriptor {
    /// Describe a mounted repository.
    pub fn of(repository: &Repository) -> Self {
        Self {
            name: repository.name().to_string(),
            meta: repository.meta().clone(),
        }
    }
}

/// Stores the list of known repositories.
pub trait RepositoryStore: Send + Sync + Debug {
    /// Read the stored list. A store that was never written yields an empty list.
    fn load(&self) -> Result<Vec<RepositoryDescriptor>, StoreError>;

    /// Replace the stored list.
    fn save(&self, repositories: &[RepositoryDescriptor]) -> Result<(), StoreError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct RepositoriesFile {
    version: u32,
    repositories: Vec<RepositoryDescriptor>,
}

/// Keeps the list in a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store at `path`. Nothing is read or written until used.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File location.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RepositoryStore for JsonFileStore {
    fn load(&self) -> Result<Vec<RepositoryDescriptor>, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let file: RepositoriesFile = serde_json::from_str(&content)?;
        debug!(path = %self.path.display(), count = file.repositories.len(), "loaded repositories");
        Ok(file.repositories)
    }

    fn save(&self, repositories: &[RepositoryDescriptor]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = RepositoriesFile {
            version: FILE_VERSION,
            repositories: repositories.to_vec(),
        };
        let content = serde_json::to_string_pretty(&file)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

/// Keeps the list in memory; counts saves.
#[derive(Debug, Default)]
pub struct MemoryStore {
    repositories: Mutex<Vec<RepositoryDescriptor>>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-filled with `repositories`.
    pub fn with_repositories(repositories: Vec<RepositoryDescriptor>) -> Self {
        Self {
            repositories: Mutex::new(repositories),
            saves: Mutex::new(0),
        }
    }

    /// Number of saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|s| *s).unwrap_or(0)
    }
}

impl RepositoryStore for MemoryStore {
    fn load(&self) -> Result<Vec<RepositoryDescriptor>, StoreError> {
        Ok(self
            .repositories
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default())
    }

    fn save(&self, repositories: &[RepositoryDescriptor]) -> Result<(), StoreError> {
        if let Ok(mut stored) = self.repositories.lock() {
            *stored = repositories.to_vec();
        }
        if let Ok(mut saves) = self.saves.lock() {
            *saves += 1;
        }
        Ok(())
    }
}
