//! Error types for the registry.

use thiserror::Error;
use trove_core::RepositoryError;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors raised by the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A repository with this name is already mounted.
    #[error("A repository named '{name}' is already registered")]
    DuplicateRepository { name: String },

    /// No repository is mounted under this name.
    #[error("Unknown repository: {name}")]
    UnknownRepository { name: String },

    /// The registry was shut down.
    #[error("The registry has been shut down")]
    ShutDown,

    /// Persisting or loading the known-repositories list failed.
    #[error("Repository store error: {0}")]
    Store(#[from] StoreError),

    /// A repository call failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Errors from reading or writing persisted registry state.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The repositories file is not valid JSON.
    #[error("Invalid repositories file: {0}")]
    Json(#[from] serde_json::Error),

    /// The configuration file could not be parsed.
    #[error("Invalid configuration: {0}")]
    ParseConfig(#[from] toml::de::Error),

    /// The configuration could not be serialized.
    #[error("Failed to write configuration: {0}")]
    WriteConfig(#[from] toml::ser::Error),

    /// No configuration directory exists on this platform.
    #[error("No configuration directory available")]
    NoConfigDir,
}
