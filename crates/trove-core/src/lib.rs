//! Core types and traits for trove.
//!
//! This crate provides the location model, the namespace tree contract every
//! backend implements, mounted repositories with their content events, and an
//! in-memory backend.

mod backend;
mod config;
mod entry;
mod error;
mod events;
mod kind;
mod location;
pub mod memory;
mod naming;
mod repository;
mod snapshot;

pub use backend::{Backend, BackendResult, ConnectionCapable, Readable, Versionable, Writable};
pub use config::{DEFAULT_PROGRESS_TOTAL, NamespaceConfig, NamespaceConfigBuilder};
pub use entry::{Entry, EntryKind, NodeId, Payload};
pub use error::{BackendError, BoxedCause, RepositoryError, Result};
pub use events::{ListenerSet, RepositoryEvent, RepositoryListener};
pub use kind::{DataKind, LocationType};
pub use location::{CONNECTIONS_FOLDER, Location, LocationBuilder, REPOSITORY_PREFIX, SEPARATOR};
pub use memory::MemoryBackend;
pub use naming::{BLACKLISTED_CHARACTERS, RESERVED_NAMES, is_valid_name, validate_name};
pub use repository::{Repository, RepositoryKind, RepositoryLookup, RepositoryMeta};
pub use snapshot::Snapshot;
