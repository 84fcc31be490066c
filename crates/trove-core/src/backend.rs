//! The contract every storage backend implements.
//!
//! The core never performs I/O itself. A backend (local disk, remote server,
//! resource bundle, database, the in-memory [`crate::memory::MemoryBackend`])
//! exposes its tree through the capability traits below, addressing entries by
//! [`NodeId`]. Optional capabilities are discovered through [`Backend`].

use std::fmt::Debug;
use std::sync::Arc;

use crate::entry::{Entry, EntryKind, NodeId, Payload};
use crate::error::BackendError;
use crate::location::CONNECTIONS_FOLDER;
use crate::snapshot::Snapshot;

/// Result type for backend calls.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Read side of the contract.
pub trait Readable {
    /// Id of the root folder.
    fn root(&self) -> NodeId;

    /// Current description of an entry.
    fn entry(&self, id: NodeId) -> BackendResult<Entry>;

    /// Materialized children of a folder. Must not block on I/O.
    fn children(&self, folder: NodeId) -> BackendResult<Arc<Snapshot>>;

    /// Reload a folder from storage and return the new snapshot. May block.
    fn refresh(&self, folder: NodeId) -> BackendResult<Arc<Snapshot>>;

    /// Whether the materialized children of `folder` may be stale or expensive to read.
    fn will_block(&self, folder: NodeId) -> bool;

    /// Read a data entry's payload. May block.
    fn read(&self, entry: NodeId) -> BackendResult<Payload>;
}

/// Write side of the contract.
pub trait Writable {
    /// Create a sub-folder.
    fn create_folder(&self, parent: NodeId, name: &str) -> BackendResult<Entry>;

    /// Create a data entry holding `payload`.
    fn create_data_entry(
        &self,
        parent: NodeId,
        name: &str,
        kind: &EntryKind,
        payload: Payload,
    ) -> BackendResult<Entry>;

    /// Replace a data entry's payload.
    fn write(&self, entry: NodeId, payload: Payload) -> BackendResult<()>;

    /// Rename an entry in place.
    fn rename(&self, entry: NodeId, new_name: &str) -> BackendResult<Entry>;

    /// Reparent an entry within this backend, optionally renaming it.
    fn relocate(
        &self,
        entry: NodeId,
        new_parent: NodeId,
        new_name: Option<&str>,
    ) -> BackendResult<Entry>;

    /// Delete an entry and everything below it.
    fn delete(&self, entry: NodeId) -> BackendResult<()>;
}

/// Optional revision tracking.
pub trait Versionable {
    /// Current revision of an entry, if it has one.
    fn revision(&self, entry: NodeId) -> BackendResult<Option<u64>>;
}

/// Optional connection support.
pub trait ConnectionCapable {
    /// Name of the connections folder at the repository root.
    fn connections_folder(&self) -> &str {
        CONNECTIONS_FOLDER
    }

    /// Whether the name is matched ignoring ASCII case.
    fn connections_case_insensitive(&self) -> bool {
        false
    }

    /// Whether `name` denotes the connections folder at the repository root.
    fn is_connections_folder(&self, name: &str) -> bool {
        if self.connections_case_insensitive() {
            name.eq_ignore_ascii_case(self.connections_folder())
        } else {
            name == self.connections_folder()
        }
    }
}

/// A complete backend: readable, writable, and optionally more.
pub trait Backend: Readable + Writable + Send + Sync + Debug {
    /// Revision capability, if supported.
    fn versioning(&self) -> Option<&dyn Versionable> {
        None
    }

    /// Connection capability, if supported.
    fn connections(&self) -> Option<&dyn ConnectionCapable> {
        None
    }
}
