//! Mounted repositories.
//!
//! A [`Repository`] is the root of one namespace tree: a backend plus mount-level
//! metadata. Every mutation performed through it is validated against the naming
//! and connections rules and announced to its listeners.

use std::sync::Arc;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::debug;

use crate::backend::Backend;
use crate::entry::{Entry, EntryKind, NodeId, Payload};
use crate::error::{BackendError, RepositoryError, Result};
use crate::events::{ListenerSet, RepositoryEvent, RepositoryListener};
use crate::kind::{DataKind, LocationType};
use crate::location::{CONNECTIONS_FOLDER, Location, LocationBuilder};
use crate::naming::validate_name;
use crate::snapshot::Snapshot;

/// Kind of storage a repository is mounted from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum RepositoryKind {
    /// Read-only bundle shipped with the application.
    ResourceBundle,
    /// Database-backed repository.
    Database,
    /// Local disk repository.
    #[default]
    Local,
    /// Plain filesystem repository; ranks with `Local`.
    Filesystem,
    /// Remote server repository.
    Remote,
    /// Anything else.
    Other,
}

impl RepositoryKind {
    /// Sort priority; lower sorts first.
    pub fn priority(self) -> u8 {
        match self {
            Self::ResourceBundle => 0,
            Self::Database => 1,
            Self::Local | Self::Filesystem => 2,
            Self::Remote => 3,
            Self::Other => 4,
        }
    }
}

/// Mount-level metadata of a repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryMeta {
    /// Storage kind.
    pub kind: RepositoryKind,
    /// Transient repositories are never persisted in the known-repositories list.
    #[serde(default)]
    pub transient: bool,
    /// Whether connection entries may be stored.
    #[serde(default)]
    pub supports_connections: bool,
    /// Encryption context passed to backends that encrypt payloads.
    #[serde(default)]
    pub encryption_context: Option<String>,
}

impl RepositoryMeta {
    /// Metadata for a repository of the given kind.
    pub fn new(kind: RepositoryKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// Mark the repository transient.
    pub fn with_transient(mut self, transient: bool) -> Self {
        self.transient = transient;
        self
    }

    /// Allow connection entries.
    pub fn with_connections(mut self, supports: bool) -> Self {
        self.supports_connections = supports;
        self
    }

    /// Set the encryption context.
    pub fn with_encryption_context(mut self, context: impl Into<String>) -> Self {
        self.encryption_context = Some(context.into());
        self
    }
}

/// A mounted repository: root folder, metadata and content listeners.
#[derive(Debug)]
pub struct Repository {
    name: CompactString,
    meta: RepositoryMeta,
    backend: Arc<dyn Backend>,
    listeners: ListenerSet,
}

impl Repository {
    /// Mount `backend` under `name`.
    pub fn new(
        name: impl Into<CompactString>,
        meta: RepositoryMeta,
        backend: Arc<dyn Backend>,
    ) -> Self {
        Self {
            name: name.into(),
            meta,
            backend,
            listeners: ListenerSet::new(),
        }
    }

    /// Repository name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the root is read-only, as for resource bundles.
    pub fn is_read_only(&self) -> bool {
        self.root().is_ok_and(|root| root.read_only)
    }

    /// Mount metadata.
    pub fn meta(&self) -> &RepositoryMeta {
        &self.meta
    }

    /// Storage kind.
    pub fn kind(&self) -> RepositoryKind {
        self.meta.kind
    }

    /// Whether this repository is excluded from persistence.
    pub fn is_transient(&self) -> bool {
        self.meta.transient
    }

    /// Whether connection entries may be stored.
    pub fn supports_connections(&self) -> bool {
        self.meta.supports_connections
    }

    /// Encryption context, if any.
    pub fn encryption_context(&self) -> Option<&str> {
        self.meta.encryption_context.as_deref()
    }

    /// Underlying backend.
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Location of this repository's root.
    pub fn root_location(&self) -> Result<Location> {
        Location::root(&self.name)
    }

    /// Register a content listener.
    pub fn add_listener(&self, listener: Arc<dyn RepositoryListener>) {
        self.listeners.add(listener);
    }

    /// Unregister a content listener.
    pub fn remove_listener(&self, listener: &Arc<dyn RepositoryListener>) -> bool {
        self.listeners.remove(listener)
    }

    /// Drop every listener.
    pub fn clear_listeners(&self) {
        self.listeners.clear();
    }

    // ==================== Reads ====================

    /// Root folder entry.
    pub fn root(&self) -> Result<Entry> {
        self.entry(self.backend.root())
    }

    /// Current description of an entry.
    pub fn entry(&self, id: NodeId) -> Result<Entry> {
        self.backend
            .entry(id)
            .map_err(|e| self.failure(format!("Failed to read entry {id:?}"), e))
    }

    /// Materialized children of a folder, without I/O.
    pub fn list(&self, folder: &Entry) -> Result<Arc<Snapshot>> {
        self.require_folder(folder)?;
        self.backend
            .children(folder.id)
            .map_err(|e| self.failure(format!("Failed to list '{}'", folder.name), e))
    }

    /// Materialized sub-folders.
    pub fn list_folders(&self, folder: &Entry) -> Result<Vec<Entry>> {
        Ok(self.list(folder)?.folders().cloned().collect())
    }

    /// Materialized data entries.
    pub fn list_data_entries(&self, folder: &Entry) -> Result<Vec<Entry>> {
        Ok(self.list(folder)?.data_entries().cloned().collect())
    }

    /// Children of a folder, refreshing first if the materialized view may be stale.
    pub fn list_complete(&self, folder: &Entry) -> Result<Arc<Snapshot>> {
        if self.will_block(folder) {
            self.refresh(folder)
        } else {
            self.list(folder)
        }
    }

    /// Reload a folder from storage. May block.
    pub fn refresh(&self, folder: &Entry) -> Result<Arc<Snapshot>> {
        self.require_folder(folder)?;
        debug!(repository = %self.name, folder = %folder.name, "refreshing folder");
        let snapshot = self
            .backend
            .refresh(folder.id)
            .map_err(|e| self.failure(format!("Failed to refresh '{}'", folder.name), e))?;
        self.listeners.dispatch(&RepositoryEvent::FolderRefreshed {
            repository: self.name.clone(),
            folder: folder.clone(),
        });
        Ok(snapshot)
    }

    /// Whether reading `folder` without a refresh could be stale or expensive.
    pub fn will_block(&self, folder: &Entry) -> bool {
        folder.is_folder() && self.backend.will_block(folder.id)
    }

    /// Read a data entry's payload.
    pub fn read(&self, entry: &Entry) -> Result<Payload> {
        if entry.is_folder() {
            return Err(RepositoryError::failure(format!(
                "'{}' is a folder and has no payload",
                entry.name
            )));
        }
        self.backend
            .read(entry.id)
            .map_err(|e| self.failure(format!("Failed to read '{}'", entry.name), e))
    }

    /// Current revision of an entry, for backends that track revisions.
    pub fn revision(&self, entry: &Entry) -> Result<Option<u64>> {
        match self.backend.versioning() {
            Some(versioning) => versioning
                .revision(entry.id)
                .map_err(|e| self.failure(format!("Failed to read revision of '{}'", entry.name), e)),
            None => Ok(None),
        }
    }

    /// Absolute location of an entry, computed by walking its parents.
    pub fn location_of(&self, entry: &Entry) -> Result<Location> {
        let mut components = Vec::new();
        let mut cursor = entry.clone();
        while let Some(parent) = cursor.parent {
            components.push(cursor.name.clone());
            cursor = self.entry(parent)?;
        }
        components.reverse();

        let builder = match &entry.kind {
            EntryKind::Folder => LocationBuilder::new().with_location_type(LocationType::Folder),
            EntryKind::Data { kind, .. } => LocationBuilder::new()
                .with_location_type(LocationType::DataEntry)
                .with_expected_kind(*kind),
        };
        builder.build_from_components(&self.name, &components)
    }

    // ==================== Connections policy ====================

    /// Whether `name` denotes the connections folder, per the backend's rule.
    pub fn is_connections_folder_name(&self, name: &str) -> bool {
        match self.backend.connections() {
            Some(connections) => connections.is_connections_folder(name),
            None => name == CONNECTIONS_FOLDER,
        }
    }

    /// Whether `entry` is this repository's connections folder.
    pub fn is_connections_folder(&self, entry: &Entry) -> bool {
        entry.is_folder()
            && self.supports_connections()
            && entry.parent == Some(self.backend.root())
            && self.is_connections_folder_name(&entry.name)
    }

    fn ensure_not_connections_folder(&self, entry: &Entry) -> Result<()> {
        if self.is_connections_folder(entry) {
            return Err(RepositoryError::ConnectionFolderImmutable {
                location: self.describe(entry),
            });
        }
        Ok(())
    }

    // ==================== Writes ====================

    /// Create a sub-folder of `parent`.
    pub fn create_folder(&self, parent: &Entry, name: &str) -> Result<Entry> {
        self.require_folder(parent)?;
        validate_name(name)?;
        if self.is_connections_folder(parent) {
            return Err(RepositoryError::ConnectionFolderImmutable {
                location: self.describe(parent),
            });
        }

        let entry = self
            .backend
            .create_folder(parent.id, name)
            .map_err(|e| self.failure(format!("Failed to create folder '{name}'"), e))?;
        self.emit_added(&entry);
        Ok(entry)
    }

    /// Create a data entry in `parent`.
    pub fn create_data_entry(
        &self,
        parent: &Entry,
        name: &str,
        kind: &EntryKind,
        payload: Payload,
    ) -> Result<Entry> {
        self.require_folder(parent)?;
        validate_name(name)?;
        match kind.data_kind() {
            None | Some(DataKind::Any) => {
                return Err(RepositoryError::failure(format!(
                    "'{name}' needs a concrete data kind"
                )));
            }
            Some(DataKind::Connection) if !self.supports_connections() => {
                return Err(RepositoryError::ConnectionsUnsupported {
                    repository: self.name.to_string(),
                });
            }
            Some(_) => {}
        }

        let entry = self
            .backend
            .create_data_entry(parent.id, name, kind, payload)
            .map_err(|e| self.failure(format!("Failed to create '{name}'"), e))?;
        self.emit_added(&entry);
        Ok(entry)
    }

    /// Replace a data entry's payload.
    pub fn write(&self, entry: &Entry, payload: Payload) -> Result<()> {
        self.backend
            .write(entry.id, payload)
            .map_err(|e| self.failure(format!("Failed to write '{}'", entry.name), e))?;
        self.listeners.dispatch(&RepositoryEvent::EntryChanged {
            repository: self.name.clone(),
            entry: entry.clone(),
        });
        Ok(())
    }

    /// Rename an entry in place.
    pub fn rename(&self, entry: &Entry, new_name: &str) -> Result<Entry> {
        validate_name(new_name)?;
        self.ensure_not_connections_folder(entry)?;

        let renamed = self
            .backend
            .rename(entry.id, new_name)
            .map_err(|e| self.failure(format!("Failed to rename '{}'", entry.name), e))?;
        self.listeners.dispatch(&RepositoryEvent::EntryChanged {
            repository: self.name.clone(),
            entry: renamed.clone(),
        });
        Ok(renamed)
    }

    /// Reparent an entry within this repository.
    pub fn relocate(
        &self,
        entry: &Entry,
        new_parent: &Entry,
        new_name: Option<&str>,
    ) -> Result<Entry> {
        self.require_folder(new_parent)?;
        if let Some(name) = new_name {
            validate_name(name)?;
        }
        self.ensure_not_connections_folder(entry)?;
        if entry.is_folder() && self.is_connections_folder(new_parent) {
            return Err(RepositoryError::ConnectionFolderImmutable {
                location: self.describe(new_parent),
            });
        }

        let moved = self
            .backend
            .relocate(entry.id, new_parent.id, new_name)
            .map_err(|e| self.failure(format!("Failed to move '{}'", entry.name), e))?;
        self.listeners.dispatch(&RepositoryEvent::EntryMoved {
            repository: self.name.clone(),
            entry: moved.clone(),
            former_parent: entry.parent,
            former_name: entry.name.clone(),
        });
        Ok(moved)
    }

    /// Delete an entry and everything below it.
    pub fn delete(&self, entry: &Entry) -> Result<()> {
        if entry.is_root() {
            return Err(RepositoryError::failure(format!(
                "Cannot delete the root of repository '{}'",
                self.name
            )));
        }
        self.ensure_not_connections_folder(entry)?;

        self.backend
            .delete(entry.id)
            .map_err(|e| self.failure(format!("Failed to delete '{}'", entry.name), e))?;
        self.listeners.dispatch(&RepositoryEvent::EntryRemoved {
            repository: self.name.clone(),
            entry: entry.clone(),
            parent: entry.parent,
        });
        Ok(())
    }

    // ==================== Helpers ====================

    fn require_folder(&self, entry: &Entry) -> Result<()> {
        if entry.is_folder() {
            Ok(())
        } else {
            Err(RepositoryError::WrongLocationType {
                location: self.describe(entry),
                expected: LocationType::Folder,
                actual: LocationType::DataEntry,
            })
        }
    }

    fn emit_added(&self, entry: &Entry) {
        self.listeners.dispatch(&RepositoryEvent::EntryAdded {
            repository: self.name.clone(),
            entry: entry.clone(),
        });
    }

    /// Best-effort absolute path for messages.
    fn describe(&self, entry: &Entry) -> String {
        self.location_of(entry)
            .map(|l| l.to_absolute_string())
            .unwrap_or_else(|_| format!("//{}/…/{}", self.name, entry.name))
    }

    fn failure(&self, message: String, source: BackendError) -> RepositoryError {
        RepositoryError::wrap(format!("{}: {message}", self.name), source)
    }
}

/// Looks up mounted repositories by name.
pub trait RepositoryLookup {
    /// The repository with this name.
    fn repository(&self, name: &str) -> Result<Arc<Repository>>;
}

impl RepositoryLookup for [Arc<Repository>] {
    fn repository(&self, name: &str) -> Result<Arc<Repository>> {
        self.iter()
            .find(|r| r.name() == name)
            .cloned()
            .ok_or_else(|| RepositoryError::UnknownRepository {
                name: name.to_string(),
            })
    }
}

impl RepositoryLookup for Vec<Arc<Repository>> {
    fn repository(&self, name: &str) -> Result<Arc<Repository>> {
        self.as_slice().repository(name)
    }
}

impl<T: RepositoryLookup + ?Sized> RepositoryLookup for &T {
    fn repository(&self, name: &str) -> Result<Arc<Repository>> {
        (**self).repository(name)
    }
}

impl<T: RepositoryLookup + ?Sized> RepositoryLookup for Arc<T> {
    fn repository(&self, name: &str) -> Result<Arc<Repository>> {
        (**self).repository(name)
    }
}
