//! In-memory backend.
//!
//! Keeps a whole tree in memory. Used for resource bundles built at startup, for
//! the command line tool, and as the reference backend in tests. Children can be
//! inserted "lazily" so they only materialize after a number of refreshes, which
//! models a backend whose listing lags behind its storage.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use compact_str::CompactString;
use dashmap::{DashMap, DashSet};
use indexmap::{IndexMap, IndexSet};

use crate::backend::{
    Backend, BackendResult, ConnectionCapable, Readable, Versionable, Writable,
};
use crate::entry::{Entry, EntryKind, NodeId, Payload};
use crate::error::BackendError;
use crate::location::CONNECTIONS_FOLDER;
use crate::snapshot::Snapshot;

#[derive(Debug)]
struct Node {
    entry: Entry,
    payload: Payload,
    revision: u64,
    /// Materialized children, in insertion order.
    children: IndexSet<NodeId>,
    /// Children that exist but are not listed yet, with refreshes remaining.
    pending: IndexMap<NodeId, u32>,
    generation: u64,
}

impl Node {
    fn new(entry: Entry, payload: Payload) -> Self {
        Self {
            entry,
            payload,
            revision: 1,
            children: IndexSet::new(),
            pending: IndexMap::new(),
            generation: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Injected {
    /// The next create of this name fails outright.
    Fail,
    /// The next create of this name loses a race: another writer creates it first.
    Race,
}

/// A tree held entirely in memory.
#[derive(Debug)]
pub struct MemoryBackend {
    nodes: DashMap<NodeId, Node>,
    root: NodeId,
    next_id: AtomicU64,
    read_only: bool,
    connections_folder: CompactString,
    case_insensitive_connections: bool,
    refreshes: DashMap<NodeId, usize>,
    injected: DashMap<(NodeId, CompactString), Injected>,
    failing_reads: DashSet<NodeId>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create an empty, writable tree.
    pub fn new() -> Self {
        let root = NodeId::new(0);
        let nodes = DashMap::new();
        nodes.insert(
            root,
            Node::new(Entry::new_folder(root, "", None), Payload::default()),
        );

        Self {
            nodes,
            root,
            next_id: AtomicU64::new(1),
            read_only: false,
            connections_folder: CompactString::from(CONNECTIONS_FOLDER),
            case_insensitive_connections: false,
            refreshes: DashMap::new(),
            injected: DashMap::new(),
            failing_reads: DashSet::new(),
        }
    }

    /// Refuse every write made through the backend contract.
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        if let Some(mut root) = self.nodes.get_mut(&self.root) {
            root.entry.read_only = read_only;
        }
        self
    }

    /// Use `name` for the connections folder instead of the default.
    pub fn with_connections_folder(mut self, name: impl Into<CompactString>) -> Self {
        self.connections_folder = name.into();
        self
    }

    /// Match the connections folder name ignoring ASCII case.
    pub fn with_case_insensitive_connections(mut self, enabled: bool) -> Self {
        self.case_insensitive_connections = enabled;
        self
    }

    /// Wrap in an `Arc` for mounting.
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    // ==================== Population ====================
    //
    // These bypass the read-only flag and the name-conflict checks so tests and
    // bundle loaders can build any tree, including out-of-band duplicates.

    /// Insert a materialized folder.
    pub fn insert_folder(&self, parent: NodeId, name: &str) -> NodeId {
        self.insert_lazy(parent, name, EntryKind::Folder, Payload::default(), 0)
    }

    /// Insert a materialized data entry.
    pub fn insert_data(
        &self,
        parent: NodeId,
        name: &str,
        kind: EntryKind,
        payload: impl Into<Payload>,
    ) -> NodeId {
        self.insert_lazy(parent, name, kind, payload.into(), 0)
    }

    /// Insert an entry that shows up only after `refreshes` refreshes of `parent`.
    pub fn insert_lazy(
        &self,
        parent: NodeId,
        name: &str,
        kind: EntryKind,
        payload: Payload,
        refreshes: u32,
    ) -> NodeId {
        let id = self.alloc_id();
        let entry = Entry {
            id,
            name: name.into(),
            kind,
            owner: None,
            read_only: self.read_only,
            parent: Some(parent),
        };
        self.nodes.insert(id, Node::new(entry, payload));
        self.attach(parent, id, refreshes);
        id
    }

    /// Create materialized folders along `path` below the root, reusing existing ones.
    pub fn ensure_folders(&self, path: &[&str]) -> NodeId {
        let mut cursor = self.root;
        for name in path {
            let existing = self
                .listed_children(cursor)
                .into_iter()
                .find(|e| e.is_folder() && e.name == *name);
            cursor = match existing {
                Some(entry) => entry.id,
                None => self.insert_folder(cursor, name),
            };
        }
        cursor
    }

    /// Make the next create of `name` in `parent` fail.
    pub fn inject_create_failure(&self, parent: NodeId, name: &str) {
        self.injected.insert((parent, name.into()), Injected::Fail);
    }

    /// Make the next create of `name` in `parent` lose a race with another writer.
    pub fn inject_create_race(&self, parent: NodeId, name: &str) {
        self.injected.insert((parent, name.into()), Injected::Race);
    }

    /// Make every read of `entry` fail with an I/O error.
    pub fn fail_reads_of(&self, entry: NodeId) {
        self.failing_reads.insert(entry);
    }

    /// How often `folder` has been refreshed.
    pub fn refresh_count(&self, folder: NodeId) -> usize {
        self.refreshes.get(&folder).map(|c| *c).unwrap_or(0)
    }

    /// Refreshes across all folders.
    pub fn total_refreshes(&self) -> usize {
        self.refreshes.iter().map(|c| *c.value()).sum()
    }

    /// Number of live entries including the root.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // ==================== Internals ====================

    fn alloc_id(&self) -> NodeId {
        NodeId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn attach(&self, parent: NodeId, id: NodeId, refreshes: u32) {
        if let Some(mut node) = self.nodes.get_mut(&parent) {
            if refreshes == 0 {
                node.children.insert(id);
            } else {
                node.pending.insert(id, refreshes);
            }
        }
    }

    fn detach(&self, parent: NodeId, id: NodeId) {
        if let Some(mut node) = self.nodes.get_mut(&parent) {
            node.children.shift_remove(&id);
            node.pending.shift_remove(&id);
        }
    }

    fn folder_node_ids(&self, folder: NodeId) -> BackendResult<(Vec<NodeId>, Vec<NodeId>, u64)> {
        let node = self
            .nodes
            .get(&folder)
            .ok_or(BackendError::NoSuchEntry(folder))?;
        if !node.entry.is_folder() {
            return Err(BackendError::NotAFolder(folder));
        }
        Ok((
            node.children.iter().copied().collect(),
            node.pending.keys().copied().collect(),
            node.generation,
        ))
    }

    fn entries_of(&self, ids: &[NodeId]) -> Vec<Entry> {
        ids.iter()
            .filter_map(|id| self.nodes.get(id).map(|n| n.entry.clone()))
            .collect()
    }

    fn listed_children(&self, folder: NodeId) -> Vec<Entry> {
        self.folder_node_ids(folder)
            .map(|(listed, _, _)| self.entries_of(&listed))
            .unwrap_or_default()
    }

    /// Whether a listed or pending child other than `except` conflicts with `name`/`kind`.
    fn has_conflict(
        &self,
        parent: NodeId,
        name: &str,
        kind: &EntryKind,
        except: Option<NodeId>,
    ) -> BackendResult<bool> {
        let (listed, pending, _) = self.folder_node_ids(parent)?;
        let ids: Vec<NodeId> = listed.into_iter().chain(pending).collect();
        Ok(self
            .entries_of(&ids)
            .iter()
            .any(|e| Some(e.id) != except && e.name == name && e.kind.conflicts_with(kind)))
    }

    fn ensure_writable(&self, name: &str) -> BackendResult<()> {
        if self.read_only {
            return Err(BackendError::ReadOnly {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn take_injection(&self, parent: NodeId, name: &str) -> Option<Injected> {
        self.injected
            .remove(&(parent, CompactString::from(name)))
            .map(|(_, injected)| injected)
    }

    fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = vec![id];
        let mut i = 0;
        while i < out.len() {
            if let Ok((listed, pending, _)) = self.folder_node_ids(out[i]) {
                out.extend(listed);
                out.extend(pending);
            }
            i += 1;
        }
        out
    }

    fn is_ancestor(&self, candidate: NodeId, of: NodeId) -> bool {
        let mut cursor = Some(of);
        while let Some(id) = cursor {
            if id == candidate {
                return true;
            }
            cursor = self.nodes.get(&id).and_then(|n| n.entry.parent);
        }
        false
    }
}

impl Readable for MemoryBackend {
    fn root(&self) -> NodeId {
        self.root
    }

    fn entry(&self, id: NodeId) -> BackendResult<Entry> {
        self.nodes
            .get(&id)
            .map(|n| n.entry.clone())
            .ok_or(BackendError::NoSuchEntry(id))
    }

    fn children(&self, folder: NodeId) -> BackendResult<Arc<Snapshot>> {
        let (listed, _, generation) = self.folder_node_ids(folder)?;
        Ok(Arc::new(Snapshot::new(self.entries_of(&listed), generation)))
    }

    fn refresh(&self, folder: NodeId) -> BackendResult<Arc<Snapshot>> {
        {
            let mut node = self
                .nodes
                .get_mut(&folder)
                .ok_or(BackendError::NoSuchEntry(folder))?;
            if !node.entry.is_folder() {
                return Err(BackendError::NotAFolder(folder));
            }

            let mut ready = Vec::new();
            for (id, remaining) in node.pending.iter_mut() {
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 {
                    ready.push(*id);
                }
            }
            for id in ready {
                node.pending.shift_remove(&id);
                node.children.insert(id);
            }
            node.generation += 1;
        }

        *self.refreshes.entry(folder).or_insert(0) += 1;
        self.children(folder)
    }

    fn will_block(&self, folder: NodeId) -> bool {
        self.nodes
            .get(&folder)
            .is_some_and(|n| !n.pending.is_empty())
    }

    fn read(&self, entry: NodeId) -> BackendResult<Payload> {
        if self.failing_reads.contains(&entry) {
            return Err(BackendError::Io(std::io::Error::other(
                "simulated read failure",
            )));
        }
        let node = self
            .nodes
            .get(&entry)
            .ok_or(BackendError::NoSuchEntry(entry))?;
        if node.entry.is_folder() {
            return Err(BackendError::Other(format!(
                "'{}' is a folder",
                node.entry.name
            )));
        }
        Ok(node.payload.clone())
    }
}

impl Writable for MemoryBackend {
    fn create_folder(&self, parent: NodeId, name: &str) -> BackendResult<Entry> {
        self.ensure_writable(name)?;
        match self.take_injection(parent, name) {
            Some(Injected::Fail) => {
                return Err(BackendError::Other(format!(
                    "simulated failure creating '{name}'"
                )));
            }
            Some(Injected::Race) => {
                // Another writer got there first; its folder is not listed yet.
                self.insert_lazy(parent, name, EntryKind::Folder, Payload::default(), 1);
                return Err(BackendError::AlreadyExists {
                    name: name.to_string(),
                });
            }
            None => {}
        }

        if self.has_conflict(parent, name, &EntryKind::Folder, None)? {
            return Err(BackendError::AlreadyExists {
                name: name.to_string(),
            });
        }
        let id = self.insert_folder(parent, name);
        self.entry(id)
    }

    fn create_data_entry(
        &self,
        parent: NodeId,
        name: &str,
        kind: &EntryKind,
        payload: Payload,
    ) -> BackendResult<Entry> {
        self.ensure_writable(name)?;
        if let Some(Injected::Fail) = self.take_injection(parent, name) {
            return Err(BackendError::Other(format!(
                "simulated failure creating '{name}'"
            )));
        }
        if kind.is_folder() {
            return Err(BackendError::Other(format!(
                "'{name}' must be created as a folder"
            )));
        }
        if self.has_conflict(parent, name, kind, None)? {
            return Err(BackendError::AlreadyExists {
                name: name.to_string(),
            });
        }
        let id = self.insert_data(parent, name, kind.clone(), payload);
        self.entry(id)
    }

    fn write(&self, entry: NodeId, payload: Payload) -> BackendResult<()> {
        let mut node = self
            .nodes
            .get_mut(&entry)
            .ok_or(BackendError::NoSuchEntry(entry))?;
        if self.read_only {
            return Err(BackendError::ReadOnly {
                name: node.entry.name.to_string(),
            });
        }
        node.payload = payload;
        node.revision += 1;
        Ok(())
    }

    fn rename(&self, entry: NodeId, new_name: &str) -> BackendResult<Entry> {
        self.ensure_writable(new_name)?;
        let current = self.entry(entry)?;
        if let Some(parent) = current.parent {
            if self.has_conflict(parent, new_name, &current.kind, Some(entry))? {
                return Err(BackendError::AlreadyExists {
                    name: new_name.to_string(),
                });
            }
        }

        let mut node = self
            .nodes
            .get_mut(&entry)
            .ok_or(BackendError::NoSuchEntry(entry))?;
        node.entry.name = new_name.into();
        Ok(node.entry.clone())
    }

    fn relocate(
        &self,
        entry: NodeId,
        new_parent: NodeId,
        new_name: Option<&str>,
    ) -> BackendResult<Entry> {
        let current = self.entry(entry)?;
        self.ensure_writable(&current.name)?;
        if !self.entry(new_parent)?.is_folder() {
            return Err(BackendError::NotAFolder(new_parent));
        }
        if self.is_ancestor(entry, new_parent) {
            return Err(BackendError::Other(format!(
                "cannot move '{}' below itself",
                current.name
            )));
        }

        let name = new_name.unwrap_or(&current.name);
        if self.has_conflict(new_parent, name, &current.kind, Some(entry))? {
            return Err(BackendError::AlreadyExists {
                name: name.to_string(),
            });
        }

        if let Some(old_parent) = current.parent {
            self.detach(old_parent, entry);
        }
        self.attach(new_parent, entry, 0);

        let mut node = self
            .nodes
            .get_mut(&entry)
            .ok_or(BackendError::NoSuchEntry(entry))?;
        node.entry.parent = Some(new_parent);
        node.entry.name = name.into();
        Ok(node.entry.clone())
    }

    fn delete(&self, entry: NodeId) -> BackendResult<()> {
        let current = self.entry(entry)?;
        self.ensure_writable(&current.name)?;
        let Some(parent) = current.parent else {
            return Err(BackendError::Other("cannot delete the root".into()));
        };

        let doomed = self.subtree(entry);
        self.detach(parent, entry);
        for id in doomed {
            self.nodes.remove(&id);
            self.failing_reads.remove(&id);
        }
        Ok(())
    }
}

impl Versionable for MemoryBackend {
    fn revision(&self, entry: NodeId) -> BackendResult<Option<u64>> {
        let node = self
            .nodes
            .get(&entry)
            .ok_or(BackendError::NoSuchEntry(entry))?;
        Ok((!node.entry.is_folder()).then_some(node.revision))
    }
}

impl ConnectionCapable for MemoryBackend {
    fn connections_folder(&self) -> &str {
        &self.connections_folder
    }

    fn connections_case_insensitive(&self) -> bool {
        self.case_insensitive_connections
    }
}

impl Backend for MemoryBackend {
    fn versioning(&self) -> Option<&dyn Versionable> {
        Some(self)
    }

    fn connections(&self) -> Option<&dyn ConnectionCapable> {
        Some(self)
    }
}
