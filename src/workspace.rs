//! JSON workspace descriptions loaded into in-memory repositories.
//!
//! ```json
//! {
//!   "repositories": [
//!     {
//!       "name": "Local",
//!       "kind": "local",
//!       "supports_connections": true,
//!       "children": [
//!         { "type": "folder", "name": "a", "children": [] },
//!         { "type": "data", "name": "d", "kind": "process", "content": "<process/>" },
//!         { "type": "data", "name": "blob", "kind": "binary", "bytes": [0, 159, 146] }
//!       ]
//!     }
//!   ]
//! }
//! ```

use std::path::Path;
use std::sync::Arc;

use color_eyre::eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use trove_core::{
    DataKind, Entry, EntryKind, MemoryBackend, NodeId, Payload, Readable, Repository,
    RepositoryMeta,
};
use trove_registry::Registry;

/// A set of repositories.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceDescription {
    #[serde(default)]
    pub repositories: Vec<RepositoryDescription>,
}

/// One repository and its tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryDescription {
    pub name: String,
    #[serde(flatten)]
    pub meta: RepositoryMeta,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub case_insensitive_connections: bool,
    #[serde(default)]
    pub children: Vec<NodeDescription>,
}

/// A folder or data entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeDescription {
    Folder {
        name: String,
        #[serde(default)]
        children: Vec<NodeDescription>,
    },
    Data {
        name: String,
        kind: DataKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
        #[serde(default)]
        content: String,
        /// Raw payload, used instead of `content` when it is not UTF-8.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bytes: Option<Vec<u8>>,
    },
}

impl WorkspaceDescription {
    /// Read a description file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content)
            .wrap_err_with(|| format!("Invalid workspace description {}", path.display()))
    }

    /// Write a description file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).wrap_err_with(|| format!("Failed to write {}", path.display()))
    }

    /// Mount every described repository in `registry`.
    pub fn mount(&self, registry: &Registry) -> Result<()> {
        for description in &self.repositories {
            let backend = MemoryBackend::new()
                .with_connections_folder(registry.config().connections_folder.as_str())
                .with_read_only(description.read_only)
                .with_case_insensitive_connections(description.case_insensitive_connections)
                .into_shared();
            let root = backend.root();
            populate(&backend, root, &description.children);

            let repository = Repository::new(
                description.name.as_str(),
                description.meta.clone(),
                backend,
            );
            registry
                .add_repository(Arc::new(repository))
                .wrap_err_with(|| format!("Failed to mount '{}'", description.name))?;
        }
        Ok(())
    }

    /// Describe the current contents of every repository in `registry`.
    pub fn capture(registry: &Registry) -> Result<Self> {
        let repositories = registry
            .repositories()
            .iter()
            .map(|repository| -> Result<RepositoryDescription> {
                let root = repository.root()?;
                let case_insensitive_connections = repository
                    .backend()
                    .connections()
                    .is_some_and(|c| c.connections_case_insensitive());
                Ok(RepositoryDescription {
                    name: repository.name().to_string(),
                    meta: repository.meta().clone(),
                    read_only: root.read_only,
                    case_insensitive_connections,
                    children: describe_children(repository, &root)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { repositories })
    }
}

fn populate(backend: &MemoryBackend, parent: NodeId, children: &[NodeDescription]) {
    for child in children {
        match child {
            NodeDescription::Folder { name, children } => {
                let id = backend.insert_folder(parent, name);
                populate(backend, id, children);
            }
            NodeDescription::Data {
                name,
                kind,
                format,
                content,
                bytes,
            } => {
                let kind = match format {
                    Some(format) => EntryKind::data_with_format(*kind, format.as_str()),
                    None => EntryKind::data(*kind),
                };
                let payload = match bytes {
                    Some(bytes) => Payload::from(bytes.clone()),
                    None => Payload::from(content.as_str()),
                };
                backend.insert_data(parent, name, kind, payload);
            }
        }
    }
}

fn describe_children(repository: &Repository, folder: &Entry) -> Result<Vec<NodeDescription>> {
    let snapshot = repository.list_complete(folder)?;
    let mut nodes = Vec::with_capacity(snapshot.len());

    for sub in snapshot.folders() {
        nodes.push(NodeDescription::Folder {
            name: sub.name.to_string(),
            children: describe_children(repository, sub)?,
        });
    }
    for entry in snapshot.data_entries() {
        let EntryKind::Data { kind, format } = &entry.kind else {
            continue;
        };
        let payload: Payload = repository.read(entry)?;
        let (content, bytes) = match String::from_utf8(payload.0) {
            Ok(text) => (text, None),
            Err(e) => (String::new(), Some(e.into_bytes())),
        };
        nodes.push(NodeDescription::Data {
            name: entry.name.to_string(),
            kind: *kind,
            format: format.as_ref().map(|f| f.to_string()),
            content,
            bytes,
        });
    }
    Ok(nodes)
}
