//! Entry types: the single node type shared by folders and data entries.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::kind::{DataKind, LocationType};

/// Backend-assigned identifier of an entry within one repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Create a new NodeId from a u64.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Concrete kind of an entry.
///
/// Two children of one folder must differ in name or in kind. Data entries of the
/// same [`DataKind`] but different `format` are distinct kinds, which is how an
/// out-of-band merge can leave two `IoObject` entries with the same name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryKind {
    /// A folder.
    Folder,
    /// A data entry.
    Data {
        /// Payload kind tag.
        kind: DataKind,
        /// Payload format within the kind, if the backend distinguishes them.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<CompactString>,
    },
}

impl EntryKind {
    /// A data kind without a format.
    pub fn data(kind: DataKind) -> Self {
        Self::Data { kind, format: None }
    }

    /// A data kind with a payload format.
    pub fn data_with_format(kind: DataKind, format: impl Into<CompactString>) -> Self {
        Self::Data {
            kind,
            format: Some(format.into()),
        }
    }

    /// Check if this is a folder.
    pub fn is_folder(&self) -> bool {
        matches!(self, Self::Folder)
    }

    /// The data kind tag, if this is a data entry.
    pub fn data_kind(&self) -> Option<DataKind> {
        match self {
            Self::Folder => None,
            Self::Data { kind, .. } => Some(*kind),
        }
    }

    /// The location type matching this kind.
    pub fn location_type(&self) -> LocationType {
        match self {
            Self::Folder => LocationType::Folder,
            Self::Data { .. } => LocationType::DataEntry,
        }
    }

    /// Whether an entry of this kind and one of `other` cannot share a name in a
    /// folder when created through the core: both folders, or both data entries of
    /// the same data kind.
    pub fn conflicts_with(&self, other: &EntryKind) -> bool {
        match (self, other) {
            (Self::Folder, Self::Folder) => true,
            (Self::Data { kind: a, .. }, Self::Data { kind: b, .. }) => a == b,
            _ => false,
        }
    }
}

/// A folder or data entry as seen by the core.
///
/// `parent` is a back-reference only; the backend owns the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Backend identifier.
    pub id: NodeId,

    /// Entry name (not the full path).
    pub name: CompactString,

    /// Folder or data kind.
    pub kind: EntryKind,

    /// Owner, if the backend tracks one.
    pub owner: Option<CompactString>,

    /// Whether the backend refuses modifications.
    pub read_only: bool,

    /// Containing folder; `None` for a repository root.
    pub parent: Option<NodeId>,
}

impl Entry {
    /// Create a folder entry.
    pub fn new_folder(id: NodeId, name: impl Into<CompactString>, parent: Option<NodeId>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: EntryKind::Folder,
            owner: None,
            read_only: false,
            parent,
        }
    }

    /// Create a data entry.
    pub fn new_data(
        id: NodeId,
        name: impl Into<CompactString>,
        kind: EntryKind,
        parent: NodeId,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            owner: None,
            read_only: false,
            parent: Some(parent),
        }
    }

    /// Set the owner.
    pub fn with_owner(mut self, owner: impl Into<CompactString>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Mark as read-only.
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Check if this entry is a folder.
    pub fn is_folder(&self) -> bool {
        self.kind.is_folder()
    }

    /// Check if this entry is a data entry.
    pub fn is_data(&self) -> bool {
        !self.kind.is_folder()
    }

    /// Data kind tag for data entries.
    pub fn data_kind(&self) -> Option<DataKind> {
        self.kind.data_kind()
    }

    /// Check if this entry is a repository root.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Opaque data entry content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload(pub Vec<u8>);

impl Payload {
    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self(text.as_bytes().to_vec())
    }
}
