//! Kind tags for locations and data entries.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// The payload kind of a data entry, or the kind a location expects to find.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum DataKind {
    /// An executable process definition.
    Process,
    /// A stored result object. Several payload formats share this kind.
    IoObject,
    /// A connection definition.
    Connection,
    /// An arbitrary binary file.
    Binary,
    /// Legacy untyped blob.
    Blob,
    /// Wildcard used by locations; never the kind of a stored entry.
    #[default]
    Any,
}

impl DataKind {
    /// Whether an entry of kind `actual` satisfies this expectation.
    pub fn accepts(self, actual: DataKind) -> bool {
        self == DataKind::Any || self == actual
    }

    /// Whether entries of this kind can share a name with a different payload format.
    pub fn is_ambiguity_prone(self) -> bool {
        matches!(self, DataKind::IoObject)
    }

    /// Whether this is a concrete kind a stored entry can carry.
    pub fn is_concrete(self) -> bool {
        self != DataKind::Any
    }
}

/// What shape of entry a location addresses.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LocationType {
    /// A folder (including a repository root).
    Folder,
    /// A data entry.
    DataEntry,
    /// Either; resolution decides.
    #[default]
    Unknown,
}
