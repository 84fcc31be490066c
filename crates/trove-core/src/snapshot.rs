//! Materialized folder contents.
//!
//! A folder's children are exposed as an immutable snapshot. Refreshing a folder
//! yields a new snapshot instead of mutating the old one, so a reader holding a
//! snapshot never observes a half-updated listing.

use crate::entry::{Entry, EntryKind};
use crate::kind::DataKind;

/// Immutable listing of a folder's materialized children.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    entries: Vec<Entry>,
    generation: u64,
}

impl Snapshot {
    /// Create a snapshot. `generation` increases with every refresh of the folder.
    pub fn new(entries: Vec<Entry>, generation: u64) -> Self {
        Self {
            entries,
            generation,
        }
    }

    /// All children in backend enumeration order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Refresh generation this snapshot was taken at.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of children.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the folder has no materialized children.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sub-folders in enumeration order.
    pub fn folders(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter().filter(|e| e.is_folder())
    }

    /// Data entries in enumeration order.
    pub fn data_entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter().filter(|e| e.is_data())
    }

    /// Sub-folders followed by data entries.
    pub fn folders_then_data(&self) -> impl Iterator<Item = &Entry> {
        self.folders().chain(self.data_entries())
    }

    /// Sub-folder with the given name.
    pub fn find_folder(&self, name: &str) -> Option<&Entry> {
        self.folders().find(|e| e.name == name)
    }

    /// First data entry with the given name whose kind `expected` accepts.
    pub fn find_data<'a>(&'a self, name: &'a str, expected: DataKind) -> Option<&'a Entry> {
        self.matching_data(name, expected).next()
    }

    /// All data entries with the given name whose kind `expected` accepts.
    pub fn matching_data<'a>(
        &'a self,
        name: &'a str,
        expected: DataKind,
    ) -> impl Iterator<Item = &'a Entry> + 'a {
        self.data_entries().filter(move |e| {
            e.name == name && e.data_kind().is_some_and(|kind| expected.accepts(kind))
        })
    }

    /// Child with this name whose kind conflicts with `kind`.
    pub fn find_conflicting(&self, name: &str, kind: &EntryKind) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|e| e.name == name && e.kind.conflicts_with(kind))
    }

    /// First child with the given name, whatever its kind.
    pub fn find_named(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Check if any child has the given name.
    pub fn contains_name(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::NodeId;

    fn sample() -> Snapshot {
        let parent = NodeId::new(0);
        Snapshot::new(
            vec![
                Entry::new_data(
                    NodeId::new(1),
                    "data",
                    EntryKind::data_with_format(DataKind::IoObject, "ioo"),
                    parent,
                ),
                Entry::new_folder(NodeId::new(2), "data", Some(parent)),
                Entry::new_data(
                    NodeId::new(3),
                    "data",
                    EntryKind::data_with_format(DataKind::IoObject, "table"),
                    parent,
                ),
                Entry::new_data(
                    NodeId::new(4),
                    "etl",
                    EntryKind::data(DataKind::Process),
                    parent,
                ),
            ],
            1,
        )
    }

    #[test]
    fn test_folders_then_data_order() {
        let ids: Vec<u64> = sample().folders_then_data().map(|e| e.id.0).collect();
        assert_eq!(ids, vec![2, 1, 3, 4]);
    }

    #[test]
    fn test_find_by_kind() {
        let snapshot = sample();
        assert_eq!(snapshot.find_folder("data").unwrap().id, NodeId::new(2));
        assert_eq!(
            snapshot.find_data("data", DataKind::Any).unwrap().id,
            NodeId::new(1)
        );
        assert_eq!(snapshot.matching_data("data", DataKind::IoObject).count(), 2);
        assert!(snapshot.find_data("etl", DataKind::IoObject).is_none());
        assert!(snapshot.find_data("etl", DataKind::Process).is_some());
    }

    #[test]
    fn test_find_conflicting() {
        let snapshot = sample();
        let process = EntryKind::data(DataKind::Process);
        assert!(snapshot.find_conflicting("data", &process).is_none());
        assert!(snapshot.find_conflicting("etl", &process).is_some());
        assert!(snapshot.find_conflicting("data", &EntryKind::Folder).is_some());
    }

    #[test]
    fn test_find_named_ignores_kind() {
        let snapshot = sample();
        assert_eq!(snapshot.find_named("data").unwrap().id, NodeId::new(1));
        assert_eq!(snapshot.find_named("etl").unwrap().id, NodeId::new(4));
        assert!(snapshot.find_named("missing").is_none());
        assert!(snapshot.contains_name("etl"));
    }

    #[test]
    fn test_find_data_outlives_borrowed_name() {
        let snapshot = sample();
        let found = {
            let name = String::from("etl");
            snapshot.find_data(&name, DataKind::Any).map(|e| e.id)
        };
        assert_eq!(found, Some(NodeId::new(4)));
    }
}
