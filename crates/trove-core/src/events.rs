//! Repository content events and listener fan-out.
//!
//! Events are a tagged enum. Listeners that predate [`RepositoryEvent::EntryMoved`]
//! receive it as [`RepositoryEvent::EntryChanged`] instead.

use std::sync::{Arc, RwLock};

use compact_str::CompactString;

use crate::entry::{Entry, NodeId};

/// A change inside one repository.
#[derive(Debug, Clone, PartialEq)]
pub enum RepositoryEvent {
    /// A folder or data entry was created.
    EntryAdded {
        repository: CompactString,
        entry: Entry,
    },
    /// An entry's name or content changed.
    EntryChanged {
        repository: CompactString,
        entry: Entry,
    },
    /// An entry was deleted from `parent`.
    EntryRemoved {
        repository: CompactString,
        entry: Entry,
        parent: Option<NodeId>,
    },
    /// An entry moved to a new parent and/or name.
    EntryMoved {
        repository: CompactString,
        entry: Entry,
        former_parent: Option<NodeId>,
        former_name: CompactString,
    },
    /// A folder was reloaded from storage.
    FolderRefreshed {
        repository: CompactString,
        folder: Entry,
    },
}

impl RepositoryEvent {
    /// Repository the event happened in.
    pub fn repository(&self) -> &str {
        match self {
            Self::EntryAdded { repository, .. }
            | Self::EntryChanged { repository, .. }
            | Self::EntryRemoved { repository, .. }
            | Self::EntryMoved { repository, .. }
            | Self::FolderRefreshed { repository, .. } => repository,
        }
    }

    /// The entry the event is about.
    pub fn entry(&self) -> &Entry {
        match self {
            Self::EntryAdded { entry, .. }
            | Self::EntryChanged { entry, .. }
            | Self::EntryRemoved { entry, .. }
            | Self::EntryMoved { entry, .. } => entry,
            Self::FolderRefreshed { folder, .. } => folder,
        }
    }

    /// Map the event onto the variants legacy listeners understand.
    pub fn for_legacy(&self) -> RepositoryEvent {
        match self {
            Self::EntryMoved {
                repository, entry, ..
            } => Self::EntryChanged {
                repository: repository.clone(),
                entry: entry.clone(),
            },
            other => other.clone(),
        }
    }
}

/// Receives repository content events.
pub trait RepositoryListener: Send + Sync {
    /// Handle one event.
    fn on_event(&self, event: &RepositoryEvent);

    /// Whether this listener handles [`RepositoryEvent::EntryMoved`] itself.
    fn understands_moves(&self) -> bool {
        false
    }
}

impl<F> RepositoryListener for F
where
    F: Fn(&RepositoryEvent) + Send + Sync,
{
    fn on_event(&self, event: &RepositoryEvent) {
        self(event)
    }
}

/// Ordered set of listeners. Dispatch is synchronous, in registration order.
#[derive(Default)]
pub struct ListenerSet {
    listeners: RwLock<Vec<Arc<dyn RepositoryListener>>>,
}

impl ListenerSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener.
    pub fn add(&self, listener: Arc<dyn RepositoryListener>) {
        if let Ok(mut listeners) = self.listeners.write() {
            listeners.push(listener);
        }
    }

    /// Unregister a listener by identity. Returns whether it was registered.
    pub fn remove(&self, listener: &Arc<dyn RepositoryListener>) -> bool {
        let Ok(mut listeners) = self.listeners.write() else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.read().map(|l| l.len()).unwrap_or(0)
    }

    /// Check if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every listener.
    pub fn clear(&self) {
        if let Ok(mut listeners) = self.listeners.write() {
            listeners.clear();
        }
    }

    /// Deliver an event to every listener.
    pub fn dispatch(&self, event: &RepositoryEvent) {
        // Snapshot so listeners may (un)register from inside a callback.
        let listeners = match self.listeners.read() {
            Ok(listeners) => listeners.clone(),
            Err(_) => return,
        };

        let legacy = matches!(event, RepositoryEvent::EntryMoved { .. }).then(|| event.for_legacy());
        for listener in listeners {
            match &legacy {
                Some(legacy) if !listener.understands_moves() => listener.on_event(legacy),
                _ => listener.on_event(event),
            }
        }
    }
}

impl std::fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSet")
            .field("listeners", &self.len())
            .finish()
    }
}
