//! The repository registry.
//!
//! A [`Registry`] is constructed once at startup and handed to everything that
//! needs to find repositories by name. It keeps the mounted repositories in
//! display order, persists the non-transient ones, and tells interested parties
//! when the set changes, both through synchronous [`RegistryListener`]s and a
//! broadcast channel.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, RwLock};

use itertools::Itertools;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use trove_core::{
    Backend, NamespaceConfig, Repository, RepositoryError, RepositoryKind, RepositoryLookup,
};

use crate::error::{RegistryError, RegistryResult};
use crate::filter::RepositoryFilter;
use crate::store::{RepositoryDescriptor, RepositoryStore};

/// Capacity of the registry event channel.
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Change to the set of mounted repositories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A repository was mounted.
    Added { name: String },
    /// A repository was unmounted.
    Removed { name: String },
    /// The registry was shut down.
    ShutDown,
}

/// Synchronous observer of the repository set.
pub trait RegistryListener: Send + Sync {
    fn repository_was_added(&self, repository: &Arc<Repository>);

    fn repository_was_removed(&self, repository: &Arc<Repository>);
}

/// The set of mounted repositories.
pub struct Registry {
    config: NamespaceConfig,
    repositories: RwLock<Vec<Arc<Repository>>>,
    filters: RwLock<Vec<Arc<dyn RepositoryFilter>>>,
    listeners: RwLock<Vec<Arc<dyn RegistryListener>>>,
    store: Option<Arc<dyn RepositoryStore>>,
    events: broadcast::Sender<RegistryEvent>,
    shut_down: AtomicBool,
}

impl Registry {
    /// An empty registry that persists nothing.
    pub fn new(config: NamespaceConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config,
            repositories: RwLock::new(Vec::new()),
            filters: RwLock::new(Vec::new()),
            listeners: RwLock::new(Vec::new()),
            store: None,
            events,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Persist the known-repositories list in `store`.
    pub fn with_store(mut self, store: Arc<dyn RepositoryStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &NamespaceConfig {
        &self.config
    }

    /// Subscribe to registry events.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    /// Whether [`Registry::shutdown`] has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(AtomicOrdering::Acquire)
    }

    // ==================== Membership ====================

    /// Mount a repository. Non-transient repositories are persisted.
    ///
    /// If persisting fails the repository is unmounted again and nobody is notified.
    pub fn add_repository(&self, repository: Arc<Repository>) -> RegistryResult<()> {
        self.insert(repository.clone())?;
        if let Err(e) = self.persist_change(&repository) {
            self.write_repositories().retain(|r| !Arc::ptr_eq(r, &repository));
            warn!(repository = repository.name(), error = %e, "add rolled back");
            return Err(e);
        }

        info!(
            repository = repository.name(),
            kind = %repository.kind(),
            "repository added"
        );
        self.notify_added(&repository);
        Ok(())
    }

    /// Unmount a repository by name.
    ///
    /// If persisting fails the repository is mounted again and nobody is notified.
    pub fn remove_repository(&self, name: &str) -> RegistryResult<Arc<Repository>> {
        self.ensure_running()?;
        let removed = {
            let mut repositories = self.write_repositories();
            let index = repositories
                .iter()
                .position(|r| r.name() == name)
                .ok_or_else(|| RegistryError::UnknownRepository {
                    name: name.to_string(),
                })?;
            repositories.remove(index)
        };
        if let Err(e) = self.persist_change(&removed) {
            self.place_sorted(&mut self.write_repositories(), removed);
            warn!(repository = name, error = %e, "remove rolled back");
            return Err(e);
        }

        info!(repository = name, "repository removed");
        for listener in self.listener_snapshot() {
            listener.repository_was_removed(&removed);
        }
        let _ = self.events.send(RegistryEvent::Removed {
            name: name.to_string(),
        });
        Ok(removed)
    }

    /// The repository mounted under `name`, if any.
    pub fn get(&self, name: &str) -> Option<Arc<Repository>> {
        self.read_repositories()
            .iter()
            .find(|r| r.name() == name)
            .cloned()
    }

    /// All mounted repositories in display order.
    pub fn repositories(&self) -> Vec<Arc<Repository>> {
        self.read_repositories().clone()
    }

    /// Mounted repositories that pass every registered filter.
    pub fn visible(&self) -> Vec<Arc<Repository>> {
        let filters = self.filter_snapshot();
        filters
            .iter()
            .fold(self.repositories(), |shown, filter| filter.filter(&shown))
    }

    /// Number of mounted repositories.
    pub fn len(&self) -> usize {
        self.read_repositories().len()
    }

    /// Check if nothing is mounted.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ==================== Filters ====================

    /// Append a filter to the chain.
    pub fn register_filter(&self, filter: Arc<dyn RepositoryFilter>) {
        if let Ok(mut filters) = self.filters.write() {
            filters.push(filter);
        }
    }

    /// Remove a filter by name. Returns whether one was registered.
    pub fn remove_filter(&self, name: &str) -> bool {
        let Ok(mut filters) = self.filters.write() else {
            return false;
        };
        let before = filters.len();
        filters.retain(|f| f.name() != name);
        filters.len() != before
    }

    /// Reset exactly the filters that hide `name`. Returns their names.
    pub fn unhide(&self, name: &str) -> RegistryResult<Vec<String>> {
        let repository = self
            .get(name)
            .ok_or_else(|| RegistryError::UnknownRepository {
                name: name.to_string(),
            })?;

        let reset: Vec<String> = self
            .filter_snapshot()
            .into_iter()
            .filter(|f| !f.allows(&repository))
            .map(|f| {
                f.reset();
                f.name().to_string()
            })
            .collect();
        debug!(repository = name, filters = ?reset, "unhid repository");
        Ok(reset)
    }

    // ==================== Listeners ====================

    /// Register a synchronous listener.
    pub fn add_listener(&self, listener: Arc<dyn RegistryListener>) {
        if let Ok(mut listeners) = self.listeners.write() {
            listeners.push(listener);
        }
    }

    /// Unregister a listener by identity.
    pub fn remove_listener(&self, listener: &Arc<dyn RegistryListener>) -> bool {
        let Ok(mut listeners) = self.listeners.write() else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    // ==================== Persistence ====================

    /// Mount every stored repository, building backends with `factory`.
    ///
    /// Entries whose backend cannot be built, and names that are already mounted,
    /// are skipped. Returns how many were mounted.
    pub fn load_from_store<F>(&self, factory: F) -> RegistryResult<usize>
    where
        F: Fn(&RepositoryDescriptor) -> Result<Arc<dyn Backend>, RepositoryError>,
    {
        let Some(store) = &self.store else {
            return Ok(0);
        };

        let mut mounted = 0;
        for descriptor in store.load()? {
            let backend = match factory(&descriptor) {
                Ok(backend) => backend,
                Err(e) => {
                    debug!(repository = %descriptor.name, error = %e, "skipping stored repository");
                    continue;
                }
            };
            let repository = Arc::new(Repository::new(
                descriptor.name.as_str(),
                descriptor.meta.clone(),
                backend,
            ));
            match self.insert(repository.clone()) {
                Ok(()) => {}
                Err(RegistryError::DuplicateRepository { name }) => {
                    debug!(repository = %name, "skipping duplicate stored repository");
                    continue;
                }
                Err(e) => return Err(e),
            }
            self.notify_added(&repository);
            mounted += 1;
        }
        Ok(mounted)
    }

    /// Write the non-transient repositories to the store.
    pub fn save(&self) -> RegistryResult<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let descriptors: Vec<RepositoryDescriptor> = self
            .read_repositories()
            .iter()
            .filter(|r| !r.is_transient())
            .map(|r| RepositoryDescriptor::of(r))
            .collect();
        store.save(&descriptors)?;
        Ok(())
    }

    /// Tear the registry down: drop every repository, filter and listener.
    ///
    /// Later mutations fail with [`RegistryError::ShutDown`].
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, AtomicOrdering::AcqRel) {
            return;
        }

        let repositories = std::mem::take(&mut *self.write_repositories());
        for repository in &repositories {
            repository.clear_listeners();
        }
        if let Ok(mut filters) = self.filters.write() {
            filters.clear();
        }
        if let Ok(mut listeners) = self.listeners.write() {
            listeners.clear();
        }

        info!(count = repositories.len(), "registry shut down");
        let _ = self.events.send(RegistryEvent::ShutDown);
    }

    // ==================== Ordering ====================

    /// Display order of two repositories.
    pub fn compare(&self, a: &Repository, b: &Repository) -> Ordering {
        a.kind()
            .priority()
            .cmp(&b.kind().priority())
            .then_with(|| self.well_known_rank(a).cmp(&self.well_known_rank(b)))
            .then_with(|| natural_cmp(a.name(), b.name()))
            .then_with(|| a.name().cmp(b.name()))
    }

    fn well_known_rank(&self, repository: &Repository) -> usize {
        if repository.kind() != RepositoryKind::ResourceBundle {
            return usize::MAX;
        }
        self.config
            .well_known_rank(repository.name())
            .unwrap_or(usize::MAX)
    }

    // ==================== Helpers ====================

    fn insert(&self, repository: Arc<Repository>) -> RegistryResult<()> {
        self.ensure_running()?;
        let mut repositories = self.write_repositories();
        if repositories.iter().any(|r| r.name() == repository.name()) {
            return Err(RegistryError::DuplicateRepository {
                name: repository.name().to_string(),
            });
        }
        self.place_sorted(&mut repositories, repository);
        Ok(())
    }

    fn place_sorted(
        &self,
        repositories: &mut Vec<Arc<Repository>>,
        repository: Arc<Repository>,
    ) {
        let index = repositories
            .partition_point(|r| self.compare(r, &repository) == Ordering::Less);
        repositories.insert(index, repository);
    }

    /// Save after `repository` joined or left the set, unless it is transient.
    fn persist_change(&self, repository: &Repository) -> RegistryResult<()> {
        if repository.is_transient() {
            return Ok(());
        }
        self.save()
    }

    fn notify_added(&self, repository: &Arc<Repository>) {
        for listener in self.listener_snapshot() {
            listener.repository_was_added(repository);
        }
        let _ = self.events.send(RegistryEvent::Added {
            name: repository.name().to_string(),
        });
    }

    fn ensure_running(&self) -> RegistryResult<()> {
        if self.is_shut_down() {
            Err(RegistryError::ShutDown)
        } else {
            Ok(())
        }
    }

    fn read_repositories(&self) -> std::sync::RwLockReadGuard<'_, Vec<Arc<Repository>>> {
        self.repositories
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_repositories(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Arc<Repository>>> {
        self.repositories
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn listener_snapshot(&self) -> Vec<Arc<dyn RegistryListener>> {
        self.listeners.read().map(|l| l.clone()).unwrap_or_default()
    }

    fn filter_snapshot(&self) -> Vec<Arc<dyn RepositoryFilter>> {
        self.filters.read().map(|f| f.clone()).unwrap_or_default()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(NamespaceConfig::default())
    }
}

impl RepositoryLookup for Registry {
    fn repository(&self, name: &str) -> trove_core::Result<Arc<Repository>> {
        self.get(name)
            .ok_or_else(|| RepositoryError::UnknownRepository {
                name: name.to_string(),
            })
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field(
                "repositories",
                &self.read_repositories().iter().map(|r| r.name()).join(", "),
            )
            .field("store", &self.store)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

/// Case-insensitive comparison that orders digit runs by numeric value.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let left = chunks(a);
    let right = chunks(b);

    for (x, y) in left.iter().zip(&right) {
        let ordering = match (x, y) {
            ((true, x), (true, y)) => {
                let x = x.trim_start_matches('0');
                let y = y.trim_start_matches('0');
                x.len().cmp(&y.len()).then_with(|| x.cmp(y))
            }
            ((_, x), (_, y)) => x.cmp(y),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    left.len().cmp(&right.len())
}

/// Split into lowercase runs of digits and non-digits.
fn chunks(s: &str) -> Vec<(bool, String)> {
    let grouped = s.chars().flat_map(char::to_lowercase).chunk_by(char::is_ascii_digit);
    grouped
        .into_iter()
        .map(|(digits, run)| (digits, run.collect()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_cmp() {
        assert_eq!(natural_cmp("repo2", "repo10"), Ordering::Less);
        assert_eq!(natural_cmp("Alpha", "beta"), Ordering::Less);
        assert_eq!(natural_cmp("ALPHA", "alpha"), Ordering::Equal);
        assert_eq!(natural_cmp("a007", "a7"), Ordering::Equal);
        assert_eq!(natural_cmp("a", "a1"), Ordering::Less);
    }

    #[test]
    fn test_natural_sort() {
        let mut names = vec!["Local 10", "local 2", "Archive", "Local 1"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, vec!["Archive", "Local 1", "local 2", "Local 10"]);
    }
}
