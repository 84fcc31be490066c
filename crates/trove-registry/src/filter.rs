//! Visibility filters over the repository list.
//!
//! Filters are applied every time the visible list is requested. A filter can be
//! reset, which makes it let everything through until it is rearmed; the registry
//! uses this to reveal a specific hidden repository.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use globset::{Glob, GlobSet, GlobSetBuilder};
use trove_core::Repository;

/// A predicate over mounted repositories.
pub trait RepositoryFilter: Send + Sync {
    /// Name used to identify the filter.
    fn name(&self) -> &str;

    /// Whether `repository` is shown.
    fn allows(&self, repository: &Repository) -> bool;

    /// Temporarily show everything.
    fn reset(&self);

    /// Undo [`RepositoryFilter::reset`].
    fn rearm(&self) {}

    /// Apply the filter to a list.
    fn filter(&self, repositories: &[Arc<Repository>]) -> Vec<Arc<Repository>> {
        repositories
            .iter()
            .filter(|r| self.allows(r))
            .cloned()
            .collect()
    }
}

/// Hides repositories whose name matches any of a set of glob patterns.
pub struct GlobFilter {
    name: String,
    patterns: Vec<String>,
    set: GlobSet,
    revealed: AtomicBool,
}

impl GlobFilter {
    /// Build a filter hiding names that match `patterns`.
    pub fn new<I, S>(name: impl Into<String>, patterns: I) -> Result<Self, globset::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = GlobSetBuilder::new();
        let mut sources = Vec::new();
        for pattern in patterns {
            builder.add(Glob::new(pattern.as_ref())?);
            sources.push(pattern.as_ref().to_string());
        }

        Ok(Self {
            name: name.into(),
            patterns: sources,
            set: builder.build()?,
            revealed: AtomicBool::new(false),
        })
    }

    /// The patterns this filter hides.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl RepositoryFilter for GlobFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn allows(&self, repository: &Repository) -> bool {
        self.revealed.load(Ordering::Relaxed) || !self.set.is_match(repository.name())
    }

    fn reset(&self) {
        self.revealed.store(true, Ordering::Relaxed);
    }

    fn rearm(&self) {
        self.revealed.store(false, Ordering::Relaxed);
    }
}

impl fmt::Debug for GlobFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobFilter")
            .field("name", &self.name)
            .field("patterns", &self.patterns)
            .field("revealed", &self.revealed.load(Ordering::Relaxed))
            .finish()
    }
}

/// Hides transient repositories.
#[derive(Debug, Default)]
pub struct TransientFilter {
    revealed: AtomicBool,
}

impl TransientFilter {
    pub const NAME: &'static str = "transient";

    pub fn new() -> Self {
        Self::default()
    }
}

impl RepositoryFilter for TransientFilter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn allows(&self, repository: &Repository) -> bool {
        self.revealed.load(Ordering::Relaxed) || !repository.is_transient()
    }

    fn reset(&self) {
        self.revealed.store(true, Ordering::Relaxed);
    }

    fn rearm(&self) {
        self.revealed.store(false, Ordering::Relaxed);
    }
}

type Predicate = Box<dyn Fn(&Repository) -> bool + Send + Sync>;

/// Shows repositories for which a closure returns true.
pub struct PredicateFilter {
    name: String,
    predicate: Predicate,
    revealed: AtomicBool,
}

impl PredicateFilter {
    pub fn new(
        name: impl Into<String>,
        predicate: impl Fn(&Repository) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            predicate: Box::new(predicate),
            revealed: AtomicBool::new(false),
        }
    }
}

impl RepositoryFilter for PredicateFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn allows(&self, repository: &Repository) -> bool {
        self.revealed.load(Ordering::Relaxed) || (self.predicate)(repository)
    }

    fn reset(&self) {
        self.revealed.store(true, Ordering::Relaxed);
    }

    fn rearm(&self) {
        self.revealed.store(false, Ordering::Relaxed);
    }
}

impl fmt::Debug for PredicateFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateFilter")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use trove_core::{MemoryBackend, RepositoryKind, RepositoryMeta};

    use super::*;

    fn repo(name: &str, transient: bool) -> Arc<Repository> {
        Arc::new(Repository::new(
            name,
            RepositoryMeta::new(RepositoryKind::Local).with_transient(transient),
            MemoryBackend::new().into_shared(),
        ))
    }

    #[test]
    fn test_glob_filter() {
        let filter = GlobFilter::new("scratch", ["tmp-*", "*.bak"]).unwrap();
        let repos = vec![repo("tmp-1", false), repo("Local", false), repo("old.bak", false)];

        let shown = filter.filter(&repos);
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].name(), "Local");

        filter.reset();
        assert_eq!(filter.filter(&repos).len(), 3);
        filter.rearm();
        assert_eq!(filter.filter(&repos).len(), 1);
    }

    #[test]
    fn test_invalid_glob() {
        assert!(GlobFilter::new("bad", ["a[b"]).is_err());
    }

    #[test]
    fn test_transient_filter() {
        let filter = TransientFilter::new();
        assert!(filter.allows(&repo("Local", false)));
        assert!(!filter.allows(&repo("Scratch", true)));
    }

    #[test]
    fn test_predicate_filter() {
        let filter = PredicateFilter::new("local-only", |r| r.kind() == RepositoryKind::Local);
        assert!(filter.allows(&repo("Local", false)));
    }
}
