//! Repository registry for trove.
//!
//! This crate provides:
//! - [`Registry`], the ordered set of mounted repositories
//! - Visibility filters ([`GlobFilter`], [`TransientFilter`], [`PredicateFilter`])
//! - Persistence of the known-repositories list ([`JsonFileStore`])
//! - Configuration loading from TOML

pub mod config;
pub mod error;
pub mod filter;
pub mod registry;
pub mod store;

pub use config::{
    default_config_path, default_repositories_path, load_config, load_default_config,
    repositories_path, save_config, save_default_config,
};
pub use error::{RegistryError, RegistryResult, StoreError};
pub use filter::{GlobFilter, PredicateFilter, RepositoryFilter, TransientFilter};
pub use registry::{Registry, RegistryEvent, RegistryListener, natural_cmp};
pub use store::{JsonFileStore, MemoryStore, RepositoryDescriptor, RepositoryStore};
