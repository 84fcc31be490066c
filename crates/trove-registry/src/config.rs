//! Loading and saving the namespace configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;
use trove_core::NamespaceConfig;

use crate::error::StoreError;
use crate::registry::Registry;
use crate::store::JsonFileStore;

const APP_DIR: &str = "trove";

/// `<config dir>/trove/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
}

/// `<config dir>/trove/repositories.json`.
pub fn default_repositories_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join("repositories.json"))
}

/// Where the known-repositories list lives for `config`.
pub fn repositories_path(config: &NamespaceConfig) -> Option<PathBuf> {
    config
        .repositories_file
        .clone()
        .or_else(default_repositories_path)
}

/// Read a configuration file. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<NamespaceConfig, StoreError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(NamespaceConfig::default()),
        Err(e) => Err(e.into()),
    }
}

/// Load from the default location, falling back to defaults on any problem.
pub fn load_default_config() -> NamespaceConfig {
    let Some(path) = default_config_path() else {
        return NamespaceConfig::default();
    };
    load_config(&path).unwrap_or_else(|e| {
        debug!(path = %path.display(), error = %e, "using default configuration");
        NamespaceConfig::default()
    })
}

/// Write a configuration file, creating its directory.
pub fn save_config(config: &NamespaceConfig, path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Save to the default location.
pub fn save_default_config(config: &NamespaceConfig) -> Result<(), StoreError> {
    let path = default_config_path().ok_or(StoreError::NoConfigDir)?;
    save_config(config, &path)
}

impl Registry {
    /// A registry persisting to the repositories file named by `config`.
    pub fn from_config(config: NamespaceConfig) -> Self {
        let path = repositories_path(&config);
        let registry = Registry::new(config);
        match path {
            Some(path) => registry.with_store(Arc::new(JsonFileStore::new(path))),
            None => registry,
        }
    }
}
