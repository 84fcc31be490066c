//! Namespace configuration.

use std::path::PathBuf;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::location::CONNECTIONS_FOLDER;

/// Default total used by whole-operation progress reporting.
pub const DEFAULT_PROGRESS_TOTAL: u64 = 100_000;

/// Configuration shared by the resolver, mutator and registry.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[serde(default)]
pub struct NamespaceConfig {
    /// Name of the connections folder at repository roots.
    #[builder(default = "CONNECTIONS_FOLDER.to_string()")]
    pub connections_folder: String,

    /// Resource-bundle repositories listed here sort first, in this order.
    #[builder(default = "vec![\"Samples\".to_string()]")]
    pub well_known_repositories: Vec<String>,

    /// Total progress units for a whole copy or move.
    #[builder(default = "DEFAULT_PROGRESS_TOTAL")]
    pub progress_total: u64,

    /// Default strictness for locations built from user input.
    #[builder(default = "false")]
    pub strict_on_duplicate: bool,

    /// File holding the list of known repositories.
    #[builder(default)]
    pub repositories_file: Option<PathBuf>,
}

impl NamespaceConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref name) = self.connections_folder {
            if name.trim().is_empty() {
                return Err("Connections folder name cannot be empty".to_string());
            }
        }
        if let Some(total) = self.progress_total {
            if total == 0 {
                return Err("Progress total must be positive".to_string());
            }
        }
        Ok(())
    }
}

impl NamespaceConfig {
    /// Create a new config builder.
    pub fn builder() -> NamespaceConfigBuilder {
        NamespaceConfigBuilder::default()
    }

    /// Position of a well-known repository name, if listed.
    pub fn well_known_rank(&self, name: &str) -> Option<usize> {
        self.well_known_repositories.iter().position(|n| n == name)
    }
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            connections_folder: CONNECTIONS_FOLDER.to_string(),
            well_known_repositories: vec!["Samples".to_string()],
            progress_total: DEFAULT_PROGRESS_TOTAL,
            strict_on_duplicate: false,
            repositories_file: None,
        }
    }
}
