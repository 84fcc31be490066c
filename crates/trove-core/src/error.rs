//! Error types for repository operations.

use thiserror::Error;

use crate::entry::NodeId;
use crate::kind::LocationType;

/// Result alias used throughout trove.
pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Boxed backend cause carried by [`RepositoryError::RepositoryFailure`].
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while addressing or mutating repositories.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Location text could not be parsed.
    #[error("Malformed location '{location}': {reason}")]
    MalformedLocation { location: String, reason: String },

    /// A folder operation was asked for a data location, or vice versa.
    #[error("Wrong location type for '{location}': expected {expected}, got {actual}")]
    WrongLocationType {
        location: String,
        expected: LocationType,
        actual: LocationType,
    },

    /// Nothing exists at the location, even after a refresh.
    #[error("Entry not found: {location}")]
    EntryNotFound { location: String },

    /// Several data entries share a name under strict resolution.
    #[error("Ambiguous location '{location}': {count} data entries share this name")]
    DuplicateDataEntry { location: String, count: usize },

    /// The repository cannot hold connection entries.
    #[error("Repository '{repository}' does not support connections")]
    ConnectionsUnsupported { repository: String },

    /// The connections folder cannot be restructured.
    #[error("The connections folder cannot be modified: {location}")]
    ConnectionFolderImmutable { location: String },

    /// An entry name violates the naming rules.
    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// No repository is mounted under this name.
    #[error("Unknown repository: {name}")]
    UnknownRepository { name: String },

    /// The backend failed. Wraps the backend-specific cause once.
    #[error("Repository failure: {message}")]
    RepositoryFailure {
        message: String,
        #[source]
        source: Option<BoxedCause>,
    },
}

impl RepositoryError {
    /// Create a malformed location error.
    pub fn malformed(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedLocation {
            location: location.into(),
            reason: reason.into(),
        }
    }

    /// Create a failure without an underlying cause.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::RepositoryFailure {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap a backend error into a repository failure.
    pub fn wrap(message: impl Into<String>, source: BackendError) -> Self {
        Self::RepositoryFailure {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a not-found error for a location string.
    pub fn not_found(location: impl ToString) -> Self {
        Self::EntryNotFound {
            location: location.to_string(),
        }
    }

    /// Whether this error is a backend failure (as opposed to a contract or policy error).
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, Self::RepositoryFailure { .. })
    }
}

/// Errors reported by storage backends.
///
/// Backends never return [`RepositoryError`] directly; the repository handle wraps
/// these into [`RepositoryError::RepositoryFailure`].
#[derive(Debug, Error)]
pub enum BackendError {
    /// An entry with the same name and kind already exists.
    #[error("Entry already exists: {name}")]
    AlreadyExists { name: String },

    /// The node id does not refer to a live entry.
    #[error("No such entry: {0:?}")]
    NoSuchEntry(NodeId),

    /// The node is not a folder.
    #[error("Not a folder: {0:?}")]
    NotAFolder(NodeId),

    /// The entry or the whole backend is read-only.
    #[error("Entry is read-only: {name}")]
    ReadOnly { name: String },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn test_wrap_keeps_source() {
        let err = RepositoryError::wrap(
            "Failed to refresh /a",
            BackendError::Io(std::io::Error::other("disk gone")),
        );
        assert!(err.is_backend_failure());
        assert!(err.source().unwrap().to_string().contains("disk gone"));
    }

    #[test]
    fn test_display_messages() {
        let err = RepositoryError::malformed("foo", "missing prefix");
        assert_eq!(err.to_string(), "Malformed location 'foo': missing prefix");

        let err = RepositoryError::WrongLocationType {
            location: "//R/a".into(),
            expected: LocationType::Folder,
            actual: LocationType::DataEntry,
        };
        assert!(err.to_string().contains("expected folder, got data_entry"));
    }
}
