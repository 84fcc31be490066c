//! Repository locations.
//!
//! A location names a repository and a path inside it, plus the shape of entry it
//! expects to find there. Locations are immutable values built through
//! [`LocationBuilder`]; they never touch a backend.
//!
//! Grammar:
//!
//! - absolute: `//<repository>/<segment>/<segment>...`
//! - root-relative: `/<segment>/...` (repository taken from the parent location)
//! - relative: `<token>/<token>...` where `..` pops one segment and `.` is ignored

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use compact_str::CompactString;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::{RepositoryError, Result};
use crate::kind::{DataKind, LocationType};

/// Prefix that starts every absolute location.
pub const REPOSITORY_PREFIX: &str = "//";

/// Path separator.
pub const SEPARATOR: char = '/';

/// Default name of the connections folder at a repository root.
pub const CONNECTIONS_FOLDER: &str = "Connections";

const PARENT_TOKEN: &str = "..";
const CURRENT_TOKEN: &str = ".";

/// An immutable address of a folder or data entry.
///
/// Equality and hashing cover the repository name, path, location type and expected
/// kind. `strict_on_duplicate` only changes resolver behavior and is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawLocation")]
pub struct Location {
    repository: CompactString,
    components: Vec<CompactString>,
    location_type: LocationType,
    expected_kind: DataKind,
    strict_on_duplicate: bool,
}

impl Location {
    /// Parse an absolute location with default builder settings.
    pub fn parse(text: &str) -> Result<Self> {
        LocationBuilder::new().build_from_absolute(text)
    }

    /// Location of a repository root.
    pub fn root(repository: &str) -> Result<Self> {
        LocationBuilder::new()
            .with_location_type(LocationType::Folder)
            .build_from_components(repository, &[] as &[&str])
    }

    /// Name of the repository this location points into.
    pub fn repository_name(&self) -> &str {
        &self.repository
    }

    /// Path segments below the repository root.
    pub fn components(&self) -> &[CompactString] {
        &self.components
    }

    /// Declared shape of the addressed entry.
    pub fn location_type(&self) -> LocationType {
        self.location_type
    }

    /// Data kind the resolver should look for.
    pub fn expected_kind(&self) -> DataKind {
        self.expected_kind
    }

    /// Whether ambiguous same-named data entries are an error.
    pub fn strict_on_duplicate(&self) -> bool {
        self.strict_on_duplicate
    }

    /// Number of path segments; zero for a repository root.
    pub fn depth(&self) -> usize {
        self.components.len()
    }

    /// Whether this addresses a repository root.
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Last path segment, or the repository name for a root.
    pub fn name(&self) -> &str {
        self.components
            .last()
            .map(CompactString::as_str)
            .unwrap_or(self.repository.as_str())
    }

    /// Root-relative path, e.g. `/a/b`. A root renders as `/`.
    pub fn path(&self) -> String {
        let mut path = String::from(SEPARATOR);
        path.push_str(&self.components.iter().join("/"));
        path
    }

    /// Absolute form, e.g. `//Local/a/b`.
    pub fn to_absolute_string(&self) -> String {
        format!("{REPOSITORY_PREFIX}{}{}", self.repository, self.path())
    }

    /// Location of the containing folder, or `None` at a repository root.
    pub fn parent(&self) -> Option<Location> {
        let (_, ancestors) = self.components.split_last()?;
        Some(Location {
            repository: self.repository.clone(),
            components: ancestors.to_vec(),
            location_type: LocationType::Folder,
            expected_kind: DataKind::Any,
            strict_on_duplicate: self.strict_on_duplicate,
        })
    }

    /// Location of a direct child with unknown type.
    pub fn child(&self, name: &str) -> Result<Location> {
        LocationBuilder::new()
            .with_strict_on_duplicate(self.strict_on_duplicate)
            .build_from_components(
                &self.repository,
                &self
                    .components
                    .iter()
                    .map(CompactString::as_str)
                    .chain(std::iter::once(name))
                    .collect::<Vec<_>>(),
            )
    }

    /// Same path, declared as a folder.
    pub fn to_folder(&self) -> Location {
        Location {
            location_type: LocationType::Folder,
            expected_kind: DataKind::Any,
            ..self.clone()
        }
    }

    /// Same path, declared as a data entry. Keeps the expected kind.
    pub fn to_data_entry(&self) -> Location {
        Location {
            location_type: LocationType::DataEntry,
            ..self.clone()
        }
    }

    /// Whether both locations name the same repository path, ignoring type and kind.
    pub fn same_path_as(&self, other: &Location) -> bool {
        self.repository == other.repository && self.components == other.components
    }

    /// Whether this location lies strictly below `ancestor`.
    pub fn is_descendant_of(&self, ancestor: &Location) -> bool {
        self.repository == ancestor.repository
            && self.components.len() > ancestor.components.len()
            && self.components.starts_with(&ancestor.components)
    }

    /// Whether the first segment is the default connections folder.
    pub fn is_in_connections_folder(&self) -> bool {
        self.is_in_connections_folder_with(|name| name == CONNECTIONS_FOLDER)
    }

    /// Whether the first segment satisfies a backend-supplied connections predicate.
    pub fn is_in_connections_folder_with(&self, is_connections: impl Fn(&str) -> bool) -> bool {
        self.components
            .first()
            .is_some_and(|first| is_connections(first.as_str()))
    }

    /// Render this location relative to the folder `base`.
    ///
    /// Locations in another repository come back absolute. Entries under the
    /// connections folder always render root-relative (`/Connections/...`).
    pub fn make_relative(&self, base: &Location) -> String {
        self.make_relative_with(base, |name| name == CONNECTIONS_FOLDER)
    }

    /// Like [`Location::make_relative`], with a custom connections-folder predicate.
    pub fn make_relative_with(
        &self,
        base: &Location,
        is_connections: impl Fn(&str) -> bool,
    ) -> String {
        if self.repository != base.repository {
            return self.to_absolute_string();
        }
        if self.is_in_connections_folder_with(is_connections) {
            return self.path();
        }

        let common = self
            .components
            .iter()
            .zip(&base.components)
            .take_while(|(a, b)| a == b)
            .count();

        let ups = base.components.len() - common;
        let relative = std::iter::repeat_n(PARENT_TOKEN, ups)
            .chain(self.components[common..].iter().map(CompactString::as_str))
            .join("/");

        if relative.is_empty() {
            CURRENT_TOKEN.to_string()
        } else {
            relative
        }
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.repository == other.repository
            && self.components == other.components
            && self.location_type == other.location_type
            && self.expected_kind == other.expected_kind
    }
}

impl Eq for Location {}

impl Hash for Location {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.repository.hash(state);
        self.components.hash(state);
        self.location_type.hash(state);
        self.expected_kind.hash(state);
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_absolute_string())
    }
}

impl FromStr for Location {
    type Err = RepositoryError;

    fn from_str(s: &str) -> Result<Self> {
        Location::parse(s)
    }
}

/// Unvalidated wire form of a [`Location`].
#[derive(Deserialize)]
struct RawLocation {
    repository: String,
    #[serde(default)]
    components: Vec<String>,
    #[serde(default)]
    location_type: LocationType,
    #[serde(default)]
    expected_kind: DataKind,
    #[serde(default)]
    strict_on_duplicate: bool,
}

impl TryFrom<RawLocation> for Location {
    type Error = RepositoryError;

    fn try_from(raw: RawLocation) -> Result<Self> {
        LocationBuilder::new()
            .with_location_type(raw.location_type)
            .with_expected_kind(raw.expected_kind)
            .with_strict_on_duplicate(raw.strict_on_duplicate)
            .build_from_components(&raw.repository, &raw.components)
    }
}

/// Builder for [`Location`] values.
///
/// The type, expected kind and strictness set on the builder apply to every
/// location it builds. Requesting a concrete data kind forces the type to
/// [`LocationType::DataEntry`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LocationBuilder {
    location_type: LocationType,
    expected_kind: DataKind,
    strict_on_duplicate: bool,
}

impl LocationBuilder {
    /// Create a builder producing untyped locations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the location type.
    pub fn with_location_type(mut self, location_type: LocationType) -> Self {
        self.location_type = location_type;
        self
    }

    /// Set the expected data kind. Anything but `Any` makes the location a data entry.
    pub fn with_expected_kind(mut self, kind: DataKind) -> Self {
        self.expected_kind = kind;
        self
    }

    /// Fail resolution on ambiguous same-named data entries.
    pub fn with_strict_on_duplicate(mut self, strict: bool) -> Self {
        self.strict_on_duplicate = strict;
        self
    }

    /// Build from `//<repository>/<path>`.
    pub fn build_from_absolute(&self, text: &str) -> Result<Location> {
        let rest = text.strip_prefix(REPOSITORY_PREFIX).ok_or_else(|| {
            RepositoryError::malformed(text, format!("must start with '{REPOSITORY_PREFIX}'"))
        })?;
        let (repository, path) = rest.split_once(SEPARATOR).ok_or_else(|| {
            RepositoryError::malformed(text, "missing path after repository name")
        })?;
        if repository.is_empty() {
            return Err(RepositoryError::malformed(text, "empty repository name"));
        }

        let mut components = Vec::new();
        push_tokens(&mut components, path);
        Ok(self.finish(repository.into(), components))
    }

    /// Build from text relative to `parent`.
    ///
    /// Absolute text replaces the parent entirely; root-relative text keeps only the
    /// parent's repository. Excess `..` tokens stop at the root.
    pub fn build_from_parent(&self, parent: &Location, child: &str) -> Result<Location> {
        if child.starts_with(REPOSITORY_PREFIX) {
            return self.build_from_absolute(child);
        }

        let mut components = if child.starts_with(SEPARATOR) {
            Vec::new()
        } else {
            parent.components.clone()
        };
        push_tokens(&mut components, child);
        Ok(self.finish(parent.repository.clone(), components))
    }

    /// Build from a repository name and already-split segments.
    pub fn build_from_components<S: AsRef<str>>(
        &self,
        repository: &str,
        components: &[S],
    ) -> Result<Location> {
        if repository.is_empty() {
            return Err(RepositoryError::malformed(
                repository,
                "repository name must not be empty",
            ));
        }

        let mut segments = Vec::with_capacity(components.len());
        for component in components {
            let component = component.as_ref();
            if component.is_empty() {
                return Err(RepositoryError::malformed(
                    format!("{REPOSITORY_PREFIX}{repository}"),
                    "path components must not be empty",
                ));
            }
            if component.contains(SEPARATOR) {
                return Err(RepositoryError::malformed(
                    format!("{REPOSITORY_PREFIX}{repository}"),
                    format!("path component '{component}' contains a separator"),
                ));
            }
            segments.push(CompactString::from(component));
        }

        Ok(self.finish(repository.into(), segments))
    }

    fn finish(&self, repository: CompactString, components: Vec<CompactString>) -> Location {
        let location_type = if self.expected_kind.is_concrete() {
            LocationType::DataEntry
        } else {
            self.location_type
        };

        Location {
            repository,
            components,
            location_type,
            expected_kind: self.expected_kind,
            strict_on_duplicate: self.strict_on_duplicate,
        }
    }
}

/// Apply `/`-separated tokens to a segment stack.
fn push_tokens(components: &mut Vec<CompactString>, text: &str) {
    for token in text.split(SEPARATOR) {
        match token {
            "" | CURRENT_TOKEN => {}
            PARENT_TOKEN => {
                // Popping past the root is ignored.
                components.pop();
            }
            segment => components.push(segment.into()),
        }
    }
}
