//! Entry naming rules.

use crate::error::{RepositoryError, Result};

/// Characters that may not appear in entry names.
pub const BLACKLISTED_CHARACTERS: [char; 9] = ['/', '\\', ':', '<', '>', '*', '?', '"', '|'];

/// Names that may not be used for entries.
pub const RESERVED_NAMES: [&str; 1] = [".git"];

/// Validate an entry name for any backend.
pub fn validate_name(name: &str) -> Result<()> {
    let invalid = |reason: String| RepositoryError::InvalidName {
        name: name.to_string(),
        reason,
    };

    if name.trim().is_empty() {
        return Err(invalid("name cannot be empty".into()));
    }

    if let Some(c) = name.chars().find(|c| BLACKLISTED_CHARACTERS.contains(c)) {
        return Err(invalid(format!("name cannot contain '{c}'")));
    }

    if name.chars().any(char::is_control) {
        return Err(invalid("name cannot contain control characters".into()));
    }

    if RESERVED_NAMES.iter().any(|r| r.eq_ignore_ascii_case(name)) {
        return Err(invalid(format!("'{name}' is a reserved name")));
    }

    if name == "." || name == ".." {
        return Err(invalid("'.' and '..' are reserved names".into()));
    }

    if name.starts_with(char::is_whitespace) || name.ends_with(char::is_whitespace) {
        return Err(invalid("name cannot start or end with whitespace".into()));
    }

    Ok(())
}

/// Check a name without producing an error.
pub fn is_valid_name(name: &str) -> bool {
    validate_name(name).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(is_valid_name("etl"));
        assert!(is_valid_name("my data - 2"));
        assert!(is_valid_name(".hidden"));
        assert!(is_valid_name("report.v2"));
    }

    #[test]
    fn test_blacklisted_characters() {
        for c in BLACKLISTED_CHARACTERS {
            let name = format!("a{c}b");
            assert!(!is_valid_name(&name), "{name} should be rejected");
        }
    }

    #[test]
    fn test_reserved_and_empty() {
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("   "));
        assert!(!is_valid_name(".git"));
        assert!(!is_valid_name(".GIT"));
        assert!(!is_valid_name(".."));
        assert!(!is_valid_name(" leading"));
        assert!(!is_valid_name("trailing "));
    }
}
