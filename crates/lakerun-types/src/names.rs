//! Repository, branch and object-path validation.
//!
//! Repository names: 3 to 63 characters of lowercase ASCII letters, digits
//! and `-`, starting with a letter or digit.
//!
//! Branch names:
//! - Must be non-empty
//! - First character is an ASCII letter, digit or `_`
//! - Remaining characters are ASCII letters, digits, `_` or `-`
//!
//! Object paths (artifact keys):
//! - Must be non-empty and forward-slash separated
//! - Must not start or end with `/`
//! - Segments must be non-empty and must not be `.` or `..`
//! - Must not contain `\` or control characters

use crate::error::TypeError;

const REPOSITORY_MIN_LEN: usize = 3;
const REPOSITORY_MAX_LEN: usize = 63;

/// Validate a repository name, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use lakerun_types::names::validate_repository_name;
///
/// assert!(validate_repository_name("example").is_ok());
/// assert!(validate_repository_name("Example").is_err());
/// assert!(validate_repository_name("ab").is_err());
/// ```
pub fn validate_repository_name(name: &str) -> Result<(), TypeError> {
    let invalid = |reason: String| TypeError::InvalidRepositoryName {
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("repository name must not be empty".into()));
    }
    if name.len() < REPOSITORY_MIN_LEN || name.len() > REPOSITORY_MAX_LEN {
        return Err(invalid(format!(
            "length must be between {REPOSITORY_MIN_LEN} and {REPOSITORY_MAX_LEN}"
        )));
    }
    if name.starts_with('-') {
        return Err(invalid("must not start with '-'".into()));
    }
    if let Some(ch) = name
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
    {
        return Err(invalid(format!("contains forbidden character: {ch:?}")));
    }
    Ok(())
}

/// Validate a branch name, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use lakerun_types::names::validate_branch_name;
///
/// assert!(validate_branch_name("main").is_ok());
/// assert!(validate_branch_name("feature-auth").is_ok());
/// assert!(validate_branch_name("").is_err());
/// assert!(validate_branch_name("feature/auth").is_err());
/// ```
pub fn validate_branch_name(name: &str) -> Result<(), TypeError> {
    let invalid = |reason: String| TypeError::InvalidBranchName {
        name: name.to_string(),
        reason,
    };

    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(invalid("branch name must not be empty".into()));
    };
    if !(first.is_ascii_alphanumeric() || first == '_') {
        return Err(invalid(format!("must start with a letter, digit or '_': {first:?}")));
    }
    if let Some(ch) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-')) {
        return Err(invalid(format!("contains forbidden character: {ch:?}")));
    }
    Ok(())
}

/// Map a source-control branch name onto a valid store branch name.
///
/// Forbidden characters become `-` and a leading `-` becomes `_`. Returns
/// `None` for an empty name.
///
/// # Examples
///
/// ```
/// use lakerun_types::names::branch_name_from_source;
///
/// assert_eq!(branch_name_from_source("feature/auth").as_deref(), Some("feature-auth"));
/// assert_eq!(branch_name_from_source("main").as_deref(), Some("main"));
/// assert_eq!(branch_name_from_source(""), None);
/// ```
pub fn branch_name_from_source(name: &str) -> Option<String> {
    let mut mapped: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '-' })
        .collect();
    if mapped.starts_with('-') {
        mapped.replace_range(..1, "_");
    }
    (!mapped.is_empty()).then_some(mapped)
}

/// Validate an object path (artifact key), returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use lakerun_types::names::validate_object_path;
///
/// assert!(validate_object_path("out/result.parquet").is_ok());
/// assert!(validate_object_path("/abs").is_err());
/// assert!(validate_object_path("a//b").is_err());
/// ```
pub fn validate_object_path(path: &str) -> Result<(), TypeError> {
    let invalid = |reason: String| TypeError::InvalidObjectPath {
        path: path.to_string(),
        reason,
    };

    if path.is_empty() {
        return Err(invalid("path must not be empty".into()));
    }
    if path.starts_with('/') || path.ends_with('/') {
        return Err(invalid("must not start or end with '/'".into()));
    }
    if path.contains('\\') {
        return Err(invalid("segments are separated by '/', not '\\'".into()));
    }
    if path.chars().any(char::is_control) {
        return Err(invalid("must not contain control characters".into()));
    }
    for segment in path.split('/') {
        match segment {
            "" => return Err(invalid("segments must not be empty".into())),
            "." | ".." => return Err(invalid(format!("relative segment {segment:?}"))),
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn valid_repository_names() {
        assert!(validate_repository_name("example").is_ok());
        assert!(validate_repository_name("lake-01").is_ok());
        assert!(validate_repository_name("abc").is_ok());
    }

    #[test]
    fn reject_bad_repository_names() {
        assert!(validate_repository_name("").is_err());
        assert!(validate_repository_name("ab").is_err());
        assert!(validate_repository_name("-lead").is_err());
        assert!(validate_repository_name("Upper").is_err());
        assert!(validate_repository_name("has_underscore").is_err());
        assert!(validate_repository_name(&"a".repeat(64)).is_err());
    }

    #[test]
    fn valid_branch_names() {
        assert!(validate_branch_name("main").is_ok());
        assert!(validate_branch_name("feature").is_ok());
        assert!(validate_branch_name("_scratch").is_ok());
        assert!(validate_branch_name("run-2024-01-01").is_ok());
    }

    #[test]
    fn reject_empty_branch() {
        let err = validate_branch_name("").unwrap_err();
        assert!(matches!(err, TypeError::InvalidBranchName { .. }));
    }

    #[test]
    fn reject_branch_forbidden_chars() {
        assert!(validate_branch_name("-leading").is_err());
        assert!(validate_branch_name("has space").is_err());
        assert!(validate_branch_name("a/b").is_err());
        assert!(validate_branch_name("a.b").is_err());
        assert!(validate_branch_name("a~b").is_err());
    }

    #[test]
    fn source_branch_names_are_mapped() {
        assert_eq!(branch_name_from_source("users/jo/fix.1").as_deref(), Some("users-jo-fix-1"));
        assert_eq!(branch_name_from_source("-odd").as_deref(), Some("_odd"));
        assert_eq!(branch_name_from_source("run-7").as_deref(), Some("run-7"));
    }

    #[test]
    fn valid_object_paths() {
        assert!(validate_object_path("a").is_ok());
        assert!(validate_object_path("a/b.bin").is_ok());
        assert!(validate_object_path("out/result.parquet").is_ok());
        assert!(validate_object_path("deep/nested/.hidden").is_ok());
    }

    #[test]
    fn reject_bad_object_paths() {
        assert!(validate_object_path("").is_err());
        assert!(validate_object_path("/abs").is_err());
        assert!(validate_object_path("dir/").is_err());
        assert!(validate_object_path("a//b").is_err());
        assert!(validate_object_path("a/../b").is_err());
        assert!(validate_object_path("./a").is_err());
        assert!(validate_object_path("win\\path").is_err());
        assert!(validate_object_path("tab\there").is_err());
    }

    proptest! {
        #[test]
        fn joined_plain_segments_are_valid(segments in prop::collection::vec("[a-z0-9_]{1,8}", 1..6)) {
            let path = segments.join("/");
            prop_assert!(validate_object_path(&path).is_ok());
        }

        #[test]
        fn leading_slash_always_rejected(rest in "[a-z0-9/]{0,16}") {
            let path = format!("/{rest}");
            prop_assert!(validate_object_path(&path).is_err());
        }

        #[test]
        fn mapped_source_branches_are_valid(name in "[ -~]{1,40}") {
            let mapped = branch_name_from_source(&name).unwrap();
            prop_assert!(validate_branch_name(&mapped).is_ok());
        }

        #[test]
        fn generated_branch_names_are_valid(name in "[a-zA-Z0-9_][a-zA-Z0-9_-]{0,30}") {
            prop_assert!(validate_branch_name(&name).is_ok());
        }
    }
}
