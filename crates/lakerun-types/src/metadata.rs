//! Commit metadata and the provenance keys the storage adapter owns.

use std::collections::BTreeMap;

/// Commit metadata: an open string-to-string mapping.
///
/// A `BTreeMap` keeps serialization and log output deterministic.
pub type Metadata = BTreeMap<String, String>;

/// Key under which the identifier of the triggering run is recorded.
pub const RUN_ID_KEY: &str = "run_id";

/// Key under which the source-control revision of the producing code is
/// recorded.
pub const SOURCE_REVISION_KEY: &str = "source_revision";

/// Parse a `key=value` pair as used on command lines and in operation
/// arguments. The value may itself contain `=`.
pub fn parse_pair(raw: &str) -> Option<(String, String)> {
    let (key, value) = raw.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_pair() {
        assert_eq!(
            parse_pair("run_id=abc"),
            Some(("run_id".to_string(), "abc".to_string()))
        );
    }

    #[test]
    fn value_keeps_extra_equals() {
        assert_eq!(
            parse_pair("query=a=b"),
            Some(("query".to_string(), "a=b".to_string()))
        );
    }

    #[test]
    fn empty_value_is_allowed() {
        assert_eq!(parse_pair("k="), Some(("k".to_string(), String::new())));
    }

    #[test]
    fn rejects_missing_separator_or_key() {
        assert_eq!(parse_pair("novalue"), None);
        assert_eq!(parse_pair("=value"), None);
    }
}
