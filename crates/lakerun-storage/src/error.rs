//! Error taxonomy of the result storage adapter.
//!
//! Every failure carries a distinct [`ErrorKind`] so a caller can decide
//! whether to retry (transient transport failures), fix its setup
//! (configuration, dirty source checkout) or give up (missing object).

use std::fmt;

use lakerun_client::ClientError;
use lakerun_types::TypeError;
use thiserror::Error;

/// Coarse classification of a [`StorageError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    InvalidKey,
    NotFound,
    Conflict,
    Branch,
    Write,
    Read,
    Commit,
    DirtySource,
    Source,
    Codec,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configuration => "configuration",
            Self::InvalidKey => "invalid-key",
            Self::NotFound => "not-found",
            Self::Conflict => "conflict",
            Self::Branch => "branch",
            Self::Write => "write",
            Self::Read => "read",
            Self::Commit => "commit",
            Self::DirtySource => "dirty-source",
            Self::Source => "source",
            Self::Codec => "codec",
        };
        f.write_str(name)
    }
}

/// Errors from result storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Invalid static configuration. Never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The artifact key is not a valid object path.
    #[error("invalid key: {0}")]
    InvalidKey(TypeError),

    /// The object or ref being read does not exist.
    #[error("not found: {key} at {repository}/{reference}")]
    NotFound {
        repository: String,
        reference: String,
        key: String,
        source: ClientError,
    },

    /// Branch creation hit a conflict other than "already exists".
    #[error("conflict creating branch {branch} in {repository}: {source}")]
    Conflict {
        repository: String,
        branch: String,
        source: ClientError,
    },

    /// Branch lookup or creation failed for any other reason.
    #[error("branch {operation} failed for {branch} in {repository}: {source}")]
    Branch {
        operation: &'static str,
        repository: String,
        branch: String,
        source: ClientError,
    },

    /// Nothing was written.
    #[error("write of {key} to {repository}/{branch} failed: {source}")]
    Write {
        repository: String,
        branch: String,
        key: String,
        source: ClientError,
    },

    #[error("read of {key} at {repository}/{reference} failed: {source}")]
    Read {
        repository: String,
        reference: String,
        key: String,
        source: ClientError,
    },

    /// The commit call failed. On the write path the object under `key` is
    /// already written but not committed.
    #[error("commit on {repository}/{branch} failed{}: {source}", written_note(.key))]
    Commit {
        repository: String,
        branch: String,
        key: Option<String>,
        source: ClientError,
    },

    /// The source checkout producing the data has uncommitted changes.
    #[error("source checkout at {revision} has uncommitted changes; refusing to commit")]
    DirtySource { revision: String },

    /// The source-control state could not be determined.
    #[error("source revision unavailable: {0}")]
    Source(String),

    #[error("codec error for {key}: {reason}")]
    Codec { key: String, reason: String },
}

fn written_note(key: &Option<String>) -> String {
    key.as_deref()
        .map(|key| format!(" after writing {key}"))
        .unwrap_or_default()
}

impl StorageError {
    /// Attach the key of an object that was written before the commit
    /// failed. Other kinds pass through unchanged.
    pub(crate) fn after_write(self, written: &str) -> Self {
        match self {
            Self::Commit {
                repository,
                branch,
                key: None,
                source,
            } => Self::Commit {
                repository,
                branch,
                key: Some(written.to_string()),
                source,
            },
            other => other,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::InvalidKey(_) => ErrorKind::InvalidKey,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Branch { .. } => ErrorKind::Branch,
            Self::Write { .. } => ErrorKind::Write,
            Self::Read { .. } => ErrorKind::Read,
            Self::Commit { .. } => ErrorKind::Commit,
            Self::DirtySource { .. } => ErrorKind::DirtySource,
            Self::Source(_) => ErrorKind::Source,
            Self::Codec { .. } => ErrorKind::Codec,
        }
    }

    /// The store client error underneath, if the failure came from a remote
    /// call.
    pub fn client_error(&self) -> Option<&ClientError> {
        match self {
            Self::NotFound { source, .. }
            | Self::Conflict { source, .. }
            | Self::Branch { source, .. }
            | Self::Write { source, .. }
            | Self::Read { source, .. }
            | Self::Commit { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Returns `true` if repeating the operation unchanged may succeed.
    ///
    /// Only transport-level failures of branch, write, read and commit calls
    /// qualify.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Branch { source, .. }
            | Self::Write { source, .. }
            | Self::Read { source, .. }
            | Self::Commit { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> ClientError {
        ClientError::Transport("connection reset".into())
    }

    #[test]
    fn kinds_are_distinct_for_write_and_commit() {
        let write = StorageError::Write {
            repository: "example".into(),
            branch: "feature".into(),
            key: "k".into(),
            source: transport(),
        };
        let commit = StorageError::Commit {
            repository: "example".into(),
            branch: "feature".into(),
            key: None,
            source: transport(),
        };
        assert_eq!(write.kind(), ErrorKind::Write);
        assert_eq!(commit.kind(), ErrorKind::Commit);
        assert!(write.is_retryable());
        assert!(commit.is_retryable());
    }

    #[test]
    fn fatal_kinds_are_not_retryable() {
        assert!(!StorageError::Configuration("x".into()).is_retryable());
        assert!(!StorageError::DirtySource { revision: "abc".into() }.is_retryable());
        let not_found = StorageError::NotFound {
            repository: "example".into(),
            reference: "main".into(),
            key: "k".into(),
            source: ClientError::not_found("k"),
        };
        assert!(!not_found.is_retryable());
        assert!(not_found.client_error().is_some_and(ClientError::is_not_found));
    }

    #[test]
    fn non_transient_remote_failure_is_not_retryable() {
        let err = StorageError::Read {
            repository: "example".into(),
            reference: "main".into(),
            key: "k".into(),
            source: ClientError::Unauthorized("bad key".into()),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn messages_carry_context() {
        let err = StorageError::Write {
            repository: "example".into(),
            branch: "feature".into(),
            key: "out/result.parquet".into(),
            source: transport(),
        };
        let msg = err.to_string();
        assert!(msg.contains("out/result.parquet"));
        assert!(msg.contains("example/feature"));
        assert_eq!(ErrorKind::DirtySource.to_string(), "dirty-source");
    }

    #[test]
    fn commit_after_write_names_the_written_key() {
        let commit = StorageError::Commit {
            repository: "example".into(),
            branch: "feature".into(),
            key: None,
            source: transport(),
        };
        assert!(!commit.to_string().contains("after writing"));

        let err = commit.after_write("out/result.parquet");
        assert_eq!(err.kind(), ErrorKind::Commit);
        let msg = err.to_string();
        assert!(msg.contains("example/feature"));
        assert!(msg.contains("after writing out/result.parquet"));

        let write = StorageError::Configuration("x".into()).after_write("k");
        assert_eq!(write.kind(), ErrorKind::Configuration);
    }
}
