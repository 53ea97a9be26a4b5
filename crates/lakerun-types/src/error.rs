use thiserror::Error;

/// Errors produced by name and path validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid repository name: {name}: {reason}")]
    InvalidRepositoryName { name: String, reason: String },

    #[error("invalid branch name: {name}: {reason}")]
    InvalidBranchName { name: String, reason: String },

    #[error("invalid object path: {path:?}: {reason}")]
    InvalidObjectPath { path: String, reason: String },
}
