//! Error types for store client operations.

use thiserror::Error;

/// Errors returned by a [`VersionedStoreClient`](crate::VersionedStoreClient).
#[derive(Debug, Error)]
pub enum ClientError {
    /// The repository, branch, ref or object does not exist.
    #[error("not found: {resource}")]
    NotFound { resource: String },

    /// The resource being created already exists.
    #[error("already exists: {resource}")]
    AlreadyExists { resource: String },

    /// The store rejected the request because of conflicting state.
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// Credentials were missing, wrong, or lacked permission.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Any other non-success response from the store.
    #[error("store returned status {status}: {message}")]
    Api { status: u16, message: String },

    /// The request never produced a response (connection refused, reset...).
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The request could not be built from the supplied arguments.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The client's own state is broken. Retrying against it cannot help.
    #[error("client state corrupted: {0}")]
    Internal(String),
}

impl ClientError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn already_exists(resource: impl Into<String>) -> Self {
        Self::AlreadyExists {
            resource: resource.into(),
        }
    }

    /// Returns `true` for the "does not exist" family of failures.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if a create call lost a race to an identical create.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns `true` if retrying the same request may succeed.
    ///
    /// Transport failures, timeouts and 5xx/429 responses are transient.
    /// Everything the store answered deliberately is not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Result alias for store client operations.
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_helpers() {
        assert!(ClientError::not_found("branch x").is_not_found());
        assert!(ClientError::already_exists("branch x").is_already_exists());
        assert!(!ClientError::Conflict { message: "m".into() }.is_already_exists());
    }

    #[test]
    fn transient_failures() {
        assert!(ClientError::Transport("reset".into()).is_transient());
        assert!(ClientError::Api { status: 503, message: "busy".into() }.is_transient());
        assert!(ClientError::Api { status: 429, message: "slow down".into() }.is_transient());
        assert!(!ClientError::Api { status: 400, message: "bad".into() }.is_transient());
        assert!(!ClientError::not_found("x").is_transient());
        assert!(!ClientError::Unauthorized("no".into()).is_transient());
        assert!(!ClientError::Internal("lock poisoned".into()).is_transient());
    }

    #[test]
    fn display_includes_resource() {
        let err = ClientError::not_found("object out/a.bin on main");
        assert_eq!(err.to_string(), "not found: object out/a.bin on main");
    }
}
