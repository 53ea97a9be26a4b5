//! Connection parameters for the HTTP store client.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000/api/v1";

/// A secret string that never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The secret value. Only the HTTP layer should need this.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Endpoint and access keys for a versioned store.
///
/// Always passed explicitly to a connector; nothing in lakerun reads
/// credentials from process-wide state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// Base URL of the API, including the version prefix.
    pub endpoint: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<Secret>,
    /// Per-request timeout. `None` leaves requests unbounded so the caller's
    /// own deadline applies.
    pub request_timeout_secs: Option<u64>,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            access_key_id: None,
            secret_access_key: None,
            request_timeout_secs: None,
        }
    }
}

impl Credentials {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    pub fn with_keys(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.access_key_id = Some(access_key_id.into());
        self.secret_access_key = Some(Secret::new(secret_access_key));
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = Some(secs);
        self
    }
}
