//! Scoped client acquisition.
//!
//! A [`Connector`] hands out one client per logical operation. The client is
//! owned by that operation and dropped when it returns, on success and on
//! error alike, which releases its connections.

use crate::credentials::Credentials;
use crate::error::ClientResult;
use crate::http::HttpStoreClient;
use crate::traits::VersionedStoreClient;

/// Source of store clients.
pub trait Connector: Send + Sync {
    type Client: VersionedStoreClient;

    /// Acquire a client for the duration of one operation.
    fn connect(&self) -> ClientResult<Self::Client>;
}

/// Connector producing a fresh [`HttpStoreClient`] per acquisition.
#[derive(Clone, Debug)]
pub struct HttpConnector {
    credentials: Credentials,
    user_agent: String,
}

impl HttpConnector {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            user_agent: concat!("lakerun/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }
}

impl Connector for HttpConnector {
    type Client = HttpStoreClient;

    fn connect(&self) -> ClientResult<HttpStoreClient> {
        HttpStoreClient::new(&self.credentials, &self.user_agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_connector_builds_client() {
        let connector = HttpConnector::new(Credentials::new("http://127.0.0.1:1/api/v1"));
        let client = connector.connect().unwrap();
        assert_eq!(client.base_url().as_str(), "http://127.0.0.1:1/api/v1");
    }

    #[test]
    fn http_connector_rejects_bad_endpoint() {
        let connector = HttpConnector::new(Credentials::new("not a url"));
        assert!(connector.connect().is_err());
    }

    #[test]
    fn default_user_agent_names_crate() {
        let connector = HttpConnector::new(Credentials::default());
        assert!(connector.user_agent.starts_with("lakerun/"));
        let custom = connector.with_user_agent("ci-runner/2");
        assert_eq!(custom.user_agent, "ci-runner/2");
    }
}
