//! Versioned object store client for lakerun.
//!
//! This crate defines the capability surface the storage adapter needs from a
//! versioned object store ([`VersionedStoreClient`]) and provides two
//! implementations of it:
//!
//! - [`HttpStoreClient`]: talks to the store's REST API over HTTP
//! - [`InMemoryStoreClient`]: emulates the store in memory, records every
//!   call and supports fault injection
//!
//! Clients are acquired per operation through a [`Connector`], so that each
//! logical operation owns its connection and releases it on every exit path.
//!
//! The [`operation`] module describes every API endpoint as data, so any
//! endpoint can be called by name through [`HttpStoreClient::invoke`].
//!
//! # Design Rules
//!
//! 1. One method call is one remote round trip. Clients never retry.
//! 2. Missing resources are always [`ClientError::NotFound`]; losing a create
//!    race is always [`ClientError::AlreadyExists`].
//! 3. Credentials are passed in explicitly, never looked up globally.

pub mod connector;
pub mod credentials;
pub mod error;
pub mod http;
pub mod memory;
pub mod operation;
pub mod traits;

pub use connector::{Connector, HttpConnector};
pub use credentials::{Credentials, Secret, DEFAULT_ENDPOINT};
pub use error::{ClientError, ClientResult};
pub use http::HttpStoreClient;
pub use memory::{CallKind, InMemoryStoreClient, RecordedCall};
pub use operation::{Operation, OperationCall, OperationOutput};
pub use traits::VersionedStoreClient;
