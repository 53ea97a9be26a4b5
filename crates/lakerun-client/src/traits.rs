//! The [`VersionedStoreClient`] trait: the capability surface the storage
//! adapter needs from a versioned object store.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use lakerun_types::{BranchRef, CommitRecord, CommitRequest, ObjectStats};

use crate::error::ClientResult;

/// Remote operations of a versioned object store.
///
/// Implementations must be `Send + Sync` so a single client can be shared by
/// concurrent tasks. Every method is a single remote round trip; none of them
/// retry.
///
/// Error contract:
/// - lookups of a missing repository, branch, ref or object return
///   [`ClientError::NotFound`](crate::ClientError::NotFound)
/// - creating a branch that already exists returns
///   [`ClientError::AlreadyExists`](crate::ClientError::AlreadyExists)
#[async_trait]
pub trait VersionedStoreClient: Send + Sync {
    /// Fetch the branch and the commit it points at.
    async fn get_branch(&self, repository: &str, branch: &str) -> ClientResult<BranchRef>;

    /// Create branch `name` from `source` (a branch name or commit id).
    async fn create_branch(
        &self,
        repository: &str,
        name: &str,
        source: &str,
    ) -> ClientResult<BranchRef>;

    /// Upload `content` as the full object at `path` on `branch`, replacing
    /// whatever was there.
    async fn put_object(
        &self,
        repository: &str,
        branch: &str,
        path: &str,
        content: Bytes,
    ) -> ClientResult<ObjectStats>;

    /// Download the object at `path` under `reference` (branch, commit or tag).
    async fn get_object(&self, repository: &str, reference: &str, path: &str)
        -> ClientResult<Bytes>;

    /// Commit everything staged on `branch`.
    async fn commit(
        &self,
        repository: &str,
        branch: &str,
        request: &CommitRequest,
    ) -> ClientResult<CommitRecord>;
}

#[async_trait]
impl<T: VersionedStoreClient + ?Sized> VersionedStoreClient for Arc<T> {
    async fn get_branch(&self, repository: &str, branch: &str) -> ClientResult<BranchRef> {
        (**self).get_branch(repository, branch).await
    }

    async fn create_branch(
        &self,
        repository: &str,
        name: &str,
        source: &str,
    ) -> ClientResult<BranchRef> {
        (**self).create_branch(repository, name, source).await
    }

    async fn put_object(
        &self,
        repository: &str,
        branch: &str,
        path: &str,
        content: Bytes,
    ) -> ClientResult<ObjectStats> {
        (**self).put_object(repository, branch, path, content).await
    }

    async fn get_object(
        &self,
        repository: &str,
        reference: &str,
        path: &str,
    ) -> ClientResult<Bytes> {
        (**self).get_object(repository, reference, path).await
    }

    async fn commit(
        &self,
        repository: &str,
        branch: &str,
        request: &CommitRequest,
    ) -> ClientResult<CommitRecord> {
        (**self).commit(repository, branch, request).await
    }
}
