//! Idempotent creation of the target branch.

use lakerun_client::{ClientError, VersionedStoreClient};
use tracing::{debug, info, warn};

use crate::error::{StorageError, StorageResult};

/// How [`ensure_branch`] found the branch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BranchOutcome {
    /// The branch was already there.
    Existed,
    /// This call created it.
    Created,
    /// Another writer created it between our lookup and our create.
    CreatedConcurrently,
}

impl BranchOutcome {
    pub fn created(self) -> bool {
        matches!(self, Self::Created)
    }
}

/// Make sure `branch` exists in `repository`, creating it from `base` when
/// missing.
///
/// Lookup and create are two remote calls; losing the race to a concurrent
/// creator counts as success.
pub async fn ensure_branch<C>(
    client: &C,
    repository: &str,
    branch: &str,
    base: &str,
) -> StorageResult<BranchOutcome>
where
    C: VersionedStoreClient + ?Sized,
{
    match client.get_branch(repository, branch).await {
        Ok(existing) => {
            debug!(repository, branch, head = %existing.commit_id, "branch exists");
            return Ok(BranchOutcome::Existed);
        }
        Err(e) if e.is_not_found() => {}
        Err(source) => {
            return Err(StorageError::Branch {
                operation: "lookup",
                repository: repository.to_string(),
                branch: branch.to_string(),
                source,
            })
        }
    }

    match client.create_branch(repository, branch, base).await {
        Ok(created) => {
            info!(repository, branch, base, head = %created.commit_id, "created branch");
            Ok(BranchOutcome::Created)
        }
        Err(e) if e.is_already_exists() => {
            warn!(repository, branch, "branch was created concurrently");
            Ok(BranchOutcome::CreatedConcurrently)
        }
        Err(source @ ClientError::Conflict { .. }) => Err(StorageError::Conflict {
            repository: repository.to_string(),
            branch: branch.to_string(),
            source,
        }),
        Err(source) => Err(StorageError::Branch {
            operation: "create",
            repository: repository.to_string(),
            branch: branch.to_string(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use lakerun_client::{CallKind, InMemoryStoreClient, RecordedCall};

    fn store() -> InMemoryStoreClient {
        InMemoryStoreClient::new().with_repository("example", "main").unwrap()
    }

    #[tokio::test]
    async fn creates_missing_branch_from_base() {
        let client = store();
        let outcome = ensure_branch(&client, "example", "feature", "main").await.unwrap();
        assert_eq!(outcome, BranchOutcome::Created);
        assert!(client.branch_exists("example", "feature"));
        assert_eq!(
            client.calls()[1],
            RecordedCall::CreateBranch {
                repository: "example".into(),
                name: "feature".into(),
                source: "main".into(),
            }
        );
    }

    #[tokio::test]
    async fn second_call_finds_existing_branch() {
        let client = store();
        ensure_branch(&client, "example", "feature", "main").await.unwrap();
        let outcome = ensure_branch(&client, "example", "feature", "main").await.unwrap();
        assert_eq!(outcome, BranchOutcome::Existed);
        assert_eq!(client.branch_count("example"), 2);
        assert_eq!(client.call_count(CallKind::CreateBranch), 1);
    }

    #[tokio::test]
    async fn existing_branch_is_never_recreated() {
        let client = store();
        let outcome = ensure_branch(&client, "example", "main", "main").await.unwrap();
        assert_eq!(outcome, BranchOutcome::Existed);
        assert_eq!(client.call_count(CallKind::CreateBranch), 0);
    }

    #[tokio::test]
    async fn lost_create_race_is_success() {
        let client = store();
        client.fail_next(CallKind::CreateBranch, ClientError::already_exists("feature"));
        let outcome = ensure_branch(&client, "example", "feature", "main").await.unwrap();
        assert_eq!(outcome, BranchOutcome::CreatedConcurrently);
    }

    #[tokio::test]
    async fn other_conflict_is_conflict_error() {
        let client = store();
        client.fail_next(
            CallKind::CreateBranch,
            ClientError::Conflict { message: "ref locked".into() },
        );
        let err = ensure_branch(&client, "example", "feature", "main").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn lookup_failure_is_branch_error() {
        let client = store();
        client.fail_next(CallKind::GetBranch, ClientError::Transport("reset".into()));
        let err = ensure_branch(&client, "example", "feature", "main").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Branch);
        assert!(err.is_retryable());
        assert_eq!(client.call_count(CallKind::CreateBranch), 0);
    }

    #[tokio::test]
    async fn missing_base_is_branch_error() {
        let client = store();
        let err = ensure_branch(&client, "example", "feature", "nope").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Branch);
        assert!(!client.branch_exists("example", "feature"));
    }
}
