//! Provenance commits on the target branch.

use chrono::Utc;
use lakerun_client::VersionedStoreClient;
use lakerun_types::{CommitRecord, CommitRequest, Metadata, RUN_ID_KEY, SOURCE_REVISION_KEY};
use tracing::{info, warn};

use crate::error::{StorageError, StorageResult};
use crate::provenance::{RunContextProvider, SourceRevisionProvider, SourceState};

/// Message of every commit the adapter records.
pub const AUTOMATED_COMMIT_MESSAGE: &str = "automated commit";

/// Which source-control checks apply to a commit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommitPolicy {
    pub mirror_source_revision: bool,
    pub strict_clean_source: bool,
}

impl CommitPolicy {
    /// Whether the source checkout has to be inspected at all.
    pub fn needs_source(self) -> bool {
        self.mirror_source_revision || self.strict_clean_source
    }
}

/// Build the metadata attached to a commit.
///
/// Starts from the caller's entries. With a mirrored source state its
/// revision is recorded under [`SOURCE_REVISION_KEY`]; otherwise the run id,
/// when there is one, goes under [`RUN_ID_KEY`]. Adapter-supplied entries
/// overwrite caller entries with the same key.
pub fn assemble_metadata(
    run_metadata: &Metadata,
    mirrored: Option<&SourceState>,
    run_id: Option<String>,
) -> Metadata {
    let mut metadata = run_metadata.clone();
    match (mirrored, run_id) {
        (Some(state), _) => {
            metadata.insert(SOURCE_REVISION_KEY.to_string(), state.revision.clone());
        }
        (None, Some(run_id)) => {
            metadata.insert(RUN_ID_KEY.to_string(), run_id);
        }
        (None, None) => {}
    }
    metadata
}

/// Records commits under a [`CommitPolicy`], consulting the run context and
/// the source checkout as needed.
pub struct CommitRecorder<'a> {
    policy: CommitPolicy,
    run_context: &'a dyn RunContextProvider,
    source: Option<&'a dyn SourceRevisionProvider>,
}

impl<'a> CommitRecorder<'a> {
    pub fn new(policy: CommitPolicy, run_context: &'a dyn RunContextProvider) -> Self {
        Self {
            policy,
            run_context,
            source: None,
        }
    }

    pub fn with_source(mut self, source: &'a dyn SourceRevisionProvider) -> Self {
        self.source = Some(source);
        self
    }

    /// Commit the staged changes of `branch`.
    ///
    /// The source checkout is inspected once, before any remote call. A
    /// dirty checkout under the strict policy aborts without committing.
    pub async fn record<C>(
        &self,
        client: &C,
        repository: &str,
        branch: &str,
        message: &str,
        run_metadata: &Metadata,
    ) -> StorageResult<CommitRecord>
    where
        C: VersionedStoreClient + ?Sized,
    {
        if branch.is_empty() {
            return Err(StorageError::Configuration(
                "cannot commit without a target branch".into(),
            ));
        }

        let state = match (self.policy.needs_source(), self.source) {
            (false, _) => None,
            (true, Some(source)) => Some(source.source_state().await?),
            (true, None) => {
                return Err(StorageError::Configuration(
                    "source revision checks need a source revision provider".into(),
                ))
            }
        };
        if let Some(state) = &state {
            if self.policy.strict_clean_source && state.is_dirty {
                warn!(repository, branch, revision = %state.revision, "source checkout is dirty");
                return Err(StorageError::DirtySource {
                    revision: state.revision.clone(),
                });
            }
        }

        let mirrored = state.as_ref().filter(|_| self.policy.mirror_source_revision);
        let metadata = assemble_metadata(run_metadata, mirrored, self.run_context.run_id());
        let request = CommitRequest::new(message)
            .with_metadata(metadata)
            .with_date(Utc::now().timestamp());

        let record = client
            .commit(repository, branch, &request)
            .await
            .map_err(|source| StorageError::Commit {
                repository: repository.to_string(),
                branch: branch.to_string(),
                key: None,
                source,
            })?;
        info!(
            repository,
            branch,
            commit = %record.id,
            entries = record.metadata.len(),
            "recorded commit"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::provenance::{NoRunContext, StaticRunContext, StaticSource};
    use bytes::Bytes;
    use lakerun_client::{CallKind, InMemoryStoreClient, RecordedCall};

    fn store() -> InMemoryStoreClient {
        InMemoryStoreClient::new().with_repository("example", "main").unwrap()
    }

    fn meta(pairs: &[(&str, &str)]) -> Metadata {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn metadata_without_context_is_callers_map() {
        assert!(assemble_metadata(&Metadata::new(), None, None).is_empty());
        let caller = meta(&[("stage", "nightly")]);
        assert_eq!(assemble_metadata(&caller, None, None), caller);
    }

    #[test]
    fn run_id_is_added_and_wins() {
        let caller = meta(&[("run_id", "caller"), ("stage", "nightly")]);
        let out = assemble_metadata(&caller, None, Some("run-42".into()));
        assert_eq!(out, meta(&[("run_id", "run-42"), ("stage", "nightly")]));
    }

    #[test]
    fn mirrored_revision_replaces_run_id() {
        let caller = meta(&[("source_revision", "mine")]);
        let state = SourceState::clean("abc123");
        let out = assemble_metadata(&caller, Some(&state), Some("run-42".into()));
        assert_eq!(out, meta(&[("source_revision", "abc123")]));
    }

    #[test]
    fn policy_needs_source() {
        assert!(!CommitPolicy::default().needs_source());
        let strict = CommitPolicy {
            strict_clean_source: true,
            ..CommitPolicy::default()
        };
        assert!(strict.needs_source());
    }

    #[tokio::test]
    async fn records_commit_with_run_id() {
        let client = store();
        client.put_object("example", "main", "k", Bytes::from_static(b"v")).await.unwrap();
        let run = StaticRunContext::new("run-42");
        let recorder = CommitRecorder::new(CommitPolicy::default(), &run);

        let record = recorder
            .record(&client, "example", "main", AUTOMATED_COMMIT_MESSAGE, &Metadata::new())
            .await
            .unwrap();
        assert_eq!(record.message, "automated commit");
        assert_eq!(record.metadata, meta(&[("run_id", "run-42")]));
        assert!(record.timestamp > 0);
        assert_eq!(client.log("example", "main").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dirty_source_blocks_commit() {
        let client = store();
        let source = StaticSource::new(SourceState::dirty("abc123"));
        let policy = CommitPolicy {
            strict_clean_source: true,
            ..CommitPolicy::default()
        };
        let recorder = CommitRecorder::new(policy, &NoRunContext).with_source(&source);

        let err = recorder
            .record(&client, "example", "main", AUTOMATED_COMMIT_MESSAGE, &Metadata::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DirtySource);
        assert_eq!(client.call_count(CallKind::Commit), 0);
    }

    #[tokio::test]
    async fn clean_source_is_mirrored() {
        let client = store();
        let source = StaticSource::new(SourceState::clean("abc123"));
        let policy = CommitPolicy {
            mirror_source_revision: true,
            strict_clean_source: true,
        };
        let recorder = CommitRecorder::new(policy, &NoRunContext).with_source(&source);

        let caller = meta(&[("source_revision", "stale")]);
        recorder
            .record(&client, "example", "main", AUTOMATED_COMMIT_MESSAGE, &caller)
            .await
            .unwrap();
        let RecordedCall::Commit { metadata, .. } = &client.calls()[0] else {
            panic!("expected a commit call");
        };
        assert_eq!(metadata.get("source_revision").map(String::as_str), Some("abc123"));
    }

    #[tokio::test]
    async fn source_checks_without_provider_are_configuration_errors() {
        let client = store();
        let policy = CommitPolicy {
            mirror_source_revision: true,
            ..CommitPolicy::default()
        };
        let recorder = CommitRecorder::new(policy, &NoRunContext);
        let err = recorder
            .record(&client, "example", "main", AUTOMATED_COMMIT_MESSAGE, &Metadata::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn empty_branch_is_rejected_before_any_call() {
        let client = store();
        let recorder = CommitRecorder::new(CommitPolicy::default(), &NoRunContext);
        let err = recorder
            .record(&client, "example", "", AUTOMATED_COMMIT_MESSAGE, &Metadata::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn remote_failure_is_commit_error() {
        let client = store();
        let recorder = CommitRecorder::new(CommitPolicy::default(), &NoRunContext);
        let err = recorder
            .record(&client, "example", "missing", AUTOMATED_COMMIT_MESSAGE, &Metadata::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Commit);
    }
}
