//! The result storage adapter.
//!
//! [`ResultStorage`] binds a [`StorageConfig`] to a [`Connector`] and the
//! provenance collaborators. Each public operation acquires its own client
//! and drops it before returning.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use lakerun_client::{Connector, HttpConnector};
use lakerun_types::{
    branch_name_from_source, validate_object_path, CommitRecord, Metadata, ObjectStats,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::branch::{self, BranchOutcome};
use crate::codec::Codec;
use crate::commit::{CommitPolicy, CommitRecorder, AUTOMATED_COMMIT_MESSAGE};
use crate::config::StorageConfig;
use crate::error::{StorageError, StorageResult};
use crate::object;
use crate::provenance::{NoRunContext, RunContextProvider, SourceRevisionProvider};

/// One artifact to persist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteRequest {
    /// Object path within the branch.
    pub key: String,
    pub payload: Bytes,
    /// Caller metadata for the commit, if one follows.
    pub run_metadata: Metadata,
}

impl WriteRequest {
    pub fn new(key: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            payload: payload.into(),
            run_metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.run_metadata = metadata;
        self
    }

    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.run_metadata.insert(key.into(), value.into());
        self
    }
}

/// Stages a write passes through, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WriteStage {
    Start,
    BranchChecked,
    BranchEnsured,
    ObjectWritten,
    CommitSkipped,
    CommitRecorded,
    Done,
}

impl fmt::Display for WriteStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::BranchChecked => "branch-checked",
            Self::BranchEnsured => "branch-ensured",
            Self::ObjectWritten => "object-written",
            Self::CommitSkipped => "commit-skipped",
            Self::CommitRecorded => "commit-recorded",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful [`ResultStorage::write`].
#[derive(Clone, Debug)]
pub struct WriteReport {
    pub stats: ObjectStats,
    pub branch: BranchOutcome,
    /// The provenance commit, when `commit_on_write` is set.
    pub commit: Option<CommitRecord>,
    pub stages: Vec<WriteStage>,
}

impl WriteReport {
    pub fn committed(&self) -> bool {
        self.commit.is_some()
    }
}

/// Persists task results as objects on a versioned-store branch.
///
/// Holds no per-call state, so one instance can serve concurrent operations.
pub struct ResultStorage<C: Connector> {
    config: StorageConfig,
    connector: C,
    run_context: Arc<dyn RunContextProvider>,
    source: Option<Arc<dyn SourceRevisionProvider>>,
}

impl<C: Connector> fmt::Debug for ResultStorage<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultStorage")
            .field("config", &self.config)
            .field("has_source_provider", &self.source.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`ResultStorage`]. Validation happens in [`build`](Self::build).
pub struct ResultStorageBuilder<C: Connector> {
    config: StorageConfig,
    connector: C,
    run_context: Arc<dyn RunContextProvider>,
    source: Option<Arc<dyn SourceRevisionProvider>>,
}

impl<C: Connector> ResultStorageBuilder<C> {
    pub fn run_context(mut self, provider: impl RunContextProvider + 'static) -> Self {
        self.run_context = Arc::new(provider);
        self
    }

    pub fn source_provider(mut self, provider: impl SourceRevisionProvider + 'static) -> Self {
        self.source = Some(Arc::new(provider));
        self
    }

    /// Fill in the target branch from the source checkout when
    /// `branch_from_source` is set and no branch is configured.
    ///
    /// The checked-out branch is mapped onto a valid store branch name; a
    /// detached head targets the base branch.
    pub async fn resolve_source_branch(mut self) -> StorageResult<Self> {
        if !self.config.needs_source_branch() {
            return Ok(self);
        }
        let source = self.source.as_ref().ok_or_else(|| {
            StorageError::Configuration("branch_from_source needs a source revision provider".into())
        })?;
        let state = source.source_state().await?;
        let branch = state
            .branch
            .as_deref()
            .and_then(branch_name_from_source)
            .unwrap_or_else(|| self.config.base_branch.clone());
        info!(
            repository = %self.config.repository,
            source_branch = state.branch.as_deref().unwrap_or("-"),
            branch = %branch,
            "target branch taken from source checkout"
        );
        self.config.branch = Some(branch);
        Ok(self)
    }

    pub fn build(self) -> StorageResult<ResultStorage<C>> {
        if self.config.needs_source_branch() {
            return Err(StorageError::Configuration(
                "branch_from_source is set but the source branch was not resolved".into(),
            ));
        }
        self.config.validate()?;
        let policy = policy_of(&self.config);
        if policy.needs_source() && self.source.is_none() {
            return Err(StorageError::Configuration(
                "mirror_source_revision and strict_clean_source need a source revision provider"
                    .into(),
            ));
        }
        Ok(ResultStorage {
            config: self.config,
            connector: self.connector,
            run_context: self.run_context,
            source: self.source,
        })
    }
}

fn policy_of(config: &StorageConfig) -> CommitPolicy {
    CommitPolicy {
        mirror_source_revision: config.mirror_source_revision,
        strict_clean_source: config.strict_clean_source,
    }
}

impl ResultStorage<HttpConnector> {
    /// Builder talking HTTP to the endpoint in `config.connection`.
    pub fn http(config: StorageConfig) -> ResultStorageBuilder<HttpConnector> {
        let connector = HttpConnector::new(config.connection.clone());
        Self::builder(config, connector)
    }
}

impl<C: Connector> ResultStorage<C> {
    pub fn builder(config: StorageConfig, connector: C) -> ResultStorageBuilder<C> {
        ResultStorageBuilder {
            config,
            connector,
            run_context: Arc::new(NoRunContext),
            source: None,
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    fn recorder(&self) -> CommitRecorder<'_> {
        let recorder = CommitRecorder::new(policy_of(&self.config), self.run_context.as_ref());
        match &self.source {
            Some(source) => recorder.with_source(source.as_ref()),
            None => recorder,
        }
    }

    /// Make sure the target branch exists, creating it from the base branch.
    pub async fn ensure_branch(&self) -> StorageResult<BranchOutcome> {
        let repository = self.config.repository.as_str();
        let branch = self.config.target_branch()?;
        let client = self.connector.connect().map_err(|source| StorageError::Branch {
            operation: "connect",
            repository: repository.to_string(),
            branch: branch.to_string(),
            source,
        })?;
        branch::ensure_branch(&client, repository, branch, &self.config.base_branch).await
    }

    /// Persist one artifact on the target branch, committing afterwards when
    /// `commit_on_write` is set.
    ///
    /// A failure after the object is written (a dirty source checkout or a
    /// failed commit) leaves the object staged on the branch.
    pub async fn write(&self, request: WriteRequest) -> StorageResult<WriteReport> {
        let repository = self.config.repository.as_str();
        let branch = self.config.target_branch()?;
        validate_object_path(&request.key).map_err(StorageError::InvalidKey)?;

        let client = self.connector.connect().map_err(|source| StorageError::Write {
            repository: repository.to_string(),
            branch: branch.to_string(),
            key: request.key.clone(),
            source,
        })?;

        let mut stages = vec![WriteStage::Start];
        let mut advance = |stage: WriteStage| {
            debug!(repository, branch, key = %request.key, %stage, "write stage");
            stages.push(stage);
        };

        let outcome =
            branch::ensure_branch(&client, repository, branch, &self.config.base_branch).await?;
        advance(WriteStage::BranchChecked);
        advance(WriteStage::BranchEnsured);

        let payload = request.payload.clone();
        let stats = object::write_object(&client, repository, branch, &request.key, payload).await?;
        advance(WriteStage::ObjectWritten);

        let commit = if self.config.commit_on_write {
            let record = self
                .recorder()
                .record(
                    &client,
                    repository,
                    branch,
                    AUTOMATED_COMMIT_MESSAGE,
                    &request.run_metadata,
                )
                .await
                .map_err(|e| e.after_write(&request.key))?;
            advance(WriteStage::CommitRecorded);
            Some(record)
        } else {
            advance(WriteStage::CommitSkipped);
            None
        };
        advance(WriteStage::Done);

        info!(
            repository,
            branch,
            key = %request.key,
            size = stats.size_bytes,
            commit = commit.as_ref().map(|c| c.id.as_str()).unwrap_or("-"),
            "stored result"
        );
        Ok(WriteReport {
            stats,
            branch: outcome,
            commit,
            stages,
        })
    }

    /// Serialize `value` with `codec` and [`write`](Self::write) it.
    pub async fn write_value<T>(
        &self,
        key: &str,
        value: &T,
        codec: Codec,
        run_metadata: Metadata,
    ) -> StorageResult<WriteReport>
    where
        T: Serialize + ?Sized,
    {
        let payload = codec.encode(key, value)?;
        self.write(WriteRequest::new(key, payload).with_metadata(run_metadata))
            .await
    }

    /// Read `key` from the target branch.
    pub async fn read(&self, key: &str) -> StorageResult<Bytes> {
        let branch = self.config.target_branch()?.to_string();
        self.read_at(&branch, key).await
    }

    /// Read `key` as of `reference`, a branch name or commit id.
    pub async fn read_at(&self, reference: &str, key: &str) -> StorageResult<Bytes> {
        let repository = self.config.repository.as_str();
        let client = self.connector.connect().map_err(|source| StorageError::Read {
            repository: repository.to_string(),
            reference: reference.to_string(),
            key: key.to_string(),
            source,
        })?;
        object::read_object(&client, repository, reference, key).await
    }

    /// [`read`](Self::read) `key` and decode it with `codec`.
    pub async fn read_value<T>(&self, key: &str, codec: Codec) -> StorageResult<T>
    where
        T: DeserializeOwned,
    {
        let payload = self.read(key).await?;
        codec.decode(key, &payload)
    }

    /// Commit whatever is staged on the target branch.
    pub async fn commit_changes(&self, run_metadata: &Metadata) -> StorageResult<CommitRecord> {
        let repository = self.config.repository.as_str();
        let branch = self.config.target_branch()?;
        let client = self.connector.connect().map_err(|source| StorageError::Commit {
            repository: repository.to_string(),
            branch: branch.to_string(),
            key: None,
            source,
        })?;
        self.recorder()
            .record(&client, repository, branch, AUTOMATED_COMMIT_MESSAGE, run_metadata)
            .await
    }
}
