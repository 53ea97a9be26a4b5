//! In-memory versioned store for tests and embedding.
//!
//! [`InMemoryStoreClient`] emulates the branch, object and commit semantics
//! the storage adapter relies on. Every call is recorded as a
//! [`RecordedCall`] and failures can be injected per call kind, so tests can
//! assert exact remote call sequences.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use lakerun_types::{BranchRef, CommitRecord, CommitRequest, Metadata, ObjectStats};

use crate::connector::Connector;
use crate::error::{ClientError, ClientResult};
use crate::traits::VersionedStoreClient;

/// Kind of a client call, used for counting and fault injection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallKind {
    GetBranch,
    CreateBranch,
    PutObject,
    GetObject,
    Commit,
}

/// A call made against the in-memory store, with its arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordedCall {
    GetBranch {
        repository: String,
        branch: String,
    },
    CreateBranch {
        repository: String,
        name: String,
        source: String,
    },
    PutObject {
        repository: String,
        branch: String,
        path: String,
        size: usize,
    },
    GetObject {
        repository: String,
        reference: String,
        path: String,
    },
    Commit {
        repository: String,
        branch: String,
        message: String,
        metadata: Metadata,
    },
}

impl RecordedCall {
    pub fn kind(&self) -> CallKind {
        match self {
            Self::GetBranch { .. } => CallKind::GetBranch,
            Self::CreateBranch { .. } => CallKind::CreateBranch,
            Self::PutObject { .. } => CallKind::PutObject,
            Self::GetObject { .. } => CallKind::GetObject,
            Self::Commit { .. } => CallKind::Commit,
        }
    }
}

type Tree = BTreeMap<String, Bytes>;

#[derive(Debug)]
struct CommitEntry {
    record: CommitRecord,
    tree: Tree,
}

#[derive(Debug)]
struct BranchEntry {
    head: String,
    /// Committed tree plus staged writes.
    tree: Tree,
}

#[derive(Debug, Default)]
struct RepositoryState {
    branches: HashMap<String, BranchEntry>,
    commits: HashMap<String, CommitEntry>,
}

impl RepositoryState {
    /// Resolve a branch name or commit id to the commit it designates.
    fn resolve_commit(&self, reference: &str) -> Option<&CommitEntry> {
        let id = match self.branches.get(reference) {
            Some(branch) => branch.head.as_str(),
            None => reference,
        };
        self.commits.get(id)
    }
}

/// An in-memory implementation of [`VersionedStoreClient`].
///
/// Branches read their staged state; commit ids read the committed snapshot.
/// New branches start from the source's committed state.
#[derive(Debug, Default)]
pub struct InMemoryStoreClient {
    repositories: RwLock<HashMap<String, RepositoryState>>,
    calls: Mutex<Vec<RecordedCall>>,
    faults: Mutex<HashMap<CallKind, VecDeque<ClientError>>>,
    sessions: AtomicUsize,
}

fn lock_error<T>(_: PoisonError<T>) -> ClientError {
    ClientError::Internal("in-memory store lock poisoned".into())
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

fn commit_id(parent: &str, request: &CommitRequest, timestamp: i64, tree: &Tree) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(parent.as_bytes());
    hasher.update(request.message.as_bytes());
    for (key, value) in &request.metadata {
        hasher.update(key.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
    }
    hasher.update(&timestamp.to_le_bytes());
    for (path, content) in tree {
        hasher.update(path.as_bytes());
        hasher.update(blake3::hash(content).as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

impl InMemoryStoreClient {
    /// Create an empty store with no repositories.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`create_repository`](Self::create_repository).
    pub fn with_repository(self, name: &str, default_branch: &str) -> ClientResult<Self> {
        self.create_repository(name, default_branch)?;
        Ok(self)
    }

    /// Create a repository whose `default_branch` points at an empty initial
    /// commit.
    pub fn create_repository(&self, name: &str, default_branch: &str) -> ClientResult<()> {
        let mut repositories = self.repositories.write().map_err(lock_error)?;
        if repositories.contains_key(name) {
            return Err(ClientError::already_exists(format!("repository {name}")));
        }

        let request = CommitRequest::new("Repository created");
        let tree = Tree::new();
        let id = commit_id("", &request, 0, &tree);
        let record = CommitRecord {
            id: id.clone(),
            parents: Vec::new(),
            committer: String::new(),
            message: request.message,
            metadata: Metadata::new(),
            timestamp: 0,
            meta_range_id: None,
        };

        let mut state = RepositoryState::default();
        state.commits.insert(id.clone(), CommitEntry { record, tree: Tree::new() });
        state.branches.insert(
            default_branch.to_string(),
            BranchEntry { head: id, tree: Tree::new() },
        );
        repositories.insert(name.to_string(), state);
        Ok(())
    }

    /// Make the next call of `kind` fail with `error`. Faults queue up and
    /// are consumed in order.
    pub fn fail_next(&self, kind: CallKind, error: ClientError) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push_back(error);
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of calls of `kind` made so far.
    pub fn call_count(&self, kind: CallKind) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| c.kind() == kind)
            .count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Number of times a client was acquired through [`Connector::connect`].
    pub fn sessions_opened(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    pub fn branch_exists(&self, repository: &str, branch: &str) -> bool {
        self.repositories
            .read()
            .map(|repos| {
                repos
                    .get(repository)
                    .is_some_and(|r| r.branches.contains_key(branch))
            })
            .unwrap_or(false)
    }

    /// Number of branches in `repository`.
    pub fn branch_count(&self, repository: &str) -> usize {
        self.repositories
            .read()
            .map(|repos| repos.get(repository).map_or(0, |r| r.branches.len()))
            .unwrap_or(0)
    }

    /// Commits reachable from `branch`, newest first, excluding the initial
    /// repository commit.
    pub fn log(&self, repository: &str, branch: &str) -> ClientResult<Vec<CommitRecord>> {
        let repositories = self.repositories.read().map_err(lock_error)?;
        let repo = repositories
            .get(repository)
            .ok_or_else(|| ClientError::not_found(format!("repository {repository}")))?;
        let mut next = repo
            .branches
            .get(branch)
            .map(|b| b.head.clone())
            .ok_or_else(|| ClientError::not_found(format!("branch {branch} in {repository}")))?;

        let mut log = Vec::new();
        while let Some(entry) = repo.commits.get(&next) {
            let Some(parent) = entry.record.parents.first() else {
                break;
            };
            log.push(entry.record.clone());
            next = parent.clone();
        }
        Ok(log)
    }

    fn record(&self, call: RecordedCall) -> ClientResult<()> {
        let kind = call.kind();
        self.calls.lock().map_err(lock_error)?.push(call);
        let fault = self
            .faults
            .lock()
            .map_err(lock_error)?
            .get_mut(&kind)
            .and_then(VecDeque::pop_front);
        match fault {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl VersionedStoreClient for InMemoryStoreClient {
    async fn get_branch(&self, repository: &str, branch: &str) -> ClientResult<BranchRef> {
        self.record(RecordedCall::GetBranch {
            repository: repository.into(),
            branch: branch.into(),
        })?;

        let repositories = self.repositories.read().map_err(lock_error)?;
        let repo = repositories
            .get(repository)
            .ok_or_else(|| ClientError::not_found(format!("repository {repository}")))?;
        repo.branches
            .get(branch)
            .map(|b| BranchRef::new(branch, b.head.clone()))
            .ok_or_else(|| ClientError::not_found(format!("branch {branch} in {repository}")))
    }

    async fn create_branch(
        &self,
        repository: &str,
        name: &str,
        source: &str,
    ) -> ClientResult<BranchRef> {
        self.record(RecordedCall::CreateBranch {
            repository: repository.into(),
            name: name.into(),
            source: source.into(),
        })?;

        let mut repositories = self.repositories.write().map_err(lock_error)?;
        let repo = repositories
            .get_mut(repository)
            .ok_or_else(|| ClientError::not_found(format!("repository {repository}")))?;
        if repo.branches.contains_key(name) {
            return Err(ClientError::already_exists(format!("branch {name} in {repository}")));
        }
        let base = repo
            .resolve_commit(source)
            .ok_or_else(|| ClientError::not_found(format!("ref {source} in {repository}")))?;
        let entry = BranchEntry {
            head: base.record.id.clone(),
            tree: base.tree.clone(),
        };
        let branch = BranchRef::new(name, entry.head.clone());
        repo.branches.insert(name.to_string(), entry);
        Ok(branch)
    }

    async fn put_object(
        &self,
        repository: &str,
        branch: &str,
        path: &str,
        content: Bytes,
    ) -> ClientResult<ObjectStats> {
        self.record(RecordedCall::PutObject {
            repository: repository.into(),
            branch: branch.into(),
            path: path.into(),
            size: content.len(),
        })?;

        let mut repositories = self.repositories.write().map_err(lock_error)?;
        let entry = repositories
            .get_mut(repository)
            .and_then(|r| r.branches.get_mut(branch))
            .ok_or_else(|| ClientError::not_found(format!("branch {branch} in {repository}")))?;

        let checksum = blake3::hash(&content).to_hex().to_string();
        let stats = ObjectStats {
            path: path.to_string(),
            physical_address: format!("mem://{repository}/{checksum}"),
            checksum,
            size_bytes: content.len() as u64,
            mtime: now_secs(),
            content_type: Some("application/octet-stream".into()),
        };
        entry.tree.insert(path.to_string(), content);
        Ok(stats)
    }

    async fn get_object(
        &self,
        repository: &str,
        reference: &str,
        path: &str,
    ) -> ClientResult<Bytes> {
        self.record(RecordedCall::GetObject {
            repository: repository.into(),
            reference: reference.into(),
            path: path.into(),
        })?;

        let repositories = self.repositories.read().map_err(lock_error)?;
        let repo = repositories
            .get(repository)
            .ok_or_else(|| ClientError::not_found(format!("repository {repository}")))?;
        let tree = match repo.branches.get(reference) {
            Some(branch) => &branch.tree,
            None => &repo
                .commits
                .get(reference)
                .ok_or_else(|| ClientError::not_found(format!("ref {reference} in {repository}")))?
                .tree,
        };
        tree.get(path).cloned().ok_or_else(|| {
            ClientError::not_found(format!("object {path} at {reference} in {repository}"))
        })
    }

    async fn commit(
        &self,
        repository: &str,
        branch: &str,
        request: &CommitRequest,
    ) -> ClientResult<CommitRecord> {
        self.record(RecordedCall::Commit {
            repository: repository.into(),
            branch: branch.into(),
            message: request.message.clone(),
            metadata: request.metadata.clone(),
        })?;

        let mut repositories = self.repositories.write().map_err(lock_error)?;
        let repo = repositories
            .get_mut(repository)
            .ok_or_else(|| ClientError::not_found(format!("repository {repository}")))?;
        let entry = repo
            .branches
            .get_mut(branch)
            .ok_or_else(|| ClientError::not_found(format!("branch {branch} in {repository}")))?;

        let timestamp = request.date.unwrap_or_else(now_secs);
        let id = commit_id(&entry.head, request, timestamp, &entry.tree);
        let record = CommitRecord {
            id: id.clone(),
            parents: vec![entry.head.clone()],
            committer: "in-memory".into(),
            message: request.message.clone(),
            metadata: request.metadata.clone(),
            timestamp,
            meta_range_id: None,
        };
        entry.head = id.clone();
        let tree = entry.tree.clone();
        repo.commits.insert(id, CommitEntry { record: record.clone(), tree });
        Ok(record)
    }
}

/// A shared in-memory store is its own connector: every acquisition hands
/// out another handle to the same state.
impl Connector for Arc<InMemoryStoreClient> {
    type Client = Arc<InMemoryStoreClient>;

    fn connect(&self) -> ClientResult<Self::Client> {
        self.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::clone(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InMemoryStoreClient {
        InMemoryStoreClient::new().with_repository("example", "main").unwrap()
    }

    #[tokio::test]
    async fn default_branch_exists() {
        let store = store();
        let main = store.get_branch("example", "main").await.unwrap();
        assert_eq!(main.id, "main");
        assert!(!main.commit_id.is_empty());
    }

    #[tokio::test]
    async fn poisoned_store_is_not_retryable() {
        let store = store();
        let poisoned = std::thread::scope(|s| {
            s.spawn(|| {
                let _guard = store.repositories.write().unwrap();
                panic!("writer died holding the lock");
            })
            .join()
        });
        assert!(poisoned.is_err());

        let err = store.get_branch("example", "main").await.unwrap_err();
        assert!(matches!(err, ClientError::Internal(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn missing_branch_and_repository_are_not_found() {
        let store = store();
        assert!(store.get_branch("example", "feature").await.unwrap_err().is_not_found());
        assert!(store.get_branch("other", "main").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn duplicate_repository_rejected() {
        let store = store();
        assert!(store.create_repository("example", "main").unwrap_err().is_already_exists());
    }

    #[tokio::test]
    async fn create_branch_twice() {
        let store = store();
        let created = store.create_branch("example", "feature", "main").await.unwrap();
        let main = store.get_branch("example", "main").await.unwrap();
        assert_eq!(created.commit_id, main.commit_id);

        let err = store.create_branch("example", "feature", "main").await.unwrap_err();
        assert!(err.is_already_exists());
        assert_eq!(store.branch_count("example"), 2);
    }

    #[tokio::test]
    async fn create_branch_from_missing_source() {
        let store = store();
        let err = store.create_branch("example", "feature", "nope").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(!store.branch_exists("example", "feature"));
    }

    #[tokio::test]
    async fn staged_objects_visible_on_branch_only() {
        let store = store();
        store.create_branch("example", "feature", "main").await.unwrap();
        store
            .put_object("example", "feature", "a/b.bin", Bytes::from_static(b"P"))
            .await
            .unwrap();

        let data = store.get_object("example", "feature", "a/b.bin").await.unwrap();
        assert_eq!(&data[..], b"P");
        assert!(store.get_object("example", "main", "a/b.bin").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn put_object_overwrites() {
        let store = store();
        store.put_object("example", "main", "k", Bytes::from_static(b"one")).await.unwrap();
        let stats = store.put_object("example", "main", "k", Bytes::from_static(b"two")).await.unwrap();
        assert_eq!(stats.size_bytes, 3);
        assert_eq!(&store.get_object("example", "main", "k").await.unwrap()[..], b"two");
    }

    #[tokio::test]
    async fn put_object_on_missing_branch() {
        let store = store();
        let err = store
            .put_object("example", "ghost", "k", Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn commit_snapshots_tree_and_advances_head() {
        let store = store();
        store.put_object("example", "main", "k", Bytes::from_static(b"v1")).await.unwrap();
        let mut metadata = Metadata::new();
        metadata.insert("run_id".into(), "r-1".into());
        let first = store
            .commit("example", "main", &CommitRequest::new("first").with_metadata(metadata).with_date(10))
            .await
            .unwrap();
        assert_eq!(first.timestamp, 10);
        assert_eq!(store.get_branch("example", "main").await.unwrap().commit_id, first.id);

        store.put_object("example", "main", "k", Bytes::from_static(b"v2")).await.unwrap();
        let old = store.get_object("example", &first.id, "k").await.unwrap();
        assert_eq!(&old[..], b"v1");

        let second = store.commit("example", "main", &CommitRequest::new("second")).await.unwrap();
        assert_eq!(second.parents, vec![first.id.clone()]);

        let log = store.log("example", "main").unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].message, "second");
        assert_eq!(log[1].metadata.get("run_id").map(String::as_str), Some("r-1"));
    }

    #[tokio::test]
    async fn branch_from_commit_id() {
        let store = store();
        store.put_object("example", "main", "k", Bytes::from_static(b"v1")).await.unwrap();
        let c = store.commit("example", "main", &CommitRequest::new("c")).await.unwrap();
        store.create_branch("example", "pinned", &c.id).await.unwrap();
        assert_eq!(&store.get_object("example", "pinned", "k").await.unwrap()[..], b"v1");
    }

    #[tokio::test]
    async fn calls_are_recorded_in_order() {
        let store = store();
        let _ = store.get_branch("example", "feature").await;
        store.create_branch("example", "feature", "main").await.unwrap();
        assert_eq!(
            store.calls(),
            vec![
                RecordedCall::GetBranch { repository: "example".into(), branch: "feature".into() },
                RecordedCall::CreateBranch {
                    repository: "example".into(),
                    name: "feature".into(),
                    source: "main".into(),
                },
            ]
        );
        assert_eq!(store.call_count(CallKind::GetBranch), 1);
        store.clear_calls();
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn injected_faults_fire_once() {
        let store = store();
        store.fail_next(CallKind::PutObject, ClientError::Transport("reset".into()));
        let err = store
            .put_object("example", "main", "k", Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert!(store.get_object("example", "main", "k").await.is_err());

        store.put_object("example", "main", "k", Bytes::from_static(b"x")).await.unwrap();
        assert_eq!(store.call_count(CallKind::PutObject), 2);
    }

    #[test]
    fn connector_counts_sessions() {
        let store = Arc::new(store());
        let a = store.connect().unwrap();
        let _b = store.connect().unwrap();
        assert!(Arc::ptr_eq(&a, &store));
        assert_eq!(store.sessions_opened(), 2);
    }
}
