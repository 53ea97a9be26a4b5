//! Where a result came from: the orchestration run and the source checkout.
//!
//! Both are injected into the storage adapter as collaborators instead of
//! being read from ambient process state, so tests and non-git deployments
//! can supply fixed values.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{StorageError, StorageResult};

/// Supplies the identifier of the current orchestration run, if any.
pub trait RunContextProvider: Send + Sync {
    fn run_id(&self) -> Option<String>;
}

/// No orchestration run is active.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoRunContext;

impl RunContextProvider for NoRunContext {
    fn run_id(&self) -> Option<String> {
        None
    }
}

/// A fixed run identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaticRunContext {
    run_id: String,
}

impl StaticRunContext {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self { run_id: run_id.into() }
    }
}

impl RunContextProvider for StaticRunContext {
    fn run_id(&self) -> Option<String> {
        Some(self.run_id.clone())
    }
}

/// State of the source checkout that produced the data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceState {
    /// Full revision id of the checked-out commit.
    pub revision: String,
    /// Checked-out branch; `None` on a detached head.
    pub branch: Option<String>,
    /// Tracked files have uncommitted modifications.
    pub is_dirty: bool,
}

impl SourceState {
    pub fn clean(revision: impl Into<String>) -> Self {
        Self {
            revision: revision.into(),
            branch: None,
            is_dirty: false,
        }
    }

    pub fn dirty(revision: impl Into<String>) -> Self {
        Self {
            is_dirty: true,
            ..Self::clean(revision)
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }
}

/// Reports the state of the source checkout.
#[async_trait]
pub trait SourceRevisionProvider: Send + Sync {
    async fn source_state(&self) -> StorageResult<SourceState>;
}

/// A fixed source state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaticSource {
    state: SourceState,
}

impl StaticSource {
    pub fn new(state: SourceState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl SourceRevisionProvider for StaticSource {
    async fn source_state(&self) -> StorageResult<SourceState> {
        Ok(self.state.clone())
    }
}

/// Reads the state of a local git working tree by running `git`.
#[derive(Clone, Debug)]
pub struct GitCheckout {
    workdir: PathBuf,
}

impl GitCheckout {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self { workdir: workdir.into() }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    async fn git(&self, args: &[&str]) -> StorageResult<String> {
        let command = format!("git {}", args.join(" "));
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| StorageError::Source(format!("{command}: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(StorageError::Source(format!(
                "{command} in {} exited with {}: {}",
                self.workdir.display(),
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }
        String::from_utf8(output.stdout)
            .map(|s| s.trim().to_string())
            .map_err(|e| StorageError::Source(format!("{command}: {e}")))
    }
}

#[async_trait]
impl SourceRevisionProvider for GitCheckout {
    async fn source_state(&self) -> StorageResult<SourceState> {
        let revision = self.git(&["rev-parse", "HEAD"]).await?;
        let branch = self.git(&["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        // Untracked files do not make a checkout dirty.
        let status = self.git(&["status", "--porcelain", "--untracked-files=no"]).await?;

        let state = SourceState {
            revision,
            branch: (branch != "HEAD").then_some(branch),
            is_dirty: !status.is_empty(),
        };
        debug!(
            workdir = %self.workdir.display(),
            revision = %state.revision,
            dirty = state.is_dirty,
            "read source checkout state"
        );
        Ok(state)
    }
}
