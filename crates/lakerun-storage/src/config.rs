//! Static configuration of a result storage instance.

use std::path::Path;

use lakerun_client::Credentials;
use lakerun_types::{validate_branch_name, validate_repository_name};
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// Base branch new target branches fork from when nothing else is set.
pub const DEFAULT_BASE_BRANCH: &str = "main";

/// Where and how results are stored.
///
/// Loaded from TOML or built in code. Validated once, when the storage is
/// built; read-only afterwards.
///
/// ```toml
/// repository = "example"
/// branch = "feature"
/// commit_on_write = true
///
/// [connection]
/// endpoint = "http://localhost:8000/api/v1"
/// access_key_id = "AKIA..."
/// secret_access_key = "..."
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Repository holding the results.
    pub repository: String,
    /// Target branch. Without one, reads need an explicit ref and commits
    /// are impossible.
    pub branch: Option<String>,
    /// Branch (or commit) a missing target branch is created from.
    pub base_branch: String,
    pub connection: Credentials,
    /// Commit on the target branch after every successful write.
    pub commit_on_write: bool,
    /// Record the source checkout's revision in commit metadata.
    pub mirror_source_revision: bool,
    /// Refuse to commit while the source checkout has uncommitted changes.
    pub strict_clean_source: bool,
    /// Without an explicit `branch`, target the branch checked out in the
    /// source tree (the base branch on a detached head).
    pub branch_from_source: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            repository: String::new(),
            branch: None,
            base_branch: DEFAULT_BASE_BRANCH.to_string(),
            connection: Credentials::default(),
            commit_on_write: false,
            mirror_source_revision: false,
            strict_clean_source: false,
            branch_from_source: false,
        }
    }
}

impl StorageConfig {
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            ..Self::default()
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_base_branch(mut self, base: impl Into<String>) -> Self {
        self.base_branch = base.into();
        self
    }

    pub fn with_connection(mut self, connection: Credentials) -> Self {
        self.connection = connection;
        self
    }

    pub fn with_commit_on_write(mut self, enabled: bool) -> Self {
        self.commit_on_write = enabled;
        self
    }

    pub fn with_mirror_source_revision(mut self, enabled: bool) -> Self {
        self.mirror_source_revision = enabled;
        self
    }

    pub fn with_strict_clean_source(mut self, enabled: bool) -> Self {
        self.strict_clean_source = enabled;
        self
    }

    pub fn with_branch_from_source(mut self, enabled: bool) -> Self {
        self.branch_from_source = enabled;
        self
    }

    /// Whether the target branch still has to be taken from the source
    /// checkout.
    pub fn needs_source_branch(&self) -> bool {
        self.branch_from_source && self.branch_name().is_none()
    }

    /// Parse a TOML document. The result is not validated yet.
    pub fn from_toml_str(raw: &str) -> StorageResult<Self> {
        toml::from_str(raw).map_err(|e| StorageError::Configuration(format!("invalid TOML: {e}")))
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| StorageError::Configuration(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    /// The configured target branch, treating an empty string as unset.
    pub fn branch_name(&self) -> Option<&str> {
        self.branch.as_deref().filter(|b| !b.is_empty())
    }

    /// The target branch, or a configuration error when none is set.
    pub fn target_branch(&self) -> StorageResult<&str> {
        self.branch_name().ok_or_else(|| {
            StorageError::Configuration(format!(
                "no target branch configured for repository {}",
                self.repository
            ))
        })
    }

    /// Check the configuration for internal consistency.
    pub fn validate(&self) -> StorageResult<()> {
        let invalid = |e: lakerun_types::TypeError| StorageError::Configuration(e.to_string());

        if self.repository.is_empty() {
            return Err(StorageError::Configuration("repository must be set".into()));
        }
        validate_repository_name(&self.repository).map_err(invalid)?;
        if let Some(branch) = self.branch_name() {
            validate_branch_name(branch).map_err(invalid)?;
        }
        if self.base_branch.is_empty() {
            return Err(StorageError::Configuration("base_branch must not be empty".into()));
        }
        if self.commit_on_write && self.branch_name().is_none() && !self.branch_from_source {
            return Err(StorageError::Configuration(
                "commit_on_write requires a target branch".into(),
            ));
        }
        if self.connection.endpoint.is_empty() {
            return Err(StorageError::Configuration("connection endpoint must be set".into()));
        }
        Ok(())
    }
}
