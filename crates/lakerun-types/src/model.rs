//! Wire model shared by every store client.
//!
//! Field names follow the JSON the versioned store speaks, so these types
//! deserialize straight from API responses.

use serde::{Deserialize, Serialize};

use crate::metadata::Metadata;

/// A branch and the commit it currently points at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRef {
    /// Branch name.
    pub id: String,
    /// Identifier of the commit at the branch head.
    pub commit_id: String,
}

impl BranchRef {
    pub fn new(id: impl Into<String>, commit_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            commit_id: commit_id.into(),
        }
    }
}

/// Metadata describing a stored object, as reported after an upload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStats {
    /// Object path relative to the branch root.
    pub path: String,
    /// Where the store physically placed the object.
    #[serde(default)]
    pub physical_address: String,
    /// Store-computed content checksum.
    #[serde(default)]
    pub checksum: String,
    /// Object size in bytes.
    #[serde(default)]
    pub size_bytes: u64,
    /// Modification time, epoch seconds.
    #[serde(default)]
    pub mtime: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// Parameters of a commit creation request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRequest {
    pub message: String,
    #[serde(default)]
    pub metadata: Metadata,
    /// Commit time in epoch seconds. The store assigns one when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<i64>,
}

impl CommitRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            metadata: Metadata::new(),
            date: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_date(mut self, epoch_seconds: i64) -> Self {
        self.date = Some(epoch_seconds);
        self
    }
}

/// A commit as reported by the store.
///
/// Produced once per commit call and handed to the caller; nothing in lakerun
/// keeps or mutates it afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub id: String,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub committer: String,
    pub message: String,
    #[serde(default)]
    pub metadata: Metadata,
    /// Commit time, epoch seconds.
    #[serde(rename = "creation_date")]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_range_id: Option<String>,
}
