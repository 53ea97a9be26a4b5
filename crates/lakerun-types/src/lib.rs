//! Shared types for lakerun.
//!
//! Every other lakerun crate depends on `lakerun-types`. The types here mirror
//! the wire model of a versioned object store (branches, objects, commits)
//! and carry the naming rules the store enforces, so that invalid names are
//! rejected before any remote call is made.
//!
//! # Key Types
//!
//! - [`BranchRef`]: a branch name and the commit it points at
//! - [`ObjectStats`]: metadata returned after an object upload
//! - [`CommitRequest`] / [`CommitRecord`]: commit creation and its result
//! - [`Metadata`]: ordered string-to-string commit metadata
//!
//! # Modules
//!
//! - [`names`]: repository, branch and object-path validation
//! - [`metadata`]: provenance keys injected by the storage adapter

pub mod error;
pub mod metadata;
pub mod model;
pub mod names;

pub use error::TypeError;
pub use metadata::{Metadata, RUN_ID_KEY, SOURCE_REVISION_KEY};
pub use model::{BranchRef, CommitRecord, CommitRequest, ObjectStats};
pub use names::{
    branch_name_from_source, validate_branch_name, validate_object_path, validate_repository_name,
};
