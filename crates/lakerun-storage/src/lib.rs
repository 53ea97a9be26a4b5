//! Result storage for lakerun.
//!
//! Persists the outputs of orchestrated tasks as objects on a branch of a
//! versioned object store, and records provenance commits describing which
//! run (or which source revision) produced them.
//!
//! # Architecture
//!
//! - [`config`]: [`StorageConfig`], loaded from TOML or built in code
//! - [`branch`]: idempotent target-branch creation
//! - [`object`]: uploads and downloads
//! - [`commit`]: commit metadata assembly and the source-state guard
//! - [`provenance`]: run context and source checkout collaborators
//! - [`codec`]: typed values to payload bytes
//! - [`adapter`]: [`ResultStorage`], which drives all of the above
//!
//! # Example
//!
//! ```no_run
//! use lakerun_storage::{ResultStorage, StorageConfig, WriteRequest};
//!
//! # async fn run() -> lakerun_storage::StorageResult<()> {
//! let config = StorageConfig::new("example")
//!     .with_branch("feature")
//!     .with_commit_on_write(true);
//! let storage = ResultStorage::http(config).build()?;
//! let report = storage
//!     .write(WriteRequest::new("out/result.json", &b"{}"[..]))
//!     .await?;
//! println!("stored {} bytes", report.stats.size_bytes);
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod branch;
pub mod codec;
pub mod commit;
pub mod config;
pub mod error;
pub mod object;
pub mod provenance;

pub use adapter::{ResultStorage, ResultStorageBuilder, WriteReport, WriteRequest, WriteStage};
pub use branch::BranchOutcome;
pub use codec::Codec;
pub use commit::{assemble_metadata, CommitPolicy, AUTOMATED_COMMIT_MESSAGE};
pub use config::{StorageConfig, DEFAULT_BASE_BRANCH};
pub use error::{ErrorKind, StorageError, StorageResult};
pub use provenance::{
    GitCheckout, NoRunContext, RunContextProvider, SourceRevisionProvider, SourceState,
    StaticRunContext, StaticSource,
};
