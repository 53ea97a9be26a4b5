use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use lakerun_client::Operation;

#[derive(Parser)]
#[command(
    name = "lakerun",
    about = "lakerun: store task results on a versioned object store branch",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML file with the storage configuration
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true)]
    pub repository: Option<String>,

    /// Target branch
    #[arg(long, global = true)]
    pub branch: Option<String>,

    /// Branch a missing target branch is created from
    #[arg(long, global = true)]
    pub base_branch: Option<String>,

    /// API endpoint, e.g. http://localhost:8000/api/v1
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Run identifier recorded in commits (default: a fresh UUID)
    #[arg(long, global = true)]
    pub run_id: Option<String>,

    /// Record the source checkout's revision in commits
    #[arg(long, global = true)]
    pub mirror_source_revision: bool,

    /// Refuse to commit from a dirty source checkout
    #[arg(long, global = true)]
    pub strict_clean_source: bool,

    /// Without --branch, target the branch checked out in the source tree
    #[arg(long, global = true)]
    pub branch_from_source: bool,

    /// Source checkout inspected for revision checks
    #[arg(long, global = true, default_value = ".")]
    pub source_dir: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the target branch if it does not exist
    EnsureBranch,
    /// Upload a file as a result object
    Write(WriteArgs),
    /// Download a result object
    Read(ReadArgs),
    /// Commit staged results on the target branch
    Commit(CommitArgs),
    /// Call any store API operation by name
    Invoke(InvokeArgs),
    /// List the operations `invoke` accepts
    Operations,
}

#[derive(Args)]
pub struct WriteArgs {
    /// Object path on the branch
    #[arg(long)]
    pub key: String,
    /// File whose contents are uploaded
    #[arg(long)]
    pub file: PathBuf,
    /// Commit after the upload
    #[arg(long)]
    pub commit: bool,
    /// Commit metadata entry (repeatable)
    #[arg(long = "meta", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub meta: Vec<(String, String)>,
}

#[derive(Args)]
pub struct ReadArgs {
    #[arg(long)]
    pub key: String,
    /// Branch or commit id to read at (default: the target branch)
    #[arg(long = "ref")]
    pub reference: Option<String>,
    /// Write to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct CommitArgs {
    #[arg(long = "meta", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub meta: Vec<(String, String)>,
}

#[derive(Args)]
pub struct InvokeArgs {
    #[arg(value_parser = parse_operation)]
    pub operation: Operation,
    /// Operation argument (repeatable)
    #[arg(long = "arg", value_name = "NAME=VALUE", value_parser = parse_key_value)]
    pub args: Vec<(String, String)>,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    lakerun_types::metadata::parse_pair(raw)
        .ok_or_else(|| format!("expected KEY=VALUE, got {raw:?}"))
}

fn parse_operation(raw: &str) -> Result<Operation, String> {
    raw.parse::<Operation>().map_err(|e| e.to_string())
}
