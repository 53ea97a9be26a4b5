use std::io::Write;

use anyhow::Context;
use colored::Colorize;
use lakerun_client::{Connector, HttpConnector, Operation, OperationCall, OperationOutput, Secret};
use lakerun_storage::{
    BranchOutcome, GitCheckout, ResultStorage, StaticRunContext, StorageConfig, WriteReport,
    WriteRequest,
};
use lakerun_types::{CommitRecord, Metadata};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use crate::cli::*;

const ACCESS_KEY_ENV: &str = "LAKERUN_ACCESS_KEY_ID";
const SECRET_KEY_ENV: &str = "LAKERUN_SECRET_ACCESS_KEY";

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    match &cli.command {
        Command::EnsureBranch => cmd_ensure_branch(&cli).await,
        Command::Write(args) => cmd_write(&cli, args).await,
        Command::Read(args) => cmd_read(&cli, args).await,
        Command::Commit(args) => cmd_commit(&cli, args).await,
        Command::Invoke(args) => cmd_invoke(&cli, args).await,
        Command::Operations => cmd_operations(cli.format),
    }
}

/// Config file, then command-line overrides, then access keys from the
/// environment when the file has none.
fn resolve_config(
    cli: &Cli,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<StorageConfig> {
    let mut config = match &cli.config {
        Some(path) => StorageConfig::load(path)?,
        None => StorageConfig::default(),
    };
    if let Some(repository) = &cli.repository {
        config.repository = repository.clone();
    }
    if let Some(branch) = &cli.branch {
        config.branch = Some(branch.clone());
    }
    if let Some(base) = &cli.base_branch {
        config.base_branch = base.clone();
    }
    if let Some(endpoint) = &cli.endpoint {
        config.connection.endpoint = endpoint.clone();
    }
    config.mirror_source_revision |= cli.mirror_source_revision;
    config.strict_clean_source |= cli.strict_clean_source;
    config.branch_from_source |= cli.branch_from_source;

    if config.connection.access_key_id.is_none() {
        config.connection.access_key_id = env(ACCESS_KEY_ENV);
    }
    if config.connection.secret_access_key.is_none() {
        config.connection.secret_access_key = env(SECRET_KEY_ENV).map(Secret::new);
    }
    Ok(config)
}

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

async fn build_storage(
    cli: &Cli,
    config: StorageConfig,
) -> anyhow::Result<ResultStorage<HttpConnector>> {
    let run_id = cli
        .run_id
        .clone()
        .unwrap_or_else(|| Uuid::now_v7().to_string());
    debug!(run_id, "resolved run id");
    let storage = ResultStorage::http(config)
        .run_context(StaticRunContext::new(run_id))
        .source_provider(GitCheckout::new(cli.source_dir.clone()))
        .resolve_source_branch()
        .await?
        .build()?;
    Ok(storage)
}

fn metadata_of(pairs: &[(String, String)]) -> Metadata {
    pairs.iter().cloned().collect()
}

fn outcome_label(outcome: BranchOutcome) -> &'static str {
    match outcome {
        BranchOutcome::Existed => "existed",
        BranchOutcome::Created => "created",
        BranchOutcome::CreatedConcurrently => "created concurrently",
    }
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn write_stdout(payload: &[u8]) -> anyhow::Result<()> {
    let mut out = std::io::stdout().lock();
    out.write_all(payload)?;
    out.flush()?;
    Ok(())
}

async fn cmd_ensure_branch(cli: &Cli) -> anyhow::Result<()> {
    let config = resolve_config(cli, process_env)?;
    let storage = build_storage(cli, config).await?;
    let outcome = storage.ensure_branch().await?;
    let config = storage.config();
    let branch = config.branch_name().unwrap_or_default();

    match cli.format {
        OutputFormat::Json => print_json(&json!({
            "repository": config.repository,
            "branch": branch,
            "base_branch": config.base_branch,
            "outcome": outcome_label(outcome),
        })),
        OutputFormat::Text => {
            if outcome.created() {
                println!(
                    "{} Created branch {} from {}",
                    "✓".green().bold(),
                    branch.yellow().bold(),
                    config.base_branch.yellow()
                );
            } else {
                println!(
                    "{} Branch {} {}",
                    "✓".green().bold(),
                    branch.yellow().bold(),
                    outcome_label(outcome)
                );
            }
            Ok(())
        }
    }
}

fn write_report_json(repository: &str, branch: &str, report: &WriteReport) -> Value {
    json!({
        "repository": repository,
        "branch": branch,
        "branch_outcome": outcome_label(report.branch),
        "object": report.stats,
        "commit": report.commit,
        "stages": report.stages.iter().map(ToString::to_string).collect::<Vec<_>>(),
    })
}

fn print_commit(commit: &CommitRecord) {
    println!("  Commit: {}", commit.id.cyan());
    for (key, value) in &commit.metadata {
        println!("    {} = {}", key.bold(), value);
    }
}

async fn cmd_write(cli: &Cli, args: &WriteArgs) -> anyhow::Result<()> {
    let mut config = resolve_config(cli, process_env)?;
    if args.commit {
        config.commit_on_write = true;
    }
    let payload = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("reading {}", args.file.display()))?;

    let storage = build_storage(cli, config).await?;
    let request = WriteRequest::new(&args.key, payload).with_metadata(metadata_of(&args.meta));
    let report = storage.write(request).await?;
    let config = storage.config();
    let branch = config.branch_name().unwrap_or_default();

    match cli.format {
        OutputFormat::Json => print_json(&write_report_json(&config.repository, branch, &report)),
        OutputFormat::Text => {
            println!(
                "{} Stored {} ({} bytes)",
                "✓".green().bold(),
                report.stats.path.bold(),
                report.stats.size_bytes
            );
            println!("  Branch: {} ({})", branch.yellow(), outcome_label(report.branch));
            match &report.commit {
                Some(commit) => print_commit(commit),
                None => println!("  Commit: {}", "skipped".dimmed()),
            }
            Ok(())
        }
    }
}

async fn cmd_read(cli: &Cli, args: &ReadArgs) -> anyhow::Result<()> {
    let config = resolve_config(cli, process_env)?;
    let storage = build_storage(cli, config).await?;
    let payload = match &args.reference {
        Some(reference) => storage.read_at(reference, &args.key).await?,
        None => storage.read(&args.key).await?,
    };

    let Some(path) = &args.output else {
        return write_stdout(&payload);
    };
    tokio::fs::write(path, &payload)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    match cli.format {
        OutputFormat::Json => print_json(&json!({
            "key": args.key,
            "output": path.display().to_string(),
            "size_bytes": payload.len(),
        })),
        OutputFormat::Text => {
            println!(
                "{} Read {} ({} bytes) into {}",
                "✓".green().bold(),
                args.key.bold(),
                payload.len(),
                path.display()
            );
            Ok(())
        }
    }
}

async fn cmd_commit(cli: &Cli, args: &CommitArgs) -> anyhow::Result<()> {
    let config = resolve_config(cli, process_env)?;
    let storage = build_storage(cli, config).await?;
    let commit = storage.commit_changes(&metadata_of(&args.meta)).await?;

    match cli.format {
        OutputFormat::Json => print_json(&serde_json::to_value(&commit)?),
        OutputFormat::Text => {
            println!("{} Committed {}", "✓".green().bold(), commit.message);
            print_commit(&commit);
            Ok(())
        }
    }
}

/// Fill the repository and branch path parameters from the configuration
/// when the caller left them out.
fn with_default_args(mut call: OperationCall, config: &StorageConfig) -> OperationCall {
    let params = call.operation.path_params();
    if params.contains(&"repository")
        && !call.args.contains_key("repository")
        && !config.repository.is_empty()
    {
        call = call.arg("repository", config.repository.clone());
    }
    if let Some(branch) = config.branch_name() {
        if params.contains(&"branch") && !call.args.contains_key("branch") {
            call = call.arg("branch", branch);
        }
    }
    call
}

async fn cmd_invoke(cli: &Cli, args: &InvokeArgs) -> anyhow::Result<()> {
    let config = resolve_config(cli, process_env)?;
    let call = with_default_args(
        OperationCall::new(args.operation).with_args(args.args.iter().cloned()),
        &config,
    );
    let client = HttpConnector::new(config.connection.clone()).connect()?;

    match client.invoke(&call).await? {
        OperationOutput::Json(value) => print_json(&value),
        OperationOutput::Bytes(bytes) => write_stdout(&bytes),
        OperationOutput::Empty => match cli.format {
            OutputFormat::Json => print_json(&json!({
                "operation": args.operation.name(),
                "status": "ok",
            })),
            OutputFormat::Text => {
                println!("{} {}", "✓".green().bold(), args.operation.name());
                Ok(())
            }
        },
    }
}

fn operations_json() -> Value {
    Value::Array(
        Operation::ALL
            .iter()
            .map(|op| {
                let endpoint = op.endpoint();
                json!({
                    "name": op.name(),
                    "method": endpoint.method.as_method().as_str(),
                    "path": endpoint.path,
                    "body": endpoint.body.iter().map(|f| f.name).collect::<Vec<_>>(),
                })
            })
            .collect(),
    )
}

fn cmd_operations(format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(&operations_json()),
        OutputFormat::Text => {
            for op in Operation::ALL {
                let endpoint = op.endpoint();
                println!(
                    "{} {} {}",
                    format!("{:<26}", op.name()).bold(),
                    format!("{:<6}", endpoint.method.as_method().as_str()).cyan(),
                    endpoint.path
                );
            }
            Ok(())
        }
    }
}
