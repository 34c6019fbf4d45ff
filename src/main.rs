use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rmcp::{ServiceExt, transport::stdio};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crates_local_index::index::constants::{DEFAULT_DEBOUNCE_MS, DEFAULT_PARSE_WORKERS};
use crates_local_index::index::outputs::{UpdateSummary, VersionOutput};
use crates_local_index::index::utils::format_bytes;
use crates_local_index::index::watcher::RegistryWatcher;
use crates_local_index::index::{CratesLocalIndex, IndexConfig, IndexError};
use crates_local_index::service::CratesIndexService;

/// Persistent, incrementally updated cache of the local Cargo registry index
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Cargo home holding the registry clone (defaults to ~/.cargo)
    #[arg(long, env = "CARGO_HOME")]
    cargo_home: Option<PathBuf>,

    /// Registry index git repository, overriding discovery under the Cargo home
    #[arg(long, env = "CRATES_LOCAL_INDEX_REGISTRY")]
    registry_dir: Option<PathBuf>,

    /// Custom cache directory path (defaults to ~/.crates-local-index/cache)
    #[arg(long, env = "CRATES_LOCAL_INDEX_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Threads parsing registry files during an update
    #[arg(long, default_value_t = DEFAULT_PARSE_WORKERS)]
    parse_workers: usize,

    /// Quiet period in milliseconds before a registry change triggers an update
    #[arg(long, default_value_t = DEFAULT_DEBOUNCE_MS)]
    debounce_ms: u64,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the index over MCP on stdio and watch the registry (default)
    Serve,
    /// Bring the index up to date with the registry and exit
    Update,
    /// Print the versions of a crate
    Show {
        /// Crate name (case-insensitive)
        name: String,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// List indexed crate names
    List {
        /// Only names starting with this prefix
        #[arg(long)]
        prefix: Option<String>,
        /// Maximum number of names to print
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print the state of the index
    Status,
    /// Discard the index so the next update rebuilds it from scratch
    Invalidate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries the MCP transport
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let config = IndexConfig::discover(args.cargo_home, args.registry_dir, args.cache_dir)?
        .with_parse_workers(args.parse_workers)
        .with_debounce(std::time::Duration::from_millis(args.debounce_ms));
    let index = CratesLocalIndex::open(config)?;

    let result = match args.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&index).await,
        Commands::Update => update(&index).await,
        Commands::Show { name, json } => show(&index, &name, json),
        Commands::List { prefix, limit } => list(&index, prefix, limit),
        Commands::Status => status(&index),
        Commands::Invalidate => index.invalidate_caches(),
    };

    index.close()?;
    result
}

async fn serve(index: &CratesLocalIndex) -> Result<()> {
    tracing::info!("Starting crates index MCP server on stdio...");

    let _watcher = match RegistryWatcher::start(index.clone()) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            tracing::warn!("Registry changes will not be picked up automatically: {:#}", e);
            None
        }
    };
    // Runs in the background; queries report `Updating` until it finishes
    let _ = index.update_if_needed();

    let service = CratesIndexService::new(index.clone())
        .serve(stdio())
        .await
        .inspect_err(|e| {
            tracing::error!("serving error: {:?}", e);
        })?;

    service.waiting().await?;
    Ok(())
}

async fn update(index: &CratesLocalIndex) -> Result<()> {
    let Some(handle) = index.update_if_needed() else {
        let status = index.status();
        if !status.available {
            anyhow::bail!(
                "Crates index store is unavailable: {}",
                status.unavailable_reason.as_deref().unwrap_or("unknown reason")
            );
        }
        println!(
            "Nothing to update (indexed commit {})",
            index.indexed_commit_hash()
        );
        return Ok(());
    };

    let report = handle.await.context("Update task failed")??;
    let summary = UpdateSummary::from(&report);
    println!(
        "Indexed {} -> {}: {} crates written from {} files ({} failed, {}) in {} ms",
        summary.previous,
        summary.head,
        summary.crates_written,
        summary.files,
        summary.files_failed,
        if summary.full_reindex {
            "full reindex"
        } else {
            "incremental"
        },
        summary.elapsed_ms
    );
    Ok(())
}

fn show(index: &CratesLocalIndex, name: &str, json: bool) -> Result<()> {
    let Some(krate) = index.get_crate(name).map_err(query_error)? else {
        anyhow::bail!("Crate '{name}' is not in the local registry index");
    };

    if json {
        let versions: Vec<VersionOutput> =
            krate.versions().iter().map(VersionOutput::from).collect();
        println!("{}", serde_json::to_string_pretty(&versions)?);
        return Ok(());
    }

    println!("{}", krate.name());
    if let Some(latest) = krate.latest_version() {
        println!("latest: {}", latest.version());
    }
    for version in krate.versions() {
        println!(
            "  {:<20} {:<8} {}",
            version.version(),
            if version.is_yanked() { "yanked" } else { "" },
            version.features().join(", ")
        );
    }
    Ok(())
}

fn list(index: &CratesLocalIndex, prefix: Option<String>, limit: Option<usize>) -> Result<()> {
    let names = index.get_all_crate_names().map_err(query_error)?;
    let prefix = prefix.map(|p| p.to_ascii_lowercase()).unwrap_or_default();
    let matching = names.iter().filter(|name| name.starts_with(&prefix));
    for name in matching.take(limit.unwrap_or(usize::MAX)) {
        println!("{name}");
    }
    Ok(())
}

fn status(index: &CratesLocalIndex) -> Result<()> {
    let status = index.status();
    println!("registry:  {}", status.registry_path.display());
    println!("cache:     {}", status.cache_dir.display());
    println!("indexed:   {}", status.indexed_commit_hash);
    if let Some(updated_at) = status.updated_at {
        println!("updated:   {}", updated_at.to_rfc3339());
    }
    match (status.crates, status.store_bytes) {
        (Some(crates), Some(bytes)) => {
            println!("crates:    {crates} ({})", format_bytes(bytes));
        }
        _ => println!(
            "store:     unavailable ({})",
            status.unavailable_reason.as_deref().unwrap_or("unknown reason")
        ),
    }
    Ok(())
}

fn query_error(error: IndexError) -> anyhow::Error {
    match error {
        IndexError::Unavailable { .. } => anyhow::Error::new(error)
            .context("Another process may be holding the crates index store"),
        other => other.into(),
    }
}
