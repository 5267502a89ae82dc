use std::sync::Arc;

use anyhow::Context;
use photosync_core::BasicManifestExtractor;
use photosyncd::config::SyncConfig;
use photosyncd::sync::action::ResolutionStrategy;
use photosyncd::sync::engine::{RunOptions, SyncEngine};
use photosyncd::sync::progress::{ProgressSink, SyncEvent};
use photosyncd::sync::store::{AssetStore, ConflictView};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
enum CliMode {
    Sync { dry_run: bool },
    Conflicts,
    Resolve {
        id: i64,
        strategy: ResolutionStrategy,
        dry_run: bool,
    },
    Help,
}

fn parse_cli<I>(args: I) -> anyhow::Result<CliMode>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter().skip(1);
    let command = match args.next() {
        None => return Ok(CliMode::Help),
        Some(command) => command,
    };
    match command.as_str() {
        "sync" => {
            let mut dry_run = false;
            for arg in args {
                match arg.as_str() {
                    "--dry-run" => dry_run = true,
                    other => anyhow::bail!("unknown argument: {other}"),
                }
            }
            Ok(CliMode::Sync { dry_run })
        }
        "conflicts" => {
            if let Some(other) = args.next() {
                anyhow::bail!("unknown argument: {other}");
            }
            Ok(CliMode::Conflicts)
        }
        "resolve" => {
            let id = args
                .next()
                .context("resolve requires a conflict id")?
                .parse::<i64>()
                .context("conflict id must be an integer")?;
            let mut strategy = None;
            let mut dry_run = false;
            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "--strategy" => {
                        let value = args.next().context("--strategy requires a value")?;
                        strategy = Some(
                            ResolutionStrategy::parse(&value)
                                .with_context(|| format!("unknown strategy: {value}"))?,
                        );
                    }
                    "--dry-run" => dry_run = true,
                    other => anyhow::bail!("unknown argument: {other}"),
                }
            }
            let strategy =
                strategy.context("resolve requires --strategy prefer-storage|prefer-database")?;
            Ok(CliMode::Resolve {
                id,
                strategy,
                dry_run,
            })
        }
        "--help" | "-h" | "help" => Ok(CliMode::Help),
        other => anyhow::bail!("unknown command: {other}"),
    }
}

fn print_usage() {
    println!("Usage: photosyncd <command>");
    println!("  sync [--dry-run]       Reconcile storage against the asset database");
    println!("  conflicts              List unresolved conflicts as JSON");
    println!("  resolve <id> --strategy prefer-storage|prefer-database [--dry-run]");
    println!("                         Apply a resolution to a flagged conflict");
    println!("  --help                 Show this message");
}

/// Streams engine progress to stderr through tracing while the JSON result
/// goes to stdout.
struct LogProgress;

impl ProgressSink for LogProgress {
    fn emit(&self, event: &SyncEvent) {
        match event {
            SyncEvent::Start {
                summary,
                totals,
                dry_run,
            } => {
                tracing::info!(
                    storage_objects = summary.storage_objects,
                    database_records = summary.database_records,
                    missing_in_db = totals.missing_in_db,
                    orphan_in_db = totals.orphan_in_db,
                    conflict_candidates = totals.conflict_candidates,
                    status_reconciliations = totals.status_reconciliations,
                    dry_run,
                    "sync started"
                );
            }
            SyncEvent::Stage {
                stage,
                status,
                processed,
                total,
                ..
            } => {
                tracing::info!(?stage, ?status, processed, total, "stage");
            }
            SyncEvent::Action {
                action,
                index,
                total,
                ..
            } => {
                tracing::info!(
                    kind = ?action.kind,
                    storage_key = %action.storage_key,
                    applied = action.applied,
                    index,
                    total,
                    "action"
                );
            }
            SyncEvent::Complete { result } => {
                tracing::info!(
                    inserted = result.summary.inserted,
                    updated = result.summary.updated,
                    deleted = result.summary.deleted,
                    conflicts = result.summary.conflicts,
                    skipped = result.summary.skipped,
                    "sync complete"
                );
            }
            SyncEvent::Error { message } => {
                tracing::error!(%message, "sync failed");
            }
        }
    }
}

async fn open_store(config: &SyncConfig) -> anyhow::Result<AssetStore> {
    match &config.database_url {
        Some(url) => AssetStore::new(url).await,
        None => AssetStore::new_default().await,
    }
    .context("failed to open asset database")
}

async fn build_engine(config: &SyncConfig) -> anyhow::Result<SyncEngine> {
    let store = open_store(config).await?;
    let provider = config
        .provider
        .build()
        .context("failed to build storage provider")?;
    Ok(SyncEngine::new(
        store,
        provider,
        Arc::new(BasicManifestExtractor),
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mode = parse_cli(std::env::args())?;
    if mode == CliMode::Help {
        print_usage();
        return Ok(());
    }
    let config = SyncConfig::from_env().context("failed to load configuration")?;

    match mode {
        CliMode::Sync { dry_run } => {
            let engine = build_engine(&config).await?;
            let options = RunOptions {
                dry_run,
                ..Default::default()
            };
            let result = engine
                .run_with_progress(&config.tenant, &options, &LogProgress)
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        CliMode::Conflicts => {
            let store = open_store(&config).await?;
            let conflicts: Vec<ConflictView> = store
                .list_conflicts(&config.tenant)
                .await?
                .into_iter()
                .map(ConflictView::from_record)
                .collect();
            println!("{}", serde_json::to_string_pretty(&conflicts)?);
        }
        CliMode::Resolve {
            id,
            strategy,
            dry_run,
        } => {
            let engine = build_engine(&config).await?;
            let action = engine
                .resolve_conflict(&config.tenant, id, strategy, dry_run)
                .await?;
            println!("{}", serde_json::to_string_pretty(&action)?);
        }
        CliMode::Help => {}
    }
    Ok(())
}
