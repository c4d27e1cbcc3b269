use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing::{error, info, warn};

use catalog_sync::{feed, AppError, Dependencies, LogFormat, Settings};
use catalog_sync_pipeline::backfill::BackfillReport;
use catalog_sync_pipeline::search::{CatalogSearchParams, SearchScope};
use catalog_sync_shared::EntityKind;

#[derive(Parser)]
#[command(name = "catalog-sync")]
#[command(about = "Search index sync and trending pipeline for the catalog", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure every index, then run a full sync
    Setup,
    /// Sync one entity type (listings, threads or users)
    Sync {
        #[arg(value_parser = parse_kind)]
        kind: EntityKind,
    },
    /// Sync every entity type
    SyncAll,
    /// Delete every document from every index
    Clear,
    /// Create missing indices with their settings
    Configure,
    /// Recompute trending flags from current counters and save the catalog
    RecomputeTrending {
        #[arg(value_parser = parse_kind)]
        kind: Option<EntityKind>,
    },
    /// Run a catalog search and print the results as JSON
    Search {
        query: String,
        /// all, listings, threads or users
        #[arg(long = "type", default_value = "all")]
        scope: SearchScope,
        #[arg(long)]
        page: Option<String>,
        #[arg(long)]
        sort: Option<String>,
        #[arg(long)]
        order: Option<String>,
    },
    /// Route change events and run trending workers until Ctrl-C.
    /// Store mutations are read as JSON lines from stdin; the catalog is
    /// saved on shutdown.
    Worker,
}

fn parse_kind(raw: &str) -> Result<EntityKind, String> {
    raw.parse()
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

fn log_report(report: &BackfillReport) {
    for kind in &report.kinds {
        info!(
            kind = %kind.kind,
            scanned = kind.scanned,
            batches = kind.batches,
            upserted = kind.summary.upserted,
            deleted = kind.summary.deleted,
            failed = kind.summary.failed,
            "Sync report"
        );
    }
    if report.has_failures() {
        warn!(failed = report.totals().failed, "Some documents failed to sync; rerun to repair");
    }
}

async fn run(command: Commands, settings: Settings) -> Result<(), AppError> {
    let mut deps = Dependencies::new(&settings).await?;

    match command {
        Commands::Setup => log_report(&deps.backfill.setup().await?),
        Commands::Sync { kind } => {
            let report = deps.backfill.sync_kind(kind).await?;
            log_report(&BackfillReport { kinds: vec![report] });
        }
        Commands::SyncAll => log_report(&deps.backfill.sync_all().await?),
        Commands::Clear => deps.backfill.clear().await?,
        Commands::Configure => deps.backfill.configure().await?,
        Commands::RecomputeTrending { kind } => {
            match kind {
                Some(kind) => {
                    deps.evaluator.recompute_kind(kind).await?;
                }
                None => {
                    let reports = deps.evaluator.recompute_all().await?;
                    let changed: usize = reports.values().map(|r| r.changed).sum();
                    info!(kinds = reports.len(), changed, "Trending recomputed for every kind");
                }
            }
            deps.persist().await?;
        }
        Commands::Search {
            query,
            scope,
            page,
            sort,
            order,
        } => {
            let params = CatalogSearchParams {
                page,
                sort,
                order,
                ..CatalogSearchParams::new(query).with_scope(scope)
            };
            let results = deps.search.search(&params).await;
            let rendered = serde_json::to_string_pretty(&results)
                .map_err(|e| AppError::config(format!("Failed to render results: {}", e)))?;
            println!("{}", rendered);
        }
        Commands::Worker => {
            let (orchestrator, changes) = deps.orchestrator()?;
            let store = Arc::clone(&deps.store);
            tokio::spawn(async move {
                let stdin = BufReader::new(tokio::io::stdin());
                match feed::run(&store, stdin).await {
                    Ok(applied) => info!(applied, "Input feed closed"),
                    Err(e) => error!(error = %e, "Failed to read input feed"),
                }
            });
            orchestrator.run(changes).await?;
            deps.persist().await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    init_tracing(settings.log_format);

    let cli = Cli::parse();

    match run(cli.command, settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}
