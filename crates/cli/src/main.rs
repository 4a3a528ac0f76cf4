use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use commands::Commands;
use config::Config;
use conn::{ConnectionKind, ConnectionPinger, MySqlConnectionPinger, PostgresConnectionPinger};
use engine_core::clock::SystemClock;
use engine_core::metrics::MetricsRegistry;
use engine_core::pipeline::DeletingJanitor;
use engine_core::plan_provider::{PlanProvider, StaticPlanProvider};
use engine_core::registry::TableRegistry;
use engine_runtime::actions::{BatchLoadAction, RefreshRecentAction};
use engine_runtime::manager::{Manager, WorkerCadence};
use env::EnvManager;
use error::CliError;
use model::identifiers::SourceId;
use shutdown::ShutdownCoordinator;

mod adapters;
mod commands;
mod config;
mod conn;
mod env;
mod error;
mod logging;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(
    name = "syncctl",
    version = "0.1.0",
    about = "Continuous database-to-warehouse sync engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let exit_code = match run_cli().await {
        Ok(()) => 0,
        Err(e) => {
            match &e {
                CliError::ShutdownRequested => info!("shutdown completed gracefully"),
                _ => tracing::error!("{}", e),
            }
            e.exit_code()
        }
    };

    std::process::exit(exit_code);
}

async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, env_file } => run_sync(&config, env_file.as_deref()).await,
        Commands::Batch { config, table, env_file } => run_batch(&config, table.as_deref(), env_file.as_deref()).await,
        Commands::RefreshRecent { config, env_file } => run_refresh_recent(&config, env_file.as_deref()).await,
        Commands::TestConn { engine, conn_str } => test_conn(&engine, conn_str).await,
        Commands::Status { config, json } => show_status(&config, json).await,
    }
}

/// Resolves the tmp-dir the pipeline will stage extract files under,
/// letting an optional `.env` file override `TMPDIR` ahead of the
/// config-file default, per spec §6.
fn resolve_tmp_dir(config: &Config, env_file: Option<&str>) -> Result<PathBuf, CliError> {
    let mut env = EnvManager::new();
    if let Some(path) = env_file {
        env.load_from_file(path)?;
    }

    let tmp_dir = env
        .get("TMPDIR")
        .map(str::to_string)
        .unwrap_or_else(|| config.tmp_dir.clone());

    Ok(PathBuf::from(tmp_dir))
}

async fn build_sources(
    config: &Config,
) -> Result<HashMap<SourceId, Arc<dyn connectors::adapter::DatabaseAdapter>>, CliError> {
    let mut sources: HashMap<SourceId, Arc<dyn connectors::adapter::DatabaseAdapter>> = HashMap::new();
    for source in &config.sources {
        let adapter = adapters::build_adapter(&source.database).await?;
        sources.insert(SourceId::new(source.id.clone()), adapter);
    }
    Ok(sources)
}

/// Builds the manager from a config file and drives it until a shutdown
/// signal arrives, then stops every worker cleanly (spec §4.2, §6).
async fn run_sync(config_path: &str, env_file: Option<&str>) -> Result<(), CliError> {
    let config = Config::load(config_path)?;
    logging::init(&config.logger);

    let cancel = CancellationToken::new();
    let shutdown_coordinator = ShutdownCoordinator::new(cancel);
    shutdown_coordinator.register_handlers();

    let tmp_dir = resolve_tmp_dir(&config, env_file)?;
    let target = adapters::build_adapter(&config.target).await?;
    let sources = build_sources(&config).await?;

    let registry = Arc::new(TableRegistry::new(target.clone()));
    registry.ensure_storage_exists().await?;
    let plan_provider: Arc<dyn PlanProvider> = Arc::new(StaticPlanProvider::new(config.table_plans()));
    let clock = Arc::new(SystemClock);
    let janitor = Arc::new(DeletingJanitor);
    let metrics = MetricsRegistry::new();

    let manager = Manager::start(
        plan_provider,
        sources,
        target,
        registry,
        clock,
        tmp_dir,
        janitor,
        metrics,
        WorkerCadence::default(),
        config.chunk_size,
    )
    .await?;

    info!("sync manager started");
    shutdown_coordinator.cancel_token().cancelled().await;
    info!("shutdown requested, stopping workers");
    manager.shutdown().await;

    Err(CliError::ShutdownRequested)
}

/// Groups plans by source id, preserving each source's original plan order
/// (spec §4.7/§7: distinct sources run concurrently, plans within one
/// source run serially).
fn group_by_source(plans: Vec<model::plan::TablePlan>) -> Vec<(SourceId, Vec<model::plan::TablePlan>)> {
    let mut order = Vec::new();
    let mut by_source: HashMap<SourceId, Vec<model::plan::TablePlan>> = HashMap::new();
    for plan in plans {
        if !by_source.contains_key(&plan.source_id) {
            order.push(plan.source_id.clone());
        }
        by_source.entry(plan.source_id.clone()).or_default().push(plan);
    }
    order.into_iter().map(|id| (id.clone(), by_source.remove(&id).unwrap_or_default())).collect()
}

/// Joins per-table failures collected across sources into one error,
/// rather than stopping at the first one (spec §4.7/§7).
fn aggregate_errors(errors: Vec<(String, CliError)>) -> Result<(), CliError> {
    if errors.is_empty() {
        return Ok(());
    }
    if errors.len() == 1 {
        let (_, err) = errors.into_iter().next().unwrap();
        return Err(err);
    }
    let joined = errors
        .iter()
        .map(|(table, err)| format!("{table}: {err}"))
        .collect::<Vec<_>>()
        .join("; ");
    Err(CliError::Aggregate(format!("{} table(s) failed: {joined}", errors.len())))
}

/// Runs one full-refresh batch cycle per table and exits, per §4.10's
/// `batch` subcommand. Distinct sources run concurrently; plans within a
/// source run serially, and every plan's failure is collected rather than
/// aborting the run at the first one (spec §4.7, §7).
async fn run_batch(config_path: &str, table: Option<&str>, env_file: Option<&str>) -> Result<(), CliError> {
    let config = Config::load(config_path)?;
    logging::init(&config.logger);

    let tmp_dir = resolve_tmp_dir(&config, env_file)?;
    let target = adapters::build_adapter(&config.target).await?;
    let sources = build_sources(&config).await?;
    let registry = Arc::new(TableRegistry::new(target.clone()));
    registry.ensure_storage_exists().await?;
    let clock = Arc::new(SystemClock);
    let janitor = Arc::new(DeletingJanitor);

    let plans: Vec<_> = config
        .table_plans()
        .into_iter()
        .filter(|plan| match table {
            Some(t) => plan.target_table.as_str() == t,
            None => true,
        })
        .collect();

    let per_source = group_by_source(plans).into_iter().map(|(source_id, plans)| {
        let target = target.clone();
        let registry = registry.clone();
        let clock = clock.clone();
        let janitor = janitor.clone();
        let tmp_dir = tmp_dir.clone();
        let source = sources.get(&source_id).cloned();
        async move {
            let mut errors = Vec::new();
            let Some(source) = source else {
                errors.push((
                    source_id.to_string(),
                    CliError::Config(format!("no source configured for source id {source_id}")),
                ));
                return errors;
            };

            for plan in plans {
                let pipeline = engine_core::pipeline::ExtractLoadPipeline::new(
                    source.clone(),
                    target.clone(),
                    tmp_dir.clone(),
                    janitor.clone(),
                )
                .with_chunk_size(config.chunk_size);
                let mut action =
                    BatchLoadAction::new(source.clone(), target.clone(), pipeline, registry.clone(), clock.clone());
                let source_table = plan.source_table.as_str().to_string();
                match action.run(&plan, &source_table).await {
                    Ok(()) => info!(table = %plan.target_table, "batch cycle complete"),
                    Err(err) => errors.push((plan.target_table.to_string(), CliError::Sync(err))),
                }
            }
            errors
        }
    });

    let errors: Vec<_> = futures::future::join_all(per_source).await.into_iter().flatten().collect();
    aggregate_errors(errors)
}

/// Runs one refresh-recent cycle for every refresh-recent-enabled table
/// and exits, per §4.10's `refresh-recent` subcommand. Same
/// concurrent-across-sources, serial-within-a-source, collect-all-errors
/// execution as `run_batch` (spec §4.7, §7).
async fn run_refresh_recent(config_path: &str, env_file: Option<&str>) -> Result<(), CliError> {
    let config = Config::load(config_path)?;
    logging::init(&config.logger);

    let tmp_dir = resolve_tmp_dir(&config, env_file)?;
    let target = adapters::build_adapter(&config.target).await?;
    let sources = build_sources(&config).await?;
    let registry = Arc::new(TableRegistry::new(target.clone()));
    registry.ensure_storage_exists().await?;
    let clock = Arc::new(SystemClock);
    let janitor = Arc::new(DeletingJanitor);

    let plans: Vec<_> = config
        .table_plans()
        .into_iter()
        .filter(|plan| plan.refresh_recent.is_enabled())
        .collect();

    let per_source = group_by_source(plans).into_iter().map(|(source_id, plans)| {
        let target = target.clone();
        let registry = registry.clone();
        let clock = clock.clone();
        let janitor = janitor.clone();
        let tmp_dir = tmp_dir.clone();
        let source = sources.get(&source_id).cloned();
        async move {
            let mut errors = Vec::new();
            let Some(source) = source else {
                errors.push((
                    source_id.to_string(),
                    CliError::Config(format!("no source configured for source id {source_id}")),
                ));
                return errors;
            };

            for plan in plans {
                let pipeline = engine_core::pipeline::ExtractLoadPipeline::new(
                    source.clone(),
                    target.clone(),
                    tmp_dir.clone(),
                    janitor.clone(),
                )
                .with_chunk_size(config.chunk_size);
                let refresher = RefreshRecentAction::new(target.clone(), pipeline, registry.clone(), clock.clone());
                let source_table = plan.source_table.as_str().to_string();
                match refresher.run(&plan, &source_table).await {
                    Ok(_) => info!(table = %plan.target_table, "refresh-recent cycle complete"),
                    Err(err) => errors.push((plan.target_table.to_string(), CliError::Sync(err))),
                }
            }
            errors
        }
    });

    let errors: Vec<_> = futures::future::join_all(per_source).await.into_iter().flatten().collect();
    aggregate_errors(errors)
}

async fn test_conn(engine: &str, conn_str: String) -> Result<(), CliError> {
    tracing_subscriber::fmt().init();
    let kind =
        ConnectionKind::from_str(engine).map_err(|_| CliError::InvalidConnectionFormat(engine.to_string()))?;

    match kind {
        ConnectionKind::MySql => MySqlConnectionPinger { conn_str }.ping().await,
        ConnectionKind::Postgres => PostgresConnectionPinger { conn_str }.ping().await,
    }
}

async fn show_status(config_path: &str, as_json: bool) -> Result<(), CliError> {
    let config = Config::load(config_path)?;
    logging::init(&config.logger);
    let target = adapters::build_adapter(&config.target).await?;
    let registry = TableRegistry::new(target);
    registry.ensure_storage_exists().await?;
    let all = registry.all().await?;

    if as_json {
        output::print_status_json(&all)?;
    } else {
        output::print_status_table(&all);
    }

    Ok(())
}
