//! `Manager`/`Supervisor`: the concurrency driver spec §4.2 describes as
//! one worker per source, ticking through that source's table plans on a
//! cadence that speeds up while rows are moving and backs off once a
//! source goes idle. Grounded on the teacher's `PipelineCoordinator`
//! (`actor/coordinator.rs`), generalized from a fixed producer/consumer
//! pair to an arbitrary per-source worker pool.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use model::identifiers::SourceId;
use model::plan::TablePlan;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use connectors::adapter::DatabaseAdapter;
use engine_core::clock::Clock;
use engine_core::error::SyncError;
use engine_core::metrics::MetricsRegistry;
use engine_core::pipeline::{ExtractLoadPipeline, TempFileJanitor};
use engine_core::plan_provider::PlanProvider;
use engine_core::registry::TableRegistry;

use crate::actions::{BatchLoadAction, IncrementalLoadAction, RefreshRecentAction};
use crate::actor::messages::WorkerMsg;
use crate::actor::scheduler::TickScheduler;
use crate::actor::{spawn_actor, Actor, ActorContext, ActorRef};
use crate::error::ActorError;

/// Per-source cadence: a cycle that moved rows schedules the next tick
/// almost immediately; an idle cycle backs off to avoid hammering a quiet
/// source.
#[derive(Debug, Clone)]
pub struct WorkerCadence {
    pub immediate_delay: Duration,
    pub idle_delay: Duration,
}

impl Default for WorkerCadence {
    fn default() -> Self {
        Self {
            immediate_delay: Duration::from_millis(100),
            idle_delay: Duration::from_secs(5),
        }
    }
}

/// Consecutive cycles the same table can fail before the worker gives up
/// on it and escapes its tick loop entirely, rather than ticking forever
/// against a table that will never recover on its own (spec §4.7, §8.6).
const CONSECUTIVE_FAILURE_THRESHOLD: u32 = 3;

/// Errors raised outside any single table's scope — a registry/config
/// failure rather than a per-table extract/load failure — escape the
/// worker loop immediately instead of counting toward the per-table
/// threshold (spec §4.7: "an error raised outside a table scope such as a
/// connection error to the registry").
fn is_out_of_table_scope(err: &SyncError) -> bool {
    matches!(err, SyncError::ConfigError(_))
}

pub struct SourceWorker {
    source_id: SourceId,
    source: Arc<dyn DatabaseAdapter>,
    target: Arc<dyn DatabaseAdapter>,
    plans: Vec<TablePlan>,
    registry: Arc<TableRegistry>,
    clock: Arc<dyn Clock>,
    tmp_dir: PathBuf,
    janitor: Arc<dyn TempFileJanitor>,
    metrics: MetricsRegistry,
    cadence: WorkerCadence,
    chunk_size: usize,
    self_ref: Option<ActorRef<WorkerMsg>>,
    consecutive_failures: HashMap<String, u32>,
    escaped: bool,
}

impl SourceWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source_id: SourceId,
        source: Arc<dyn DatabaseAdapter>,
        target: Arc<dyn DatabaseAdapter>,
        plans: Vec<TablePlan>,
        registry: Arc<TableRegistry>,
        clock: Arc<dyn Clock>,
        tmp_dir: PathBuf,
        janitor: Arc<dyn TempFileJanitor>,
        metrics: MetricsRegistry,
        cadence: WorkerCadence,
    ) -> Self {
        Self::with_chunk_size(
            source_id, source, target, plans, registry, clock, tmp_dir, janitor, metrics, cadence, 0,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_chunk_size(
        source_id: SourceId,
        source: Arc<dyn DatabaseAdapter>,
        target: Arc<dyn DatabaseAdapter>,
        plans: Vec<TablePlan>,
        registry: Arc<TableRegistry>,
        clock: Arc<dyn Clock>,
        tmp_dir: PathBuf,
        janitor: Arc<dyn TempFileJanitor>,
        metrics: MetricsRegistry,
        cadence: WorkerCadence,
        chunk_size: usize,
    ) -> Self {
        Self {
            source_id,
            source,
            target,
            plans,
            registry,
            clock,
            tmp_dir,
            janitor,
            metrics,
            cadence,
            chunk_size,
            self_ref: None,
            consecutive_failures: HashMap::new(),
            escaped: false,
        }
    }

    fn pipeline(&self) -> ExtractLoadPipeline {
        ExtractLoadPipeline::new(
            self.source.clone(),
            self.target.clone(),
            self.tmp_dir.clone(),
            self.janitor.clone(),
        )
        .with_chunk_size(self.chunk_size)
    }

    async fn run_plan(&self, plan: &TablePlan) -> Result<u64, SyncError> {
        let source_table = plan.source_table.as_str().to_string();
        let table_metrics = self.metrics.for_table(plan.target_table.as_str());

        let has_baseline = self
            .registry
            .get(&plan.target_table)
            .await
            .map_err(|e| SyncError::ConfigError(e.to_string()))?
            .is_some();

        let rows = if !has_baseline {
            let mut action = BatchLoadAction::new(
                self.source.clone(),
                self.target.clone(),
                self.pipeline(),
                self.registry.clone(),
                self.clock.clone(),
            );
            action.run(plan, &source_table).await?;
            table_metrics.increment_batches(1);
            1
        } else {
            let incremental = IncrementalLoadAction::new(self.pipeline(), self.registry.clone(), self.clock.clone());
            let rows = incremental.run(plan, &source_table).await?;
            table_metrics.increment_records(rows);

            if plan.refresh_recent.is_enabled() {
                let refresher = RefreshRecentAction::new(
                    self.target.clone(),
                    self.pipeline(),
                    self.registry.clone(),
                    self.clock.clone(),
                );
                let refreshed = refresher.run(plan, &source_table).await?;
                table_metrics.increment_records(refreshed);
            }

            rows
        };

        Ok(rows)
    }
}

#[async_trait]
impl Actor<WorkerMsg> for SourceWorker {
    async fn on_start(&mut self, ctx: &ActorContext) -> Result<(), ActorError> {
        info!(source = %self.source_id, worker = ctx.name(), "source worker starting");
        Ok(())
    }

    async fn handle(&mut self, msg: WorkerMsg, _ctx: &ActorContext) -> Result<(), ActorError> {
        match msg {
            WorkerMsg::SetSelfRef(self_ref) => {
                self.self_ref = Some(self_ref);
                Ok(())
            }
            WorkerMsg::Shutdown => Ok(()),
            WorkerMsg::Tick if self.escaped => Err(ActorError::Sync(SyncError::ConfigError(format!(
                "source {} worker already escaped its tick loop; refusing to continue",
                self.source_id
            )))),
            WorkerMsg::Tick => {
                let mut any_rows = false;
                for plan in self.plans.clone() {
                    match self.run_plan(&plan).await {
                        Ok(rows) => {
                            any_rows |= rows > 0;
                            self.consecutive_failures.remove(plan.target_table.as_str());
                        }
                        Err(err) => {
                            self.metrics.for_table(plan.target_table.as_str()).increment_failures(1);
                            error!(source = %self.source_id, table = %plan.target_table, %err, "table sync cycle failed");

                            if is_out_of_table_scope(&err) {
                                self.escaped = true;
                                error!(source = %self.source_id, %err, "non-table-scoped failure; escaping worker loop");
                                return Err(ActorError::Sync(err));
                            }

                            let failures = self
                                .consecutive_failures
                                .entry(plan.target_table.as_str().to_string())
                                .or_insert(0);
                            *failures += 1;
                            if *failures >= CONSECUTIVE_FAILURE_THRESHOLD {
                                self.escaped = true;
                                error!(
                                    source = %self.source_id,
                                    table = %plan.target_table,
                                    failures = *failures,
                                    "table failed its consecutive-failure threshold; escaping worker loop"
                                );
                                return Err(ActorError::Sync(err));
                            }
                        }
                    }
                }

                if let Some(self_ref) = self.self_ref.clone() {
                    let scheduler =
                        TickScheduler::new(self_ref, self.cadence.immediate_delay, self.cadence.idle_delay);
                    let result = if any_rows {
                        scheduler.schedule_immediate().await
                    } else {
                        scheduler.schedule_idle().await
                    };
                    if result.is_err() {
                        // Mailbox closed means shutdown is underway; nothing to do.
                    }
                }
                Ok(())
            }
        }
    }

    async fn on_stop(&mut self, ctx: &ActorContext) -> Result<(), ActorError> {
        info!(source = %self.source_id, worker = ctx.name(), "source worker stopped");
        Ok(())
    }
}

/// Supervises one worker per source, fanning a shared `PlanProvider` out
/// by `SourceId` and keeping each source's cadence independent of the
/// others (spec §4.2).
pub struct Manager {
    workers: HashMap<SourceId, (ActorRef<WorkerMsg>, JoinHandle<()>)>,
    cancel_token: CancellationToken,
}

impl Manager {
    pub async fn start(
        plan_provider: Arc<dyn PlanProvider>,
        sources: HashMap<SourceId, Arc<dyn DatabaseAdapter>>,
        target: Arc<dyn DatabaseAdapter>,
        registry: Arc<TableRegistry>,
        clock: Arc<dyn Clock>,
        tmp_dir: PathBuf,
        janitor: Arc<dyn TempFileJanitor>,
        metrics: MetricsRegistry,
        cadence: WorkerCadence,
        chunk_size: usize,
    ) -> Result<Self, SyncError> {
        let plans = plan_provider.plans().await?;
        let mut plans_by_source: HashMap<SourceId, Vec<TablePlan>> = HashMap::new();
        for plan in plans {
            plans_by_source.entry(plan.source_id.clone()).or_default().push(plan);
        }

        let cancel_token = CancellationToken::new();
        let mut workers = HashMap::new();

        for (source_id, source) in sources {
            let plans = plans_by_source.remove(&source_id).unwrap_or_default();
            if plans.is_empty() {
                warn!(source = %source_id, "no table plans registered for source; skipping worker");
                continue;
            }

            let worker = SourceWorker::with_chunk_size(
                source_id.clone(),
                source,
                target.clone(),
                plans,
                registry.clone(),
                clock.clone(),
                tmp_dir.clone(),
                janitor.clone(),
                metrics.clone(),
                cadence.clone(),
                chunk_size,
            );
            let (actor_ref, handle) = spawn_actor(format!("source-worker:{source_id}"), 16, worker);
            actor_ref
                .send(WorkerMsg::SetSelfRef(actor_ref.clone()))
                .await
                .map_err(|_| SyncError::ConfigError(format!("worker for {source_id} failed to start")))?;
            actor_ref
                .send(WorkerMsg::Tick)
                .await
                .map_err(|_| SyncError::ConfigError(format!("worker for {source_id} failed to start")))?;
            workers.insert(source_id, (actor_ref, handle));
        }

        Ok(Self { workers, cancel_token })
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Signals every worker to stop after its current cycle and waits for
    /// all worker tasks to exit.
    pub async fn shutdown(self) {
        self.cancel_token.cancel();
        for (_, (actor_ref, _)) in &self.workers {
            let _ = actor_ref.send(WorkerMsg::Shutdown).await;
        }
        for (source_id, (actor_ref, handle)) in self.workers {
            drop(actor_ref);
            if let Err(err) = handle.await {
                error!(source = %source_id, %err, "source worker task panicked");
            }
        }
    }
}
