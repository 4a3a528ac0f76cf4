//! `BatchLoadAction`: the full-table refresh cycle a table runs through
//! once before incremental loads can begin, and periodically afterward to
//! re-baseline (spec §4.2, §5). Models the state machine explicitly so a
//! crash mid-cycle leaves an auditable `BatchState` rather than a bare
//! `Result`.

use std::sync::Arc;

use model::identifiers::TargetTable;
use model::plan::TablePlan;
use model::sync_metadata::SyncMetadata;
use tracing::info;

use connectors::adapter::DatabaseAdapter;
use engine_core::clock::Clock;
use engine_core::error::SyncError;
use engine_core::pipeline::ExtractLoadPipeline;
use engine_core::registry::TableRegistry;
use engine_core::retry::RetryPolicy;

use super::overlap::overlap_units;

/// Catch-up rounds stop once a round moves fewer than this many rows —
/// the remainder is close enough to live that the next scheduled cycle
/// (batch or incremental) will pick it up (DESIGN.md Open Question #3).
const CATCH_UP_ROW_FLOOR: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Prepared,
    Extracted,
    Loaded,
    CaughtUp,
    Committed,
    Done,
    Failed,
}

pub struct BatchLoadAction {
    source: Arc<dyn DatabaseAdapter>,
    target: Arc<dyn DatabaseAdapter>,
    pipeline: ExtractLoadPipeline,
    registry: Arc<TableRegistry>,
    clock: Arc<dyn Clock>,
    catch_up_policy: RetryPolicy,
    state: BatchState,
}

impl BatchLoadAction {
    pub fn new(
        source: Arc<dyn DatabaseAdapter>,
        target: Arc<dyn DatabaseAdapter>,
        pipeline: ExtractLoadPipeline,
        registry: Arc<TableRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            target,
            pipeline,
            registry,
            clock,
            catch_up_policy: RetryPolicy::for_post_load_catch_up(),
            state: BatchState::Idle,
        }
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub async fn run(&mut self, plan: &TablePlan, source_table: &str) -> Result<(), SyncError> {
        let target_table = plan.target_table.as_str();
        let staging_table = plan.target_table.staging_name();
        let span = tracing::info_span!("batch.load", table = %target_table);
        let _enter = span.enter();

        // Recorded before the extract starts, so the committed watermark
        // reflects what was actually visible at the start of the snapshot
        // rather than when the (possibly long) catch-up loop finished
        // (spec §4.4 commit semantics, §8 batch_start invariant).
        let batch_start = self.clock.now();

        if let Err(err) = self.prepare(plan, source_table, target_table, &staging_table).await {
            self.state = BatchState::Failed;
            return Err(err);
        }
        self.state = BatchState::Prepared;

        let staged = match self
            .pipeline
            .extract(plan, source_table, &staging_table, None)
            .await
        {
            Ok(staged) => staged,
            Err(err) => {
                self.state = BatchState::Failed;
                return Err(err);
            }
        };
        self.state = BatchState::Extracted;

        if let Err(err) = self.pipeline.load(&staging_table, &staged).await {
            self.state = BatchState::Failed;
            return Err(err);
        }
        self.state = BatchState::Loaded;

        let last_row_at = match self.catch_up(plan, source_table, &staging_table).await {
            Ok(last_row_at) => last_row_at,
            Err(err) => {
                self.state = BatchState::Failed;
                return Err(err);
            }
        };
        self.state = BatchState::CaughtUp;

        let switch_span = tracing::info_span!("batch.switch", table = %target_table);
        {
            let _enter = switch_span.enter();
            if let Err(err) = self
                .target
                .switch_table(&staging_table, target_table)
                .await
                .map_err(|e| SyncError::load(target_table, e))
            {
                self.state = BatchState::Failed;
                return Err(err);
            }
        }
        self.state = BatchState::Committed;

        let now = self.clock.now();
        let mut meta = SyncMetadata::new(TargetTable::new(target_table), now);
        meta.last_batch_synced_at = Some(batch_start);
        meta.advance_last_row_at(last_row_at);
        self.registry
            .put(&meta)
            .await
            .map_err(|e| SyncError::ConfigError(e.to_string()))?;

        self.state = BatchState::Done;
        info!(table = %target_table, "batch load committed");
        Ok(())
    }

    async fn prepare(
        &self,
        plan: &model::plan::TablePlan,
        source_table: &str,
        target_table: &str,
        staging_table: &str,
    ) -> Result<(), SyncError> {
        self.target
            .drop_table_if_exists(staging_table)
            .await
            .map_err(|e| SyncError::load(target_table, e))?;
        self.target
            .create_table_like(staging_table, target_table, None)
            .await
            .map_err(|e| SyncError::load(target_table, e))?;

        // Schema drift since the staging table's shape was last derived:
        // only ADD missing columns, never alter or drop (spec Non-goals).
        let target_schema = self
            .target
            .schema(target_table)
            .await
            .map_err(|e| SyncError::load(target_table, e))?;
        let source_schema = self
            .source
            .schema(source_table)
            .await
            .unwrap_or_else(|_| target_schema.clone());
        for column in &source_schema.columns {
            if !target_schema.has_column(&column.name) {
                self.target
                    .add_column(staging_table, &column.name, &column.data_type)
                    .await
                    .map_err(|e| SyncError::load(target_table, e))?;
            }
        }

        for (name, spec) in &plan.indexes {
            self.target
                .add_index(staging_table, name, spec)
                .await
                .map_err(|e| SyncError::load(target_table, e))?;
        }
        Ok(())
    }

    /// Re-extracts rows that arrived on the source during (or just after)
    /// the initial snapshot, at least once, continuing only while a round
    /// still moves at least `CATCH_UP_ROW_FLOOR` rows and the retry budget
    /// isn't exhausted — this is what lets a single late-arriving row land
    /// even when the initial snapshot itself was tiny.
    async fn catch_up(
        &self,
        plan: &TablePlan,
        source_table: &str,
        staging_table: &str,
    ) -> Result<Option<i64>, SyncError> {
        let mut last_row_at = self
            .target
            .max_timestamp(staging_table, &plan.timestamp_column)
            .await
            .map_err(|e| SyncError::load(staging_table, e))?;

        let mut attempt = 0;
        loop {
            if attempt >= self.catch_up_policy.max_attempts {
                break;
            }

            // Same overlap margin the incremental path applies: a row that
            // committed right at the previous round's watermark must still
            // be re-checked, not skipped (spec §4.2 post_load).
            let since = last_row_at.map(|t| t - overlap_units(plan.timestamp_in_millis));
            let staged = self
                .pipeline
                .extract(plan, source_table, staging_table, since)
                .await?;
            let rows_moved = staged.rows;
            if rows_moved == 0 {
                break;
            }
            self.pipeline.load(staging_table, &staged).await?;
            last_row_at = self
                .target
                .max_timestamp(staging_table, &plan.timestamp_column)
                .await
                .map_err(|e| SyncError::load(staging_table, e))?
                .or(last_row_at);
            attempt += 1;

            if rows_moved < CATCH_UP_ROW_FLOOR {
                break;
            }
        }

        Ok(last_row_at)
    }
}
