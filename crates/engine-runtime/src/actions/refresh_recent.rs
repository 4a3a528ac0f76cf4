//! `RefreshRecentAction`: heals late-arriving updates within a trailing
//! window, without waiting for the next full batch (spec §4.2, §5). Unlike
//! `IncrementalLoadAction`'s pure append, this clears the window on the
//! target first, so an UPDATE on the source that an append-only load would
//! otherwise miss is reflected by a delete-then-reinsert.
//!
//! Deletion propagation is only ever applied inside this window (spec
//! Non-goal: no deletion propagation outside the refresh-recent window).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use model::identifiers::TargetTable;
use model::plan::TablePlan;
use model::sync_metadata::SyncMetadata;
use tracing::info;

use connectors::adapter::DatabaseAdapter;
use connectors::query;
use engine_core::clock::Clock;
use engine_core::error::SyncError;
use engine_core::pipeline::ExtractLoadPipeline;
use engine_core::registry::TableRegistry;

use super::overlap::OVERLAP_SECS;

/// How far behind the source clock a row can lag before it's considered
/// durably written (spec §5's clock-skew tolerance).
const MAX_LAG_SECS: i64 = 30;

/// Trailing span the window predicate covers (spec §4.6: "a recent window
/// (default 1 week)"). `MAX_LAG_SECS`/`OVERLAP_SECS` are clock-skew margins
/// folded on top of this, not a substitute for it.
const WINDOW_SECS: i64 = 7 * 24 * 60 * 60;

pub struct RefreshRecentAction {
    target: Arc<dyn DatabaseAdapter>,
    pipeline: ExtractLoadPipeline,
    registry: Arc<TableRegistry>,
    clock: Arc<dyn Clock>,
}

impl RefreshRecentAction {
    pub fn new(
        target: Arc<dyn DatabaseAdapter>,
        pipeline: ExtractLoadPipeline,
        registry: Arc<TableRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            target,
            pipeline,
            registry,
            clock,
        }
    }

    pub async fn run(&self, plan: &TablePlan, source_table: &str) -> Result<u64, SyncError> {
        let Some(window_column) = plan.refresh_recent.window_column(&plan.timestamp_column) else {
            return Ok(0);
        };
        let target_table = plan.target_table.as_str();
        let span = tracing::info_span!("refresh_recent.load", table = %target_table);
        let _enter = span.enter();

        let since = window_start(self.clock.now(), plan.timestamp_in_millis);

        let delete_sql = query::delete_since(self.target.kind(), target_table, window_column, since);
        self.target
            .exec(&delete_sql)
            .await
            .map_err(|e| SyncError::load(target_table, e))?;

        let report = self
            .pipeline
            .run(plan, source_table, target_table, Some(since))
            .await?;

        let now = self.clock.now();
        let mut meta = self
            .registry
            .get(&plan.target_table)
            .await
            .map_err(|e| SyncError::ConfigError(e.to_string()))?
            .unwrap_or_else(|| SyncMetadata::new(TargetTable::new(target_table), now));
        meta.last_synced_at = now;
        meta.advance_last_row_at(report.last_row_at);
        self.registry
            .put(&meta)
            .await
            .map_err(|e| SyncError::ConfigError(e.to_string()))?;

        info!(table = %target_table, rows = report.rows, "refresh-recent window reloaded");
        Ok(report.rows)
    }
}

fn window_start(now: DateTime<Utc>, millis: bool) -> i64 {
    let cutoff = now - chrono::Duration::seconds(WINDOW_SECS + MAX_LAG_SECS + OVERLAP_SECS);
    if millis {
        cutoff.timestamp_millis()
    } else {
        cutoff.timestamp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_start_covers_the_full_week_plus_skew_margin() {
        let now = Utc::now();
        let seconds = window_start(now, false);
        assert_eq!(seconds, (now - chrono::Duration::seconds(WINDOW_SECS + 90)).timestamp());
    }

    #[test]
    fn window_start_respects_millis_unit() {
        let now = Utc::now();
        let millis = window_start(now, true);
        assert_eq!(millis, (now - chrono::Duration::seconds(WINDOW_SECS + 90)).timestamp_millis());
    }
}
