//! End-to-end scenario coverage driven against `FakeAdapter` instead of a
//! real MySQL/Postgres server, so a full batch/incremental cycle can be
//! exercised without docker/testcontainers in this environment.
//!
//! Scenario 7 ("timezone normalization") is intentionally not covered here:
//! bulk extraction is delegated entirely to a native client subprocess
//! (`DatabaseAdapter::extract_to_file`), so there is no Rust-level
//! timestamp-decoding or TZ-normalization path in this crate to exercise —
//! it is an operational concern of the subprocess invocation, not
//! application code.

mod support;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{TimeZone, Utc};

use connectors::adapter::DatabaseKind;
use engine_core::clock::TestClock;
use engine_core::error::SyncError;
use engine_core::pipeline::{DeletingJanitor, ExtractLoadPipeline};
use engine_core::registry::TableRegistry;
use engine_runtime::actions::{BatchLoadAction, BatchState, IncrementalLoadAction};
use model::identifiers::TargetTable;
use model::plan::{ColumnSelection, TablePlan};
use model::schema::{IndexSpec, TableSchema};
use model::sync_metadata::SyncMetadata;
use model::value::DataType;

use support::{col, FakeAdapter};

fn row(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

/// Scenario 1: batch load with a rename-based switch. One row on the
/// source lands on the live target, the source is untouched, and the
/// staging table is gone once the cycle commits.
#[tokio::test]
async fn batch_load_switches_staging_into_live_table() {
    let source = Arc::new(FakeAdapter::new(DatabaseKind::MySql));
    let target = Arc::new(FakeAdapter::new(DatabaseKind::MySql));

    let schema = TableSchema::new(vec![
        col("id", DataType::Int, true),
        col("col1", DataType::Text, false),
        col("updated_at", DataType::BigInt, false),
    ]);
    source.seed_table("orders", schema.clone(), vec![row(&[("id", "1"), ("col1", "a"), ("updated_at", "100")])]);
    target.seed_table("orders", schema, vec![]);

    let tmp = tempfile::tempdir().unwrap();
    let pipeline = ExtractLoadPipeline::new(source.clone(), target.clone(), tmp.path(), Arc::new(DeletingJanitor));
    let registry = Arc::new(TableRegistry::new(target.clone()));
    registry.ensure_storage_exists().await.unwrap();
    let clock = Arc::new(TestClock::at(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()));

    let plan = TablePlan::builder("src1", "orders", "orders")
        .columns(ColumnSelection::List(vec!["id".into(), "col1".into(), "updated_at".into()]))
        .timestamp_column("updated_at")
        .build();

    let mut action = BatchLoadAction::new(source.clone(), target.clone(), pipeline, registry, clock);
    action.run(&plan, "orders").await.unwrap();

    assert_eq!(action.state(), BatchState::Done);
    assert_eq!(target.row_count("orders"), 1);
    assert_eq!(source.row_count("orders"), 1, "source must be untouched by a batch load");
    assert!(!target.table_exists_sync("new_orders"), "staging table must not survive a committed switch");
}

/// Scenario 2: a column dropped from the source mid-sync must not error
/// on the next batch. Requires `ColumnSelection::All` so the projected
/// column list is re-resolved against the post-drop source schema each
/// run, rather than an explicit list that would still name the dropped
/// column.
#[tokio::test]
async fn batch_load_tolerates_a_column_dropped_from_source() {
    let source = Arc::new(FakeAdapter::new(DatabaseKind::MySql));
    let target = Arc::new(FakeAdapter::new(DatabaseKind::MySql));

    let schema = TableSchema::new(vec![
        col("id", DataType::Int, true),
        col("col1", DataType::Text, false),
        col("updated_at", DataType::BigInt, false),
    ]);
    source.seed_table("orders2", schema.clone(), vec![row(&[("id", "1"), ("col1", "a"), ("updated_at", "100")])]);
    target.seed_table("orders2", schema, vec![]);

    let tmp = tempfile::tempdir().unwrap();
    let registry = Arc::new(TableRegistry::new(target.clone()));
    registry.ensure_storage_exists().await.unwrap();
    let clock = Arc::new(TestClock::at(Utc::now()));

    let plan = TablePlan::builder("src1", "orders2", "orders2")
        .columns(ColumnSelection::All)
        .timestamp_column("updated_at")
        .build();

    let pipeline = ExtractLoadPipeline::new(source.clone(), target.clone(), tmp.path(), Arc::new(DeletingJanitor));
    let mut action = BatchLoadAction::new(source.clone(), target.clone(), pipeline, registry.clone(), clock.clone());
    action.run(&plan, "orders2").await.unwrap();
    assert_eq!(target.rows("orders2")[0].get("col1"), Some(&"a".to_string()));

    source.drop_column("orders2", "col1");

    let tmp2 = tempfile::tempdir().unwrap();
    let pipeline2 = ExtractLoadPipeline::new(source.clone(), target.clone(), tmp2.path(), Arc::new(DeletingJanitor));
    let mut action2 = BatchLoadAction::new(source, target.clone(), pipeline2, registry, clock);
    let result = action2.run(&plan, "orders2").await;

    assert!(result.is_ok(), "dropping a source column must not fail the next batch: {result:?}");
    let rows = target.rows("orders2");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("id"), Some(&"1".to_string()));
    assert_eq!(rows[0].get("col1"), None, "dropped column must not reappear in the reloaded row");
}

/// Scenario 3: duplicate-key tolerance. Two source rows sharing a
/// unique-indexed value must collapse to one row on the target, exercising
/// `TablePlan.indexes` actually reaching the staging table via `add_index`.
#[tokio::test]
async fn batch_load_collapses_duplicates_on_unique_index() {
    let source = Arc::new(FakeAdapter::new(DatabaseKind::MySql));
    let target = Arc::new(FakeAdapter::new(DatabaseKind::MySql));

    let schema = TableSchema::new(vec![
        col("id", DataType::Int, true),
        col("col1", DataType::Text, false),
        col("updated_at", DataType::BigInt, false),
    ]);
    source.seed_table(
        "orders3",
        schema.clone(),
        vec![
            row(&[("id", "1"), ("col1", "dup"), ("updated_at", "100")]),
            row(&[("id", "2"), ("col1", "dup"), ("updated_at", "101")]),
        ],
    );
    target.seed_table("orders3", schema, vec![]);

    let tmp = tempfile::tempdir().unwrap();
    let pipeline = ExtractLoadPipeline::new(source.clone(), target.clone(), tmp.path(), Arc::new(DeletingJanitor));
    let registry = Arc::new(TableRegistry::new(target.clone()));
    registry.ensure_storage_exists().await.unwrap();
    let clock = Arc::new(TestClock::at(Utc::now()));

    let plan = TablePlan::builder("src1", "orders3", "orders3")
        .columns(ColumnSelection::All)
        .timestamp_column("updated_at")
        .index("col1_unique", IndexSpec { columns: vec!["col1".into()], unique: true })
        .build();

    let mut action = BatchLoadAction::new(source, target.clone(), pipeline, registry, clock);
    action.run(&plan, "orders3").await.unwrap();

    assert_eq!(target.row_count("orders3"), 1, "second row sharing the unique key must be dropped, not duplicated");
}

/// Scenario 4: partial-load recovery. A stray staging table left over from
/// a previous crashed cycle must not leak into the live table — `prepare`
/// drops it before re-deriving a fresh one from the live schema.
#[tokio::test]
async fn batch_load_recovers_from_a_stray_staging_table() {
    let source = Arc::new(FakeAdapter::new(DatabaseKind::MySql));
    let target = Arc::new(FakeAdapter::new(DatabaseKind::MySql));

    let schema = TableSchema::new(vec![
        col("id", DataType::Int, true),
        col("updated_at", DataType::BigInt, false),
    ]);
    source.seed_table(
        "orders4",
        schema.clone(),
        vec![row(&[("id", "1"), ("updated_at", "100")]), row(&[("id", "2"), ("updated_at", "101")])],
    );
    target.seed_table("orders4", schema.clone(), vec![]);
    // A stray staging table from a crashed previous cycle, with stale data.
    target.seed_table("new_orders4", schema, vec![row(&[("id", "99"), ("updated_at", "1")])]);

    let tmp = tempfile::tempdir().unwrap();
    let pipeline = ExtractLoadPipeline::new(source.clone(), target.clone(), tmp.path(), Arc::new(DeletingJanitor));
    let registry = Arc::new(TableRegistry::new(target.clone()));
    registry.ensure_storage_exists().await.unwrap();
    let clock = Arc::new(TestClock::at(Utc::now()));

    let plan = TablePlan::builder("src1", "orders4", "orders4")
        .columns(ColumnSelection::All)
        .timestamp_column("updated_at")
        .build();

    let mut action = BatchLoadAction::new(source.clone(), target.clone(), pipeline, registry, clock);
    action.run(&plan, "orders4").await.unwrap();

    let mut ids: Vec<String> = target
        .rows("orders4")
        .into_iter()
        .map(|r| r.get("id").cloned().unwrap())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["1".to_string(), "2".to_string()], "live table must match the source exactly, stray row gone");
    assert!(!target.table_exists_sync("new_orders4"));
}

/// Scenario 5: catch-up after the initial extract always runs at least
/// one round, even when the first snapshot itself was tiny — confirmed
/// by counting `extract_to_file` calls rather than racing real time.
#[tokio::test]
async fn batch_load_always_runs_a_catch_up_round() {
    let source = Arc::new(FakeAdapter::new(DatabaseKind::MySql));
    let target = Arc::new(FakeAdapter::new(DatabaseKind::MySql));

    let schema = TableSchema::new(vec![
        col("id", DataType::Int, true),
        col("updated_at", DataType::BigInt, false),
    ]);
    source.seed_table("orders5", schema.clone(), vec![row(&[("id", "1"), ("updated_at", "100")])]);
    target.seed_table("orders5", schema, vec![]);

    let tmp = tempfile::tempdir().unwrap();
    let pipeline = ExtractLoadPipeline::new(source.clone(), target.clone(), tmp.path(), Arc::new(DeletingJanitor));
    let registry = Arc::new(TableRegistry::new(target.clone()));
    registry.ensure_storage_exists().await.unwrap();
    let clock = Arc::new(TestClock::at(Utc::now()));

    let plan = TablePlan::builder("src1", "orders5", "orders5")
        .columns(ColumnSelection::All)
        .timestamp_column("updated_at")
        .build();

    let mut action = BatchLoadAction::new(source.clone(), target.clone(), pipeline, registry, clock);
    action.run(&plan, "orders5").await.unwrap();

    assert!(
        source.extract_call_count() >= 2,
        "catch-up must re-query the source at least once after the initial snapshot, got {} calls",
        source.extract_call_count()
    );
    assert_eq!(target.row_count("orders5"), 1);
}

/// Scenario 6: a source that consistently fails to extract must surface
/// the failure rather than being swallowed into an empty success.
#[tokio::test]
async fn incremental_load_propagates_a_consistently_failing_extract() {
    let source = Arc::new(FakeAdapter::new(DatabaseKind::MySql));
    let target = Arc::new(FakeAdapter::new(DatabaseKind::MySql));

    let schema = TableSchema::new(vec![
        col("id", DataType::Int, true),
        col("updated_at", DataType::BigInt, false),
    ]);
    source.seed_table("orders6", schema.clone(), vec![]);
    target.seed_table("orders6", schema, vec![]);
    source.set_fail_extract(true);

    let tmp = tempfile::tempdir().unwrap();
    let pipeline = ExtractLoadPipeline::new(source, target, tmp.path(), Arc::new(DeletingJanitor));
    let registry = Arc::new(TableRegistry::new(target.clone()));
    registry.ensure_storage_exists().await.unwrap();
    let clock = Arc::new(TestClock::at(Utc::now()));

    let plan = TablePlan::builder("src1", "orders6", "orders6")
        .columns(ColumnSelection::All)
        .timestamp_column("updated_at")
        .build();

    let action = IncrementalLoadAction::new(pipeline, registry, clock);
    let result = action.run(&plan, "orders6").await;

    assert!(matches!(result, Err(SyncError::ExtractError { .. })), "got {result:?}");
}

/// Scenario 8: a watermark recorded in milliseconds subtracts the
/// millis-scaled overlap, not the seconds constant, so a row that
/// committed just inside the overlap window is still re-checked.
#[tokio::test]
async fn incremental_load_scales_overlap_to_millis() {
    let source = Arc::new(FakeAdapter::new(DatabaseKind::MySql));
    let target = Arc::new(FakeAdapter::new(DatabaseKind::MySql));

    let schema = TableSchema::new(vec![
        col("id", DataType::Int, true),
        col("updated_at", DataType::BigInt, false),
    ]);
    // Falls inside (last_row_at - 60_000, last_row_at]: only visible if the
    // incremental load subtracts the overlap in milliseconds, not seconds.
    source.seed_table("orders8", schema.clone(), vec![row(&[("id", "1"), ("updated_at", "50000")])]);
    target.seed_table("orders8", schema, vec![]);

    let tmp = tempfile::tempdir().unwrap();
    let pipeline = ExtractLoadPipeline::new(source, target.clone(), tmp.path(), Arc::new(DeletingJanitor));
    let registry = Arc::new(TableRegistry::new(target.clone()));
    registry.ensure_storage_exists().await.unwrap();
    registry
        .put(&SyncMetadata {
            target_table: TargetTable::new("orders8"),
            last_synced_at: Utc::now(),
            last_batch_synced_at: None,
            last_row_at: Some(100_000),
        })
        .await
        .unwrap();
    let clock = Arc::new(TestClock::at(Utc::now()));

    let plan = TablePlan::builder("src1", "orders8", "orders8")
        .columns(ColumnSelection::All)
        .timestamp_column("updated_at")
        .timestamp_in_millis(true)
        .build();

    let action = IncrementalLoadAction::new(pipeline, registry, clock);
    let rows_moved = action.run(&plan, "orders8").await.unwrap();

    assert_eq!(rows_moved, 1, "row at 50_000ms must be caught by a 60_000ms-scaled overlap against a 100_000ms watermark");
    assert_eq!(target.row_count("orders8"), 1);
}
