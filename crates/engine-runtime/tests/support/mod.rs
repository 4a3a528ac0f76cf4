//! In-memory `DatabaseAdapter` double, so `BatchLoadAction`/
//! `IncrementalLoadAction`/`RefreshRecentAction` can be driven end to end
//! without a real MySQL/Postgres server, in the style of the teacher's
//! `engine-tests` crate but against fakes rather than testcontainers
//! (no docker available here).

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use connectors::adapter::{DatabaseAdapter, DatabaseKind};
use connectors::error::DbError;
use model::schema::{ColumnSchema, IndexMap, IndexSpec, TableSchema};
use model::value::DataType;

pub type FakeRow = BTreeMap<String, String>;

#[derive(Clone, Debug, Default)]
struct FakeTable {
    schema: TableSchema,
    indexes: IndexMap,
    rows: Vec<FakeRow>,
}

/// Substring present in every meta-table statement regardless of the
/// dialect's identifier quoting, used to route `exec`/`query_rows` calls
/// against `meta_last_sync_times` to the in-memory map below instead of
/// the regular table store.
const META_TABLE_MARKER: &str = "meta_last_sync_times";

pub struct FakeAdapter {
    kind: DatabaseKind,
    tables: Mutex<std::collections::HashMap<String, FakeTable>>,
    fail_extract: AtomicBool,
    extract_calls: AtomicU32,
    meta: Mutex<BTreeMap<String, FakeRow>>,
    meta_exists: AtomicBool,
}

impl FakeAdapter {
    pub fn new(kind: DatabaseKind) -> Self {
        Self {
            kind,
            tables: Mutex::new(std::collections::HashMap::new()),
            fail_extract: AtomicBool::new(false),
            extract_calls: AtomicU32::new(0),
            meta: Mutex::new(BTreeMap::new()),
            meta_exists: AtomicBool::new(false),
        }
    }

    /// How many times `extract_to_file` has been called, so a test can
    /// confirm a catch-up round actually re-queried the source rather
    /// than relying on timing.
    pub fn extract_call_count(&self) -> u32 {
        self.extract_calls.load(Ordering::SeqCst)
    }

    /// Makes every subsequent `extract_to_file` call fail, simulating a
    /// source that consistently can't be queried (scenario: "consistent
    /// incremental failure").
    pub fn set_fail_extract(&self, fail: bool) {
        self.fail_extract.store(fail, Ordering::SeqCst);
    }

    /// Drops a column from both the schema and every existing row, for
    /// the "column dropped mid-sync" scenario.
    pub fn drop_column(&self, table: &str, column: &str) {
        let mut tables = self.tables.lock().unwrap();
        let t = tables.get_mut(table).expect("table must be seeded first");
        t.schema.columns.retain(|c| c.name != column);
        for row in &mut t.rows {
            row.remove(column);
        }
    }

    /// Seeds a table with a schema and initial rows, as if it already
    /// existed on the engine (used to stand in for a pre-provisioned
    /// live target table, or a source table's starting contents).
    pub fn seed_table(&self, name: &str, schema: TableSchema, rows: Vec<FakeRow>) {
        self.tables.lock().unwrap().insert(
            name.to_string(),
            FakeTable {
                schema,
                indexes: IndexMap::new(),
                rows,
            },
        );
    }

    pub fn insert_row(&self, table: &str, row: FakeRow) {
        let mut tables = self.tables.lock().unwrap();
        let entry = tables.get_mut(table).expect("table must be seeded first");
        entry.rows.push(row);
    }

    pub fn rows(&self, table: &str) -> Vec<FakeRow> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.rows(table).len()
    }

    pub fn table_exists_sync(&self, table: &str) -> bool {
        self.tables.lock().unwrap().contains_key(table)
    }

    fn quote_char(&self) -> char {
        match self.kind {
            DatabaseKind::MySql => '`',
            DatabaseKind::Postgres => '"',
        }
    }

    fn unquote(&self, ident: &str) -> String {
        let q = self.quote_char();
        let doubled: String = [q, q].iter().collect();
        ident
            .trim()
            .trim_start_matches(q)
            .trim_end_matches(q)
            .replace(&doubled, &q.to_string())
    }

    /// Parses the fixed `SELECT <cols> FROM <table> [WHERE <col> > <since>]`
    /// template `connectors::query::select_since` emits.
    fn parse_select(&self, sql: &str) -> (Vec<String>, String, Option<(String, i64)>) {
        let rest = sql.strip_prefix("SELECT ").expect("select statement");
        let (cols_part, rest) = rest.split_once(" FROM ").expect("FROM clause");
        let columns = if cols_part == "*" {
            Vec::new()
        } else {
            cols_part.split(", ").map(|c| self.unquote(c)).collect()
        };
        let (table_part, predicate) = match rest.split_once(" WHERE ") {
            Some((table, cond)) => {
                let (col, since) = cond.split_once(" > ").expect("comparison predicate");
                (
                    table,
                    Some((self.unquote(col), since.trim().parse::<i64>().expect("numeric since"))),
                )
            }
            None => (rest, None),
        };
        (columns, self.unquote(table_part), predicate)
    }

    /// Parses the fixed `DELETE FROM <table> WHERE <col> > <since>`
    /// template `connectors::query::delete_since` emits.
    fn parse_delete(&self, sql: &str) -> (String, String, i64) {
        let rest = sql.strip_prefix("DELETE FROM ").expect("delete statement");
        let (table_part, cond) = rest.split_once(" WHERE ").expect("WHERE clause");
        let (col, since) = cond.split_once(" > ").expect("comparison predicate");
        (
            self.unquote(table_part),
            self.unquote(col),
            since.trim().parse::<i64>().expect("numeric since"),
        )
    }

    /// Parses one `connectors::query::upsert_meta_row` statement into its
    /// four column values (`target_table`, `last_synced_at`,
    /// `last_batch_synced_at`, `last_row_at`), the last two `None` where
    /// the statement carries a literal `NULL`.
    fn parse_meta_upsert(&self, sql: &str) -> FakeRow {
        let values_part = sql
            .split("VALUES (")
            .nth(1)
            .and_then(|rest| rest.split(") ON ").next())
            .expect("upsert statement");
        let parts: Vec<&str> = values_part.split(", ").collect();
        let strip = |s: &str| s.trim_matches('\'').to_string();

        let mut row = FakeRow::new();
        row.insert("target_table".to_string(), strip(parts[0]));
        row.insert("last_synced_at".to_string(), strip(parts[1]));
        if parts[2] != "NULL" {
            row.insert("last_batch_synced_at".to_string(), strip(parts[2]));
        }
        if parts[3] != "NULL" {
            row.insert("last_row_at".to_string(), strip(parts[3]));
        }
        row
    }

    /// Pulls the `target_table` a meta-row `SELECT`/`DELETE` filters on,
    /// if the statement carries a `WHERE` clause at all.
    fn parse_meta_target_table(&self, sql: &str) -> Option<String> {
        let (_, cond) = sql.split_once(" WHERE ")?;
        let (_, value) = cond.split_once(" = ")?;
        Some(value.trim_matches('\'').to_string())
    }
}

#[async_trait]
impl DatabaseAdapter for FakeAdapter {
    fn kind(&self) -> DatabaseKind {
        self.kind
    }

    async fn connection_reset(&self) -> Result<(), DbError> {
        Ok(())
    }

    async fn table_exists(&self, table: &str) -> Result<bool, DbError> {
        Ok(self.tables.lock().unwrap().contains_key(table))
    }

    async fn schema(&self, table: &str) -> Result<TableSchema, DbError> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .map(|t| t.schema.clone())
            .ok_or_else(|| DbError::NoSuchTable(table.to_string()))
    }

    async fn indexes(&self, table: &str) -> Result<IndexMap, DbError> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .map(|t| t.indexes.clone())
            .ok_or_else(|| DbError::NoSuchTable(table.to_string()))
    }

    async fn max_timestamp(&self, table: &str, column: &str) -> Result<Option<i64>, DbError> {
        let tables = self.tables.lock().unwrap();
        let Some(t) = tables.get(table) else {
            return Ok(None);
        };
        Ok(t.rows
            .iter()
            .filter_map(|row| row.get(column).and_then(|v| v.parse::<i64>().ok()))
            .max())
    }

    async fn extract_to_file(&self, sql: &str, file: &Path, _charset: Option<&str>) -> Result<(), DbError> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_extract.load(Ordering::SeqCst) {
            return Err(DbError::Query("stubbed extract failure".to_string()));
        }

        let (columns, table, predicate) = self.parse_select(sql);
        let tables = self.tables.lock().unwrap();
        let t = tables.get(&table).ok_or_else(|| DbError::NoSuchTable(table.clone()))?;

        let columns = if columns.is_empty() { t.schema.column_names() } else { columns };

        let mut out = String::new();
        for row in &t.rows {
            if let Some((col, since)) = &predicate {
                let value = row.get(col).and_then(|v| v.parse::<i64>().ok()).unwrap_or(i64::MIN);
                if value <= *since {
                    continue;
                }
            }
            let line = columns
                .iter()
                .map(|c| row.get(c).cloned().unwrap_or_default())
                .collect::<Vec<_>>()
                .join(",");
            out.push_str(&line);
            out.push('\n');
        }
        drop(tables);

        std::fs::write(file, out).map_err(DbError::Io)?;
        Ok(())
    }

    async fn load_from_file(&self, table: &str, columns: &[String], file: &Path) -> Result<(), DbError> {
        let content = std::fs::read_to_string(file).map_err(DbError::Io)?;
        let mut tables = self.tables.lock().unwrap();
        let t = tables.get_mut(table).ok_or_else(|| DbError::NoSuchTable(table.to_string()))?;
        let pk_columns = t.schema.primary_key_columns();
        let unique_indexes: Vec<IndexSpec> = t.indexes.values().filter(|i| i.unique).cloned().collect();

        for line in content.lines().filter(|l| !l.is_empty()) {
            let values: Vec<&str> = line.split(',').collect();
            let mut row: FakeRow = BTreeMap::new();
            for (col, value) in columns.iter().zip(values.iter()) {
                row.insert(col.clone(), value.to_string());
            }

            if !pk_columns.is_empty() {
                let matches_pk = |existing: &FakeRow| {
                    pk_columns.iter().all(|pk| existing.get(pk) == row.get(pk))
                };
                if let Some(existing) = t.rows.iter_mut().find(|r| matches_pk(r)) {
                    *existing = row;
                    continue;
                }
            }

            let conflicts_unique = unique_indexes.iter().any(|spec| {
                t.rows.iter().any(|existing| {
                    spec.columns.iter().all(|c| existing.get(c) == row.get(c)) && !spec.columns.is_empty()
                })
            });
            if conflicts_unique {
                continue;
            }

            t.rows.push(row);
        }

        Ok(())
    }

    async fn create_table_like(&self, new_table: &str, existing_table: &str, _charset: Option<&str>) -> Result<(), DbError> {
        let mut tables = self.tables.lock().unwrap();
        let template = tables
            .get(existing_table)
            .ok_or_else(|| DbError::NoSuchTable(existing_table.to_string()))?
            .schema
            .clone();
        tables.insert(
            new_table.to_string(),
            FakeTable {
                schema: template,
                indexes: IndexMap::new(),
                rows: Vec::new(),
            },
        );
        Ok(())
    }

    async fn drop_table_if_exists(&self, table: &str) -> Result<(), DbError> {
        self.tables.lock().unwrap().remove(table);
        Ok(())
    }

    async fn switch_table(&self, new_table: &str, live_table: &str) -> Result<(), DbError> {
        let mut tables = self.tables.lock().unwrap();
        let staged = tables
            .remove(new_table)
            .ok_or_else(|| DbError::NoSuchTable(new_table.to_string()))?;
        tables.insert(live_table.to_string(), staged);
        Ok(())
    }

    async fn add_column(&self, table: &str, column: &str, data_type: &DataType) -> Result<(), DbError> {
        let mut tables = self.tables.lock().unwrap();
        let t = tables.get_mut(table).ok_or_else(|| DbError::NoSuchTable(table.to_string()))?;
        if !t.schema.has_column(column) {
            t.schema.columns.push(ColumnSchema {
                name: column.to_string(),
                data_type: data_type.clone(),
                primary_key: false,
                nullable: true,
                default: None,
            });
        }
        Ok(())
    }

    async fn add_index(&self, table: &str, name: &str, spec: &IndexSpec) -> Result<(), DbError> {
        let mut tables = self.tables.lock().unwrap();
        let t = tables.get_mut(table).ok_or_else(|| DbError::NoSuchTable(table.to_string()))?;
        t.indexes.insert(name.to_string(), spec.clone());
        Ok(())
    }

    async fn remove_indexes_except(&self, table: &str, keep: &HashSet<String>) -> Result<(), DbError> {
        let mut tables = self.tables.lock().unwrap();
        let t = tables.get_mut(table).ok_or_else(|| DbError::NoSuchTable(table.to_string()))?;
        t.indexes.retain(|name, _| keep.contains(name));
        Ok(())
    }

    async fn exec(&self, sql: &str) -> Result<u64, DbError> {
        if sql.contains(META_TABLE_MARKER) {
            if sql.starts_with("CREATE TABLE IF NOT EXISTS") {
                self.meta_exists.store(true, Ordering::SeqCst);
                return Ok(0);
            }
            if !self.meta_exists.load(Ordering::SeqCst) {
                return Err(DbError::NoSuchTable(META_TABLE_MARKER.to_string()));
            }
            if sql.starts_with("INSERT INTO") {
                let row = self.parse_meta_upsert(sql);
                let target = row.get("target_table").cloned().unwrap_or_default();
                self.meta.lock().unwrap().insert(target, row);
                return Ok(1);
            }
            if sql.starts_with("DELETE FROM") {
                if let Some(target) = self.parse_meta_target_table(sql) {
                    self.meta.lock().unwrap().remove(&target);
                }
                return Ok(1);
            }
            return Ok(0);
        }

        let (table, column, since) = self.parse_delete(sql);
        let mut tables = self.tables.lock().unwrap();
        let t = tables.get_mut(&table).ok_or_else(|| DbError::NoSuchTable(table.clone()))?;
        let before = t.rows.len();
        t.rows.retain(|row| {
            let value = row.get(&column).and_then(|v| v.parse::<i64>().ok()).unwrap_or(i64::MIN);
            value <= since
        });
        Ok((before - t.rows.len()) as u64)
    }

    async fn query_rows(&self, sql: &str) -> Result<Vec<FakeRow>, DbError> {
        if !sql.contains(META_TABLE_MARKER) {
            return Ok(Vec::new());
        }
        if !self.meta_exists.load(Ordering::SeqCst) {
            return Err(DbError::NoSuchTable(META_TABLE_MARKER.to_string()));
        }

        let meta = self.meta.lock().unwrap();
        match self.parse_meta_target_table(sql) {
            Some(target) => Ok(meta.get(&target).cloned().into_iter().collect()),
            None => Ok(meta.values().cloned().collect()),
        }
    }
}

pub fn col(name: &str, data_type: DataType, primary_key: bool) -> ColumnSchema {
    ColumnSchema {
        name: name.to_string(),
        data_type,
        primary_key,
        nullable: !primary_key,
        default: None,
    }
}
