//! Dialect-aware SQL rendering. Adapted from the teacher's
//! `planner::query::{builder, renderer}` pair, trimmed down from a general
//! AST to the fixed handful of statements the sync pipeline issues: a
//! timestamp-filtered select, `CREATE TABLE LIKE`, `DROP TABLE IF EXISTS`,
//! the staging-table swap, `ADD COLUMN`/`ADD INDEX`, and index drops.

use model::schema::IndexSpec;
use model::value::DataType;

use crate::adapter::DatabaseKind;

pub fn quote_ident(kind: DatabaseKind, ident: &str) -> String {
    match kind {
        DatabaseKind::MySql => format!("`{}`", ident.replace('`', "``")),
        DatabaseKind::Postgres => format!("\"{}\"", ident.replace('"', "\"\"")),
    }
}

pub fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// `SELECT <columns> FROM <table> [WHERE <timestamp_column> > <since>]`.
/// `since` is in the same unit (seconds or millis) as the column itself —
/// the caller is responsible for picking the right constant.
pub fn select_since(
    kind: DatabaseKind,
    table: &str,
    columns: &[String],
    timestamp_column: Option<&str>,
    since: Option<i64>,
) -> String {
    let cols = if columns.is_empty() {
        "*".to_string()
    } else {
        columns
            .iter()
            .map(|c| quote_ident(kind, c))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let mut sql = format!("SELECT {} FROM {}", cols, quote_ident(kind, table));
    if let (Some(col), Some(since)) = (timestamp_column, since) {
        sql.push_str(&format!(" WHERE {} > {}", quote_ident(kind, col), since));
    }
    sql
}

pub fn create_table_like(kind: DatabaseKind, new_table: &str, existing: &str) -> String {
    match kind {
        DatabaseKind::MySql => format!(
            "CREATE TABLE {} LIKE {}",
            quote_ident(kind, new_table),
            quote_ident(kind, existing)
        ),
        DatabaseKind::Postgres => format!(
            "CREATE TABLE {} (LIKE {} INCLUDING ALL)",
            quote_ident(kind, new_table),
            quote_ident(kind, existing)
        ),
    }
}

pub fn drop_table_if_exists(kind: DatabaseKind, table: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", quote_ident(kind, table))
}

/// `DELETE FROM <table> WHERE <window_column> > <since>`, used to clear a
/// table's refresh-recent window before re-loading it.
pub fn delete_since(kind: DatabaseKind, table: &str, window_column: &str, since: i64) -> String {
    format!(
        "DELETE FROM {} WHERE {} > {}",
        quote_ident(kind, table),
        quote_ident(kind, window_column),
        since
    )
}

/// The staging-table swap. MySQL can do this as a single atomic
/// `RENAME TABLE`; Postgres has no multi-rename primitive so the caller
/// must wrap the two statements in a transaction itself (spec §6).
pub fn switch_table_statements(kind: DatabaseKind, new_table: &str, live_table: &str) -> Vec<String> {
    match kind {
        DatabaseKind::MySql => {
            let old = format!("old_{}", live_table);
            vec![format!(
                "RENAME TABLE {} TO {}, {} TO {}",
                quote_ident(kind, live_table),
                quote_ident(kind, &old),
                quote_ident(kind, new_table),
                quote_ident(kind, live_table),
            ), format!("DROP TABLE IF EXISTS {}", quote_ident(kind, &old))]
        }
        DatabaseKind::Postgres => vec![
            format!("DROP TABLE IF EXISTS {}", quote_ident(kind, live_table)),
            format!(
                "ALTER TABLE {} RENAME TO {}",
                quote_ident(kind, new_table),
                quote_ident(kind, live_table)
            ),
        ],
    }
}

pub fn add_column(kind: DatabaseKind, table: &str, column: &str, data_type: &DataType) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        quote_ident(kind, table),
        quote_ident(kind, column),
        render_type(kind, data_type)
    )
}

pub fn add_index(kind: DatabaseKind, table: &str, name: &str, spec: &IndexSpec) -> String {
    let unique = if spec.unique { "UNIQUE " } else { "" };
    let cols = spec
        .columns
        .iter()
        .map(|c| quote_ident(kind, c))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE {}INDEX {} ON {} ({})",
        unique,
        quote_ident(kind, name),
        quote_ident(kind, table),
        cols
    )
}

pub fn drop_index(kind: DatabaseKind, table: &str, name: &str) -> String {
    match kind {
        DatabaseKind::MySql => format!(
            "ALTER TABLE {} DROP INDEX {}",
            quote_ident(kind, table),
            quote_ident(kind, name)
        ),
        DatabaseKind::Postgres => format!("DROP INDEX IF EXISTS {}", quote_ident(kind, name)),
    }
}

/// The max-column-value expression used to compute `last_row_at`, in the
/// same unit (seconds or millis) the caller declares.
pub fn max_epoch(kind: DatabaseKind, table: &str, column: &str, millis: bool) -> String {
    let col = quote_ident(kind, column);
    let table = quote_ident(kind, table);
    match (kind, millis) {
        (DatabaseKind::MySql, true) => {
            format!("SELECT UNIX_TIMESTAMP(MAX({})) * 1000 AS max_ts FROM {}", col, table)
        }
        (DatabaseKind::MySql, false) => {
            format!("SELECT UNIX_TIMESTAMP(MAX({})) AS max_ts FROM {}", col, table)
        }
        (DatabaseKind::Postgres, true) => format!(
            "SELECT EXTRACT(EPOCH FROM MAX({})) * 1000 AS max_ts FROM {}",
            col, table
        ),
        (DatabaseKind::Postgres, false) => {
            format!("SELECT EXTRACT(EPOCH FROM MAX({})) AS max_ts FROM {}", col, table)
        }
    }
}

/// Name of the target-side table the registry persists watermarks in
/// (spec §4.1, §6). All columns are TEXT: epoch millis are stored as
/// stringified integers so the adapter never has to decode an
/// engine-specific numeric/datetime wire type back through `query_rows`.
pub const META_TABLE: &str = "meta_last_sync_times";

pub fn ensure_meta_table(kind: DatabaseKind) -> String {
    let table = quote_ident(kind, META_TABLE);
    let (target_col, synced_col, batch_col, row_col) = (
        quote_ident(kind, "target_table"),
        quote_ident(kind, "last_synced_at"),
        quote_ident(kind, "last_batch_synced_at"),
        quote_ident(kind, "last_row_at"),
    );
    match kind {
        DatabaseKind::MySql => format!(
            "CREATE TABLE IF NOT EXISTS {} ({} VARCHAR(255) PRIMARY KEY, {} TEXT NOT NULL, {} TEXT, {} TEXT)",
            table, target_col, synced_col, batch_col, row_col
        ),
        DatabaseKind::Postgres => format!(
            "CREATE TABLE IF NOT EXISTS {} ({} VARCHAR(255) PRIMARY KEY, {} TEXT NOT NULL, {} TEXT, {} TEXT)",
            table, target_col, synced_col, batch_col, row_col
        ),
    }
}

pub fn select_meta_row(kind: DatabaseKind, target_table: &str) -> String {
    format!(
        "SELECT * FROM {} WHERE {} = {}",
        quote_ident(kind, META_TABLE),
        quote_ident(kind, "target_table"),
        quote_literal(target_table)
    )
}

pub fn select_all_meta_rows(kind: DatabaseKind) -> String {
    format!("SELECT * FROM {}", quote_ident(kind, META_TABLE))
}

pub fn delete_meta_row(kind: DatabaseKind, target_table: &str) -> String {
    format!(
        "DELETE FROM {} WHERE {} = {}",
        quote_ident(kind, META_TABLE),
        quote_ident(kind, "target_table"),
        quote_literal(target_table)
    )
}

/// Upserts one row of the registry's watermarks. `last_batch_synced_at`/
/// `last_row_at` are passed as already-stringified epoch millis (or NULL).
pub fn upsert_meta_row(
    kind: DatabaseKind,
    target_table: &str,
    last_synced_at: &str,
    last_batch_synced_at: Option<&str>,
    last_row_at: Option<&str>,
) -> String {
    let target = quote_literal(target_table);
    let synced = quote_literal(last_synced_at);
    let batch = last_batch_synced_at.map(quote_literal).unwrap_or_else(|| "NULL".to_string());
    let row = last_row_at.map(quote_literal).unwrap_or_else(|| "NULL".to_string());
    let table = quote_ident(kind, META_TABLE);

    match kind {
        DatabaseKind::MySql => format!(
            "INSERT INTO {} ({}, {}, {}, {}) VALUES ({}, {}, {}, {}) \
             ON DUPLICATE KEY UPDATE {} = VALUES({}), {} = VALUES({}), {} = VALUES({})",
            table,
            quote_ident(kind, "target_table"),
            quote_ident(kind, "last_synced_at"),
            quote_ident(kind, "last_batch_synced_at"),
            quote_ident(kind, "last_row_at"),
            target,
            synced,
            batch,
            row,
            quote_ident(kind, "last_synced_at"),
            quote_ident(kind, "last_synced_at"),
            quote_ident(kind, "last_batch_synced_at"),
            quote_ident(kind, "last_batch_synced_at"),
            quote_ident(kind, "last_row_at"),
            quote_ident(kind, "last_row_at"),
        ),
        DatabaseKind::Postgres => format!(
            "INSERT INTO {} ({}, {}, {}, {}) VALUES ({}, {}, {}, {}) \
             ON CONFLICT ({}) DO UPDATE SET {} = EXCLUDED.{}, {} = EXCLUDED.{}, {} = EXCLUDED.{}",
            table,
            quote_ident(kind, "target_table"),
            quote_ident(kind, "last_synced_at"),
            quote_ident(kind, "last_batch_synced_at"),
            quote_ident(kind, "last_row_at"),
            target,
            synced,
            batch,
            row,
            quote_ident(kind, "target_table"),
            quote_ident(kind, "last_synced_at"),
            quote_ident(kind, "last_synced_at"),
            quote_ident(kind, "last_batch_synced_at"),
            quote_ident(kind, "last_batch_synced_at"),
            quote_ident(kind, "last_row_at"),
            quote_ident(kind, "last_row_at"),
        ),
    }
}

fn render_type(kind: DatabaseKind, data_type: &DataType) -> String {
    match (kind, data_type) {
        (_, DataType::SmallInt) => "SMALLINT".to_string(),
        (_, DataType::Int) => "INT".to_string(),
        (_, DataType::BigInt) => "BIGINT".to_string(),
        (_, DataType::Float) => "FLOAT".to_string(),
        (_, DataType::Double) => "DOUBLE PRECISION".to_string(),
        (_, DataType::Decimal) => "DECIMAL".to_string(),
        (_, DataType::Boolean) => "BOOLEAN".to_string(),
        (DatabaseKind::MySql, DataType::Text) => "TEXT".to_string(),
        (DatabaseKind::Postgres, DataType::Text) => "TEXT".to_string(),
        (_, DataType::Varchar(len)) => format!("VARCHAR({})", len),
        (_, DataType::Date) => "DATE".to_string(),
        (DatabaseKind::MySql, DataType::Timestamp) => "DATETIME".to_string(),
        (DatabaseKind::Postgres, DataType::Timestamp) => "TIMESTAMP".to_string(),
        (_, DataType::TimestampTz) => "TIMESTAMP WITH TIME ZONE".to_string(),
        (DatabaseKind::MySql, DataType::Json) => "JSON".to_string(),
        (DatabaseKind::Postgres, DataType::Json) => "JSONB".to_string(),
        (DatabaseKind::MySql, DataType::Binary) => "BLOB".to_string(),
        (DatabaseKind::Postgres, DataType::Binary) => "BYTEA".to_string(),
        (_, DataType::Custom(raw)) => raw.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mysql_switch_table_renames_both_in_one_statement() {
        let stmts = switch_table_statements(DatabaseKind::MySql, "new_orders", "orders");
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].starts_with("RENAME TABLE"));
    }

    #[test]
    fn select_since_omits_predicate_without_a_watermark() {
        let sql = select_since(DatabaseKind::Postgres, "orders", &[], None, None);
        assert_eq!(sql, "SELECT * FROM \"orders\"");
    }

    #[test]
    fn quote_ident_escapes_embedded_quote_chars() {
        assert_eq!(quote_ident(DatabaseKind::MySql, "a`b"), "`a``b`");
        assert_eq!(quote_ident(DatabaseKind::Postgres, "a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn mysql_upsert_meta_row_uses_on_duplicate_key_update() {
        let sql = upsert_meta_row(DatabaseKind::MySql, "orders", "100", Some("90"), None);
        assert!(sql.contains("ON DUPLICATE KEY UPDATE"));
        assert!(sql.contains("NULL"));
    }

    #[test]
    fn postgres_upsert_meta_row_uses_on_conflict_do_update() {
        let sql = upsert_meta_row(DatabaseKind::Postgres, "orders", "100", Some("90"), Some("80"));
        assert!(sql.contains("ON CONFLICT (\"target_table\") DO UPDATE"));
        assert!(!sql.contains("NULL"));
    }

    #[test]
    fn select_meta_row_filters_by_target_table() {
        let sql = select_meta_row(DatabaseKind::MySql, "orders");
        assert!(sql.contains("WHERE `target_table` = 'orders'"));
    }
}
