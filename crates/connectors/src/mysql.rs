//! MySQL `DatabaseAdapter`. Schema introspection and DDL go over the
//! `mysql_async` pool directly; bulk extract/load shell out to the `mysql`
//! client binary per spec §6, matching the teacher's split between driver
//! connection and native client subprocess.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use model::schema::{ColumnSchema, IndexMap, IndexSpec, TableSchema};
use model::value::DataType;
use mysql_async::prelude::*;
use mysql_async::Pool;

use crate::adapter::{DatabaseAdapter, DatabaseKind};
use crate::bulk::{run_capturing_stdout, run_checked, write_file, ShellCommand};
use crate::error::DbError;
use crate::query;

#[derive(Debug, Clone)]
pub struct MySqlConnectionInfo {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl MySqlConnectionInfo {
    fn client_args(&self) -> Vec<String> {
        vec![
            format!("--host={}", self.host),
            format!("--port={}", self.port),
            format!("--user={}", self.user),
            format!("--password={}", self.password),
            self.database.clone(),
        ]
    }
}

pub struct MySqlAdapter {
    pool: Pool,
    conn_info: MySqlConnectionInfo,
}

impl MySqlAdapter {
    pub fn new(pool: Pool, conn_info: MySqlConnectionInfo) -> Self {
        Self { pool, conn_info }
    }

    fn client_command(&self) -> ShellCommand {
        ShellCommand::new("mysql")
            .args(self.conn_info.client_args())
            .arg("--batch")
            .arg("--raw")
    }
}

fn to_data_type(mysql_type: &str) -> DataType {
    let t = mysql_type.to_ascii_lowercase();
    if t.starts_with("varchar") {
        let len = t
            .trim_start_matches("varchar(")
            .trim_end_matches(')')
            .parse()
            .unwrap_or(255);
        return DataType::Varchar(len);
    }
    match t.as_str() {
        "tinyint" | "smallint" => DataType::SmallInt,
        "int" | "mediumint" => DataType::Int,
        "bigint" => DataType::BigInt,
        "float" => DataType::Float,
        "double" => DataType::Double,
        "decimal" | "numeric" => DataType::Decimal,
        "tinyint(1)" | "bool" | "boolean" => DataType::Boolean,
        "text" | "mediumtext" | "longtext" => DataType::Text,
        "date" => DataType::Date,
        "datetime" => DataType::Timestamp,
        "timestamp" => DataType::TimestampTz,
        "json" => DataType::Json,
        "blob" | "longblob" | "mediumblob" | "varbinary" => DataType::Binary,
        other => DataType::Custom(other.to_string()),
    }
}

#[async_trait]
impl DatabaseAdapter for MySqlAdapter {
    fn kind(&self) -> DatabaseKind {
        DatabaseKind::MySql
    }

    async fn connection_reset(&self) -> Result<(), DbError> {
        // mysql_async's pool already checks out a fresh connection for
        // every statement; an explicit ping is enough to surface a dead
        // pool eagerly rather than on the next real query.
        let mut conn = self.pool.get_conn().await?;
        conn.ping().await?;
        Ok(())
    }

    async fn table_exists(&self, table: &str) -> Result<bool, DbError> {
        let mut conn = self.pool.get_conn().await?;
        let row: Option<String> = "SHOW TABLES LIKE :table"
            .with(mysql_async::params! { "table" => table })
            .first(&mut conn)
            .await?;
        Ok(row.is_some())
    }

    async fn schema(&self, table: &str) -> Result<TableSchema, DbError> {
        let mut conn = self.pool.get_conn().await?;
        let rows: Vec<(String, String, String, String, Option<String>, String)> = conn
            .exec(
                "SELECT COLUMN_NAME, COLUMN_TYPE, IS_NULLABLE, COLUMN_KEY, COLUMN_DEFAULT, \
                 EXTRA FROM information_schema.columns \
                 WHERE table_schema = DATABASE() AND table_name = :table \
                 ORDER BY ORDINAL_POSITION",
                mysql_async::params! { "table" => table },
            )
            .await?;

        if rows.is_empty() {
            return Err(DbError::NoSuchTable(table.to_string()));
        }

        let columns = rows
            .into_iter()
            .map(|(name, col_type, nullable, key, default, _extra)| ColumnSchema {
                name,
                data_type: to_data_type(&col_type),
                primary_key: key == "PRI",
                nullable: nullable == "YES",
                default,
            })
            .collect();
        Ok(TableSchema::new(columns))
    }

    async fn indexes(&self, table: &str) -> Result<IndexMap, DbError> {
        let mut conn = self.pool.get_conn().await?;
        let rows: Vec<(String, String, i8)> = conn
            .exec(
                "SELECT INDEX_NAME, COLUMN_NAME, NON_UNIQUE FROM information_schema.statistics \
                 WHERE table_schema = DATABASE() AND table_name = :table AND INDEX_NAME != 'PRIMARY' \
                 ORDER BY INDEX_NAME, SEQ_IN_INDEX",
                mysql_async::params! { "table" => table },
            )
            .await?;

        let mut map: IndexMap = IndexMap::new();
        for (name, column, non_unique) in rows {
            let entry = map.entry(name).or_insert_with(|| IndexSpec {
                columns: Vec::new(),
                unique: non_unique == 0,
            });
            entry.columns.push(column);
        }
        Ok(map)
    }

    async fn max_timestamp(&self, table: &str, column: &str) -> Result<Option<i64>, DbError> {
        let mut conn = self.pool.get_conn().await?;
        let sql = query::max_epoch(DatabaseKind::MySql, table, column, false);
        let value: Option<i64> = sql.with(()).first(&mut conn).await?;
        Ok(value)
    }

    async fn extract_to_file(
        &self,
        sql: &str,
        file: &Path,
        _charset: Option<&str>,
    ) -> Result<(), DbError> {
        let cmd = self.client_command().arg("-e").arg(sql.to_string());
        let stdout = run_capturing_stdout(cmd).await?;
        write_file(file, &stdout).await
    }

    async fn load_from_file(
        &self,
        table: &str,
        columns: &[String],
        file: &Path,
    ) -> Result<(), DbError> {
        let cols = columns.join(", ");
        let sql = format!(
            "LOAD DATA LOCAL INFILE '{}' INTO TABLE `{}` FIELDS TERMINATED BY '\\t' ({})",
            file.display(),
            table,
            cols
        );
        let cmd = self
            .client_command()
            .arg("--local-infile=1")
            .arg("-e")
            .arg(sql);
        run_checked(cmd).await
    }

    async fn create_table_like(
        &self,
        new_table: &str,
        existing_table: &str,
        _charset: Option<&str>,
    ) -> Result<(), DbError> {
        let mut conn = self.pool.get_conn().await?;
        let sql = query::create_table_like(DatabaseKind::MySql, new_table, existing_table);
        conn.query_drop(sql).await?;
        Ok(())
    }

    async fn drop_table_if_exists(&self, table: &str) -> Result<(), DbError> {
        let mut conn = self.pool.get_conn().await?;
        let sql = query::drop_table_if_exists(DatabaseKind::MySql, table);
        conn.query_drop(sql).await?;
        Ok(())
    }

    async fn switch_table(&self, new_table: &str, live_table: &str) -> Result<(), DbError> {
        let mut conn = self.pool.get_conn().await?;
        for stmt in query::switch_table_statements(DatabaseKind::MySql, new_table, live_table) {
            conn.query_drop(stmt).await?;
        }
        Ok(())
    }

    async fn add_column(
        &self,
        table: &str,
        column: &str,
        data_type: &DataType,
    ) -> Result<(), DbError> {
        let mut conn = self.pool.get_conn().await?;
        let sql = query::add_column(DatabaseKind::MySql, table, column, data_type);
        conn.query_drop(sql).await?;
        Ok(())
    }

    async fn add_index(&self, table: &str, name: &str, spec: &IndexSpec) -> Result<(), DbError> {
        let mut conn = self.pool.get_conn().await?;
        let sql = query::add_index(DatabaseKind::MySql, table, name, spec);
        conn.query_drop(sql).await?;
        Ok(())
    }

    async fn remove_indexes_except(
        &self,
        table: &str,
        keep: &HashSet<String>,
    ) -> Result<(), DbError> {
        let existing = self.indexes(table).await?;
        let mut conn = self.pool.get_conn().await?;
        for name in existing.keys() {
            if !keep.contains(name) {
                let sql = query::drop_index(DatabaseKind::MySql, table, name);
                conn.query_drop(sql).await?;
            }
        }
        Ok(())
    }

    async fn exec(&self, sql: &str) -> Result<u64, DbError> {
        let mut conn = self.pool.get_conn().await?;
        conn.query_drop(sql).await?;
        Ok(conn.affected_rows())
    }

    async fn query_rows(
        &self,
        sql: &str,
    ) -> Result<Vec<std::collections::BTreeMap<String, String>>, DbError> {
        let mut conn = self.pool.get_conn().await?;
        let rows: Vec<mysql_async::Row> = conn.query(sql).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let names: Vec<String> = row
                    .columns_ref()
                    .iter()
                    .map(|c| c.name_str().to_string())
                    .collect();
                names
                    .into_iter()
                    .enumerate()
                    .filter_map(|(i, name)| row.get::<Option<String>, usize>(i).flatten().map(|v| (name, v)))
                    .collect()
            })
            .collect())
    }
}
