//! Postgres `DatabaseAdapter`. Schema introspection and DDL go over a
//! `tokio_postgres::Client`; bulk extract/load shell out to `psql`'s
//! `\copy`, which (unlike server-side `COPY`) reads/writes the client's
//! filesystem rather than the server's — the right choice when the sync
//! process and the database don't share a filesystem.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use model::schema::{ColumnSchema, IndexMap, IndexSpec, TableSchema};
use model::value::DataType;
use tokio_postgres::Client;

use crate::adapter::{DatabaseAdapter, DatabaseKind};
use crate::bulk::{run_checked, ShellCommand};
use crate::error::DbError;
use crate::query;

#[derive(Debug, Clone)]
pub struct PostgresConnectionInfo {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl PostgresConnectionInfo {
    fn conninfo(&self) -> String {
        format!(
            "host={} port={} user={} password={} dbname={}",
            self.host, self.port, self.user, self.password, self.database
        )
    }
}

pub struct PostgresAdapter {
    client: Client,
    conn_info: PostgresConnectionInfo,
}

impl PostgresAdapter {
    pub fn new(client: Client, conn_info: PostgresConnectionInfo) -> Self {
        Self { client, conn_info }
    }

    fn psql_command(&self) -> ShellCommand {
        ShellCommand::new("psql")
            .arg(self.conn_info.conninfo())
            .arg("--no-psqlrc")
            .arg("--quiet")
            .arg("--tuples-only")
    }
}

fn to_data_type(pg_type: &str) -> DataType {
    match pg_type {
        "smallint" | "int2" => DataType::SmallInt,
        "integer" | "int4" => DataType::Int,
        "bigint" | "int8" => DataType::BigInt,
        "real" | "float4" => DataType::Float,
        "double precision" | "float8" => DataType::Double,
        "numeric" | "decimal" => DataType::Decimal,
        "boolean" | "bool" => DataType::Boolean,
        "text" => DataType::Text,
        "date" => DataType::Date,
        "timestamp without time zone" => DataType::Timestamp,
        "timestamp with time zone" => DataType::TimestampTz,
        "json" | "jsonb" => DataType::Json,
        "bytea" => DataType::Binary,
        other if other.starts_with("character varying") => {
            let len = other
                .trim_start_matches("character varying(")
                .trim_end_matches(')')
                .parse()
                .unwrap_or(255);
            DataType::Varchar(len)
        }
        other => DataType::Custom(other.to_string()),
    }
}

#[async_trait]
impl DatabaseAdapter for PostgresAdapter {
    fn kind(&self) -> DatabaseKind {
        DatabaseKind::Postgres
    }

    async fn connection_reset(&self) -> Result<(), DbError> {
        self.client.simple_query("SELECT 1").await?;
        Ok(())
    }

    async fn table_exists(&self, table: &str) -> Result<bool, DbError> {
        let row = self
            .client
            .query_opt(
                "SELECT 1 FROM information_schema.tables WHERE table_schema = 'public' AND table_name = $1",
                &[&table],
            )
            .await?;
        Ok(row.is_some())
    }

    async fn schema(&self, table: &str) -> Result<TableSchema, DbError> {
        let rows = self
            .client
            .query(
                "SELECT c.column_name, c.data_type, c.is_nullable, c.column_default, \
                 EXISTS (SELECT 1 FROM information_schema.key_column_usage k \
                         JOIN information_schema.table_constraints t \
                           ON k.constraint_name = t.constraint_name \
                          AND t.constraint_type = 'PRIMARY KEY' \
                         WHERE k.table_name = c.table_name AND k.column_name = c.column_name) AS is_pk \
                 FROM information_schema.columns c \
                 WHERE c.table_schema = 'public' AND c.table_name = $1 \
                 ORDER BY c.ordinal_position",
                &[&table],
            )
            .await?;

        if rows.is_empty() {
            return Err(DbError::NoSuchTable(table.to_string()));
        }

        let columns = rows
            .into_iter()
            .map(|row| {
                let name: String = row.get(0);
                let data_type: String = row.get(1);
                let nullable: String = row.get(2);
                let default: Option<String> = row.get(3);
                let is_pk: bool = row.get(4);
                ColumnSchema {
                    name,
                    data_type: to_data_type(&data_type),
                    primary_key: is_pk,
                    nullable: nullable == "YES",
                    default,
                }
            })
            .collect();
        Ok(TableSchema::new(columns))
    }

    async fn indexes(&self, table: &str) -> Result<IndexMap, DbError> {
        let rows = self
            .client
            .query(
                "SELECT i.relname AS index_name, a.attname AS column_name, ix.indisunique \
                 FROM pg_index ix \
                 JOIN pg_class t ON t.oid = ix.indrelid \
                 JOIN pg_class i ON i.oid = ix.indexrelid \
                 JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey) \
                 WHERE t.relname = $1 AND NOT ix.indisprimary \
                 ORDER BY i.relname",
                &[&table],
            )
            .await?;

        let mut map: IndexMap = IndexMap::new();
        for row in rows {
            let name: String = row.get(0);
            let column: String = row.get(1);
            let unique: bool = row.get(2);
            let entry = map.entry(name).or_insert_with(|| IndexSpec {
                columns: Vec::new(),
                unique,
            });
            entry.columns.push(column);
        }
        Ok(map)
    }

    async fn max_timestamp(&self, table: &str, column: &str) -> Result<Option<i64>, DbError> {
        let sql = query::max_epoch(DatabaseKind::Postgres, table, column, false);
        let row = self.client.query_opt(&sql, &[]).await?;
        Ok(row.and_then(|r| r.get::<_, Option<f64>>(0)).map(|v| v as i64))
    }

    async fn extract_to_file(
        &self,
        sql: &str,
        file: &Path,
        _charset: Option<&str>,
    ) -> Result<(), DbError> {
        let copy = format!(
            "\\copy ({}) TO '{}' WITH (FORMAT csv)",
            sql.trim_end_matches(';'),
            file.display()
        );
        let cmd = self.psql_command().arg("-c").arg(copy);
        run_checked(cmd).await
    }

    async fn load_from_file(
        &self,
        table: &str,
        columns: &[String],
        file: &Path,
    ) -> Result<(), DbError> {
        let cols = columns.join(", ");
        let copy = format!(
            "\\copy {}({}) FROM '{}' WITH (FORMAT csv)",
            table,
            cols,
            file.display()
        );
        let cmd = self.psql_command().arg("-c").arg(copy);
        run_checked(cmd).await
    }

    async fn create_table_like(
        &self,
        new_table: &str,
        existing_table: &str,
        _charset: Option<&str>,
    ) -> Result<(), DbError> {
        let sql = query::create_table_like(DatabaseKind::Postgres, new_table, existing_table);
        self.client.batch_execute(&sql).await?;
        Ok(())
    }

    async fn drop_table_if_exists(&self, table: &str) -> Result<(), DbError> {
        let sql = query::drop_table_if_exists(DatabaseKind::Postgres, table);
        self.client.batch_execute(&sql).await?;
        Ok(())
    }

    async fn switch_table(&self, new_table: &str, live_table: &str) -> Result<(), DbError> {
        let stmts = query::switch_table_statements(DatabaseKind::Postgres, new_table, live_table);
        self.client.batch_execute(&stmts.join("; ")).await?;
        Ok(())
    }

    async fn add_column(
        &self,
        table: &str,
        column: &str,
        data_type: &DataType,
    ) -> Result<(), DbError> {
        let sql = query::add_column(DatabaseKind::Postgres, table, column, data_type);
        self.client.batch_execute(&sql).await?;
        Ok(())
    }

    async fn add_index(&self, table: &str, name: &str, spec: &IndexSpec) -> Result<(), DbError> {
        let sql = query::add_index(DatabaseKind::Postgres, table, name, spec);
        self.client.batch_execute(&sql).await?;
        Ok(())
    }

    async fn remove_indexes_except(
        &self,
        table: &str,
        keep: &HashSet<String>,
    ) -> Result<(), DbError> {
        let existing = self.indexes(table).await?;
        for name in existing.keys() {
            if !keep.contains(name) {
                let sql = query::drop_index(DatabaseKind::Postgres, table, name);
                self.client.batch_execute(&sql).await?;
            }
        }
        Ok(())
    }

    async fn exec(&self, sql: &str) -> Result<u64, DbError> {
        Ok(self.client.execute(sql, &[]).await?)
    }

    async fn query_rows(
        &self,
        sql: &str,
    ) -> Result<Vec<std::collections::BTreeMap<String, String>>, DbError> {
        let rows = self.client.query(sql, &[]).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                row.columns()
                    .iter()
                    .enumerate()
                    .filter_map(|(i, col)| {
                        row.get::<_, Option<String>>(i).map(|v| (col.name().to_string(), v))
                    })
                    .collect()
            })
            .collect())
    }
}
