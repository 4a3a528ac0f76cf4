//! The `DatabaseAdapter` trait: the one seam the sync engine crosses to
//! talk to a concrete source or target engine (spec §4.2). Adapted from the
//! teacher's `sql::base::adapter::DatabaseAdapter`, trimmed to the
//! operations the sync pipeline actually needs and stripped of anything
//! tied to the teacher's `smql` query-object model.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use model::schema::{IndexMap, IndexSpec, TableSchema};
use model::value::DataType;

use crate::error::DbError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseKind {
    MySql,
    Postgres,
}

impl std::fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseKind::MySql => write!(f, "mysql"),
            DatabaseKind::Postgres => write!(f, "postgres"),
        }
    }
}

/// A source or target database engine. Every method takes plain table/
/// column names rather than a query AST — the pipeline only ever issues
/// the fixed handful of operations spec §4.2 enumerates, so there is no
/// general query builder to expose here.
#[async_trait]
pub trait DatabaseAdapter: Send + Sync {
    fn kind(&self) -> DatabaseKind;

    /// Re-establish the underlying connection if the driver has let it go
    /// stale. Per DESIGN.md's resolution of Open Question #2, the contract
    /// is only that the *next* statement issued afterward observes a live
    /// connection — adapters are free to implement this as a reconnect, a
    /// pool checkout, or a no-op over an already-pooled driver.
    async fn connection_reset(&self) -> Result<(), DbError>;

    async fn table_exists(&self, table: &str) -> Result<bool, DbError>;

    /// Full column introspection: types, nullability, primary key, default.
    async fn schema(&self, table: &str) -> Result<TableSchema, DbError>;

    async fn indexes(&self, table: &str) -> Result<IndexMap, DbError>;

    /// The comparison view of `schema()` (type + primary_key + nullable,
    /// `default` excluded — DESIGN.md Open Question #1).
    async fn hash_schema(
        &self,
        table: &str,
    ) -> Result<std::collections::BTreeMap<String, (DataType, bool)>, DbError> {
        Ok(self.schema(table).await?.hash_schema())
    }

    /// The largest value observed in `column`, expressed as epoch seconds
    /// or milliseconds matching whatever unit the plan declares. Used to
    /// compute `last_row_at` after a batch or incremental load.
    async fn max_timestamp(&self, table: &str, column: &str) -> Result<Option<i64>, DbError>;

    /// Bulk-extract the result of `sql` to `file` using the engine's
    /// native server-side export facility (spec §6). Implementations
    /// shell out to the engine's client binary; a non-empty stderr is
    /// always a failure, independent of exit status.
    async fn extract_to_file(
        &self,
        sql: &str,
        file: &Path,
        charset: Option<&str>,
    ) -> Result<(), DbError>;

    /// Bulk-load `file` into `table`'s `columns`, in file order, via the
    /// engine's native bulk loader.
    async fn load_from_file(
        &self,
        table: &str,
        columns: &[String],
        file: &Path,
    ) -> Result<(), DbError>;

    async fn create_table_like(
        &self,
        new_table: &str,
        existing_table: &str,
        charset: Option<&str>,
    ) -> Result<(), DbError>;

    async fn drop_table_if_exists(&self, table: &str) -> Result<(), DbError>;

    /// Atomically replace `live_table`'s contents with `new_table`'s,
    /// leaving `new_table` gone afterward (spec §4.2, §6).
    async fn switch_table(&self, new_table: &str, live_table: &str) -> Result<(), DbError>;

    async fn add_column(&self, table: &str, column: &str, data_type: &DataType)
        -> Result<(), DbError>;

    async fn add_index(&self, table: &str, name: &str, spec: &IndexSpec) -> Result<(), DbError>;

    /// Drop every index on `table` whose name is not in `keep`.
    async fn remove_indexes_except(&self, table: &str, keep: &HashSet<String>)
        -> Result<(), DbError>;

    /// Issue an arbitrary statement and return the affected row count.
    /// Used for the refresh-recent window delete (spec §4.2).
    async fn exec(&self, sql: &str) -> Result<u64, DbError>;

    /// Issue an arbitrary `SELECT` and return each row as a column-name to
    /// stringified-value map. The only read primitive the registry needs
    /// to persist watermarks in the target warehouse rather than locally
    /// (spec §4.1, §6).
    async fn query_rows(
        &self,
        sql: &str,
    ) -> Result<Vec<std::collections::BTreeMap<String, String>>, DbError>;
}
