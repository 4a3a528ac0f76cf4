//! Error taxonomy for the `connectors` crate, adapted from the teacher's
//! `sql::base::error` module. `DbError` is what every `DatabaseAdapter`
//! method returns; `ConnectorError` wraps it with the table/source context
//! that engine-core's `SyncError` needs to attach (spec §7).

use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("no such table: {0}")]
    NoSuchTable(String),

    #[error("subprocess failed: {0}")]
    Subprocess(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("schema introspection failed: {0}")]
    Schema(String),
}

impl From<mysql_async::Error> for DbError {
    fn from(err: mysql_async::Error) -> Self {
        DbError::Query(err.to_string())
    }
}

impl From<tokio_postgres::Error> for DbError {
    fn from(err: tokio_postgres::Error) -> Self {
        DbError::Query(err.to_string())
    }
}

/// Adds the source/table the failure happened against, so callers don't
/// need to thread that context through every `DbError` variant by hand.
#[derive(Debug)]
pub struct ConnectorError {
    pub source_id: String,
    pub table: String,
    pub cause: DbError,
}

impl fmt::Display for ConnectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}/{}] {}",
            self.source_id, self.table, self.cause
        )
    }
}

impl std::error::Error for ConnectorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

impl ConnectorError {
    pub fn new(source_id: impl Into<String>, table: impl Into<String>, cause: DbError) -> Self {
        Self {
            source_id: source_id.into(),
            table: table.into(),
            cause,
        }
    }
}
