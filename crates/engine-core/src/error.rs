//! `SyncError`: the five-kind error taxonomy spec §7 assigns to the sync
//! engine layer, sitting above `connectors::DbError`.

use thiserror::Error;

use connectors::error::DbError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("extract failed for {source_table}: {source}")]
    ExtractError {
        source_table: String,
        #[source]
        source: DbError,
    },

    #[error("load failed for {target_table}: {source}")]
    LoadError {
        target_table: String,
        #[source]
        source: DbError,
    },

    #[error("failed to split the staged extract into chunks for {target_table}: {source}")]
    SplitError {
        target_table: String,
        #[source]
        source: DbError,
    },

    #[error("no such table: {0}")]
    NoSuchTable(String),

    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl SyncError {
    pub fn extract(source_table: impl Into<String>, source: DbError) -> Self {
        SyncError::ExtractError {
            source_table: source_table.into(),
            source,
        }
    }

    pub fn load(target_table: impl Into<String>, source: DbError) -> Self {
        SyncError::LoadError {
            target_table: target_table.into(),
            source,
        }
    }

    pub fn split(target_table: impl Into<String>, source: DbError) -> Self {
        SyncError::SplitError {
            target_table: target_table.into(),
            source,
        }
    }

    /// Whether this kind of failure is worth retrying at the action level,
    /// as opposed to one that should fail the table's cycle outright.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::ExtractError { .. } | SyncError::LoadError { .. } | SyncError::SplitError { .. }
        )
    }
}
