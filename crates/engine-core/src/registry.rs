//! `TableRegistry`: durable storage of each target table's `SyncMetadata`
//! (spec §3, §4.1). Persisted as a row per target table in
//! `meta_last_sync_times` on the target warehouse itself, through the same
//! `DatabaseAdapter` seam every other sync operation uses, rather than a
//! local embedded store — the registry is part of the external contract
//! spec §6 describes, not sync-process-private state.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use connectors::adapter::DatabaseAdapter;
use connectors::query;
use model::identifiers::TargetTable;
use model::sync_metadata::SyncMetadata;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to provision registry storage: {0}")]
    EnsureStorage(String),

    #[error("failed to read metadata for {table}: {source}")]
    Read { table: String, source: String },

    #[error("failed to write metadata for {table}: {source}")]
    Write { table: String, source: String },

    #[error("failed to delete metadata for {table}: {source}")]
    Delete { table: String, source: String },
}

pub struct TableRegistry {
    target: Arc<dyn DatabaseAdapter>,
}

impl TableRegistry {
    pub fn new(target: Arc<dyn DatabaseAdapter>) -> Self {
        Self { target }
    }

    /// Creates `meta_last_sync_times` if it doesn't already exist. Safe to
    /// call from every worker on startup: `CREATE TABLE IF NOT EXISTS` is
    /// idempotent, and a "already exists" race from concurrent creation is
    /// swallowed rather than surfaced.
    pub async fn ensure_storage_exists(&self) -> Result<(), RegistryError> {
        let sql = query::ensure_meta_table(self.target.kind());
        match self.target.exec(&sql).await {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().to_ascii_lowercase().contains("already exists") => Ok(()),
            Err(e) => Err(RegistryError::EnsureStorage(e.to_string())),
        }
    }

    pub async fn get(&self, table: &TargetTable) -> Result<Option<SyncMetadata>, RegistryError> {
        let sql = query::select_meta_row(self.target.kind(), table.as_str());
        let rows = self.target.query_rows(&sql).await.map_err(|e| RegistryError::Read {
            table: table.to_string(),
            source: e.to_string(),
        })?;

        match rows.into_iter().next() {
            Some(row) => Ok(Some(row_to_metadata(table.as_str(), &row)?)),
            None => Ok(None),
        }
    }

    pub async fn put(&self, meta: &SyncMetadata) -> Result<(), RegistryError> {
        let table = meta.target_table.as_str();
        let sql = query::upsert_meta_row(
            self.target.kind(),
            table,
            &meta.last_synced_at.timestamp_millis().to_string(),
            meta.last_batch_synced_at.map(|t| t.timestamp_millis().to_string()).as_deref(),
            meta.last_row_at.map(|t| t.to_string()).as_deref(),
        );
        self.target.exec(&sql).await.map_err(|e| RegistryError::Write {
            table: table.to_string(),
            source: e.to_string(),
        })?;
        Ok(())
    }

    pub async fn delete(&self, table: &TargetTable) -> Result<(), RegistryError> {
        let sql = query::delete_meta_row(self.target.kind(), table.as_str());
        self.target.exec(&sql).await.map_err(|e| RegistryError::Delete {
            table: table.to_string(),
            source: e.to_string(),
        })?;
        Ok(())
    }

    pub async fn all(&self) -> Result<Vec<SyncMetadata>, RegistryError> {
        let sql = query::select_all_meta_rows(self.target.kind());
        let rows = self.target.query_rows(&sql).await.map_err(|e| RegistryError::Read {
            table: "<all>".to_string(),
            source: e.to_string(),
        })?;

        rows.iter()
            .map(|row| {
                let table = row.get("target_table").cloned().unwrap_or_default();
                row_to_metadata(&table, row)
            })
            .collect()
    }
}

fn row_to_metadata(table: &str, row: &BTreeMap<String, String>) -> Result<SyncMetadata, RegistryError> {
    let parse_millis = |value: &str| -> Result<DateTime<Utc>, RegistryError> {
        let millis: i64 = value.parse().map_err(|e| RegistryError::Read {
            table: table.to_string(),
            source: format!("invalid epoch millis {value:?}: {e}"),
        })?;
        DateTime::from_timestamp_millis(millis).ok_or_else(|| RegistryError::Read {
            table: table.to_string(),
            source: format!("epoch millis {millis} out of range"),
        })
    };

    let last_synced_at = row
        .get("last_synced_at")
        .ok_or_else(|| RegistryError::Read {
            table: table.to_string(),
            source: "missing last_synced_at column".to_string(),
        })
        .and_then(|v| parse_millis(v))?;

    let last_batch_synced_at = row
        .get("last_batch_synced_at")
        .filter(|v| !v.is_empty())
        .map(|v| parse_millis(v))
        .transpose()?;

    let last_row_at = row
        .get("last_row_at")
        .filter(|v| !v.is_empty())
        .map(|v| {
            v.parse::<i64>().map_err(|e| RegistryError::Read {
                table: table.to_string(),
                source: format!("invalid last_row_at {v:?}: {e}"),
            })
        })
        .transpose()?;

    Ok(SyncMetadata {
        target_table: TargetTable::new(table),
        last_synced_at,
        last_batch_synced_at,
        last_row_at,
    })
}
