//! `SyncMetadata`: one row per target table, persisted on the target by the
//! `TableRegistry` (spec §3, §4.1).

use crate::identifiers::TargetTable;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The source-side timestamp value of the maximum `timestamp_column`
/// observed in the last successful load. Stored in whatever unit the plan
/// declares (seconds or milliseconds) — the tag travels with the plan, not
/// with this value, since the registry does not interpret it.
pub type RowTimestamp = i64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncMetadata {
    pub target_table: TargetTable,
    pub last_synced_at: DateTime<Utc>,
    pub last_batch_synced_at: Option<DateTime<Utc>>,
    pub last_row_at: Option<RowTimestamp>,
}

impl SyncMetadata {
    pub fn new(target_table: TargetTable, now: DateTime<Utc>) -> Self {
        Self {
            target_table,
            last_synced_at: now,
            last_batch_synced_at: None,
            last_row_at: None,
        }
    }

    /// Per spec §3 invariant: `last_batch_synced_at <= last_synced_at`.
    pub fn is_consistent(&self) -> bool {
        match self.last_batch_synced_at {
            Some(batch) => batch <= self.last_synced_at,
            None => true,
        }
    }

    /// Merge a newly observed `last_row_at`, preserving the monotone
    /// non-decreasing invariant of spec §3.
    pub fn advance_last_row_at(&mut self, observed: Option<RowTimestamp>) {
        self.last_row_at = match (self.last_row_at, observed) {
            (Some(current), Some(new)) => Some(current.max(new)),
            (None, Some(new)) => Some(new),
            (current, None) => current,
        };
    }
}
