//! `TablePlan`: the declarative, immutable-per-cycle description of what to
//! copy and how (spec §3). Adapted from the teacher's plan-as-typed-struct
//! approach (`engine_core::models::plan`) rather than the loosely-typed
//! dictionaries the original tool passed around (see Design Notes — "Plan
//! literals as dictionaries").

use crate::identifiers::{SourceId, SourceTable, TargetTable};
use crate::schema::IndexMap;
use serde::{Deserialize, Serialize};

/// `columns = ALL` is a distinguished variant, never a magic string mixed
/// into a column list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ColumnSelection {
    All,
    List(Vec<String>),
}

impl ColumnSelection {
    pub fn is_all(&self) -> bool {
        matches!(self, ColumnSelection::All)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum RefreshRecent {
    Disabled,
    EnabledByTimestamp,
    Column(String),
}

impl Default for RefreshRecent {
    fn default() -> Self {
        RefreshRecent::Disabled
    }
}

impl RefreshRecent {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, RefreshRecent::Disabled)
    }

    /// The column the refresh-recent window predicate filters on.
    pub fn window_column<'a>(&'a self, timestamp_column: &'a str) -> Option<&'a str> {
        match self {
            RefreshRecent::Disabled => None,
            RefreshRecent::EnabledByTimestamp => Some(timestamp_column),
            RefreshRecent::Column(c) => Some(c.as_str()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TablePlan {
    pub target_table: TargetTable,
    pub source_table: SourceTable,
    pub source_id: SourceId,
    pub columns: ColumnSelection,
    pub timestamp_column: String,
    pub timestamp_in_millis: bool,
    pub indexes: IndexMap,
    pub refresh_recent: RefreshRecent,
    pub charset: Option<String>,
}

impl TablePlan {
    pub fn builder(
        source_id: impl Into<SourceId>,
        source_table: impl Into<SourceTable>,
        target_table: impl Into<TargetTable>,
    ) -> TablePlanBuilder {
        TablePlanBuilder::new(source_id, source_table, target_table)
    }

    /// Per spec §3 invariant: the projected columns must include the
    /// timestamp column once `ALL` has been resolved against source schema.
    pub fn validate_projection(&self, resolved_columns: &[String]) -> bool {
        resolved_columns.iter().any(|c| c == &self.timestamp_column)
    }
}

pub struct TablePlanBuilder {
    plan: TablePlan,
}

impl TablePlanBuilder {
    pub fn new(
        source_id: impl Into<SourceId>,
        source_table: impl Into<SourceTable>,
        target_table: impl Into<TargetTable>,
    ) -> Self {
        Self {
            plan: TablePlan {
                target_table: target_table.into(),
                source_table: source_table.into(),
                source_id: source_id.into(),
                columns: ColumnSelection::All,
                timestamp_column: "updated_at".to_string(),
                timestamp_in_millis: false,
                indexes: IndexMap::new(),
                refresh_recent: RefreshRecent::Disabled,
                charset: None,
            },
        }
    }

    pub fn columns(mut self, columns: ColumnSelection) -> Self {
        self.plan.columns = columns;
        self
    }

    pub fn timestamp_column(mut self, name: impl Into<String>) -> Self {
        self.plan.timestamp_column = name.into();
        self
    }

    pub fn timestamp_in_millis(mut self, millis: bool) -> Self {
        self.plan.timestamp_in_millis = millis;
        self
    }

    pub fn index(mut self, name: impl Into<String>, spec: crate::schema::IndexSpec) -> Self {
        self.plan.indexes.insert(name.into(), spec);
        self
    }

    pub fn refresh_recent(mut self, policy: RefreshRecent) -> Self {
        self.plan.refresh_recent = policy;
        self
    }

    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.plan.charset = Some(charset.into());
        self
    }

    pub fn build(self) -> TablePlan {
        self.plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_plan_uses_updated_at_and_all_columns() {
        let plan = TablePlan::builder("src1", "orders", "orders").build();
        assert_eq!(plan.timestamp_column, "updated_at");
        assert!(plan.columns.is_all());
        assert!(!plan.refresh_recent.is_enabled());
    }

    #[test]
    fn validate_projection_requires_timestamp_column() {
        let plan = TablePlan::builder("src1", "orders", "orders")
            .timestamp_column("synced_at")
            .build();
        assert!(plan.validate_projection(&["id".into(), "synced_at".into()]));
        assert!(!plan.validate_projection(&["id".into()]));
    }

    #[test]
    fn refresh_recent_window_column_falls_back_to_timestamp() {
        let enabled = RefreshRecent::EnabledByTimestamp;
        assert_eq!(enabled.window_column("updated_at"), Some("updated_at"));

        let explicit = RefreshRecent::Column("deleted_at".into());
        assert_eq!(explicit.window_column("updated_at"), Some("deleted_at"));

        assert_eq!(RefreshRecent::Disabled.window_column("updated_at"), None);
    }
}
