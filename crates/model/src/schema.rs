//! Source/target schema introspection types, shared by `connectors`
//! adapters and the sync engine's column-projection and DDL logic.

use crate::value::DataType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: DataType,
    pub primary_key: bool,
    pub nullable: bool,
    /// The column's DDL default, if any. Used only when generating
    /// `ADD COLUMN` statements on the target; never compared when
    /// deciding schema compatibility (see DESIGN.md Open Question #1).
    pub default: Option<String>,
}

/// Ordered column list plus the subset of metadata the engine compares
/// (type, primary-key flag, nullability) — the "hash_schema" view of
/// spec.md §4.2.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableSchema {
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn new(columns: Vec<ColumnSchema>) -> Self {
        Self { columns }
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn primary_key_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.clone())
            .collect()
    }

    /// The comparison view used by `hash_schema`: column -> (type, primary_key).
    /// `default` and any auto-increment/identity state are deliberately
    /// excluded (Open Question #1).
    pub fn hash_schema(&self) -> BTreeMap<String, (DataType, bool)> {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), (c.data_type.clone(), c.primary_key)))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexSpec {
    pub columns: Vec<String>,
    pub unique: bool,
}

pub type IndexMap = BTreeMap<String, IndexSpec>;

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str, pk: bool) -> ColumnSchema {
        ColumnSchema {
            name: name.to_string(),
            data_type: DataType::Int,
            primary_key: pk,
            nullable: !pk,
            default: None,
        }
    }

    #[test]
    fn hash_schema_ignores_default() {
        let mut with_default = col("id", true);
        with_default.default = Some("nextval('x')".into());
        let schema = TableSchema::new(vec![with_default]);
        let (ty, pk) = schema.hash_schema()["id"].clone();
        assert_eq!(ty, DataType::Int);
        assert!(pk);
    }

    #[test]
    fn primary_key_columns_filters_correctly() {
        let schema = TableSchema::new(vec![col("id", true), col("name", false)]);
        assert_eq!(schema.primary_key_columns(), vec!["id".to_string()]);
    }
}
