//! Engine-neutral column type tags, adapted from the teacher's
//! `model::core::data_type::DataType` and trimmed to the subset the sync
//! engine needs to agree on between a source and the target warehouse.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum DataType {
    SmallInt,
    Int,
    BigInt,
    Float,
    Double,
    Decimal,
    Boolean,
    Text,
    Varchar(u32),
    Date,
    Timestamp,
    TimestampTz,
    Json,
    Binary,
    Custom(String),
}

impl DataType {
    /// Whether two column types are compatible enough that no DDL is
    /// needed on the target side. Intentionally permissive: the engine's
    /// job is bulk replication, not strict schema validation.
    pub fn compatible_with(&self, other: &DataType) -> bool {
        self == other || matches!((self, other), (DataType::Varchar(_), DataType::Varchar(_)))
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::SmallInt => write!(f, "SMALLINT"),
            DataType::Int => write!(f, "INT"),
            DataType::BigInt => write!(f, "BIGINT"),
            DataType::Float => write!(f, "FLOAT"),
            DataType::Double => write!(f, "DOUBLE"),
            DataType::Decimal => write!(f, "DECIMAL"),
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::Text => write!(f, "TEXT"),
            DataType::Varchar(len) => write!(f, "VARCHAR({len})"),
            DataType::Date => write!(f, "DATE"),
            DataType::Timestamp => write!(f, "TIMESTAMP"),
            DataType::TimestampTz => write!(f, "TIMESTAMP WITH TIME ZONE"),
            DataType::Json => write!(f, "JSON"),
            DataType::Binary => write!(f, "BYTEA"),
            DataType::Custom(s) => write!(f, "{s}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varchars_of_different_lengths_are_compatible() {
        assert!(DataType::Varchar(32).compatible_with(&DataType::Varchar(255)));
    }

    #[test]
    fn distinct_kinds_are_incompatible() {
        assert!(!DataType::Int.compatible_with(&DataType::Text));
    }
}
