//! Cheap, hashable newtype wrappers around the identifiers that flow through
//! the sync engine. Kept distinct so a `SourceId` can never be passed where a
//! `TargetTable` is expected.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(Arc<str>);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(Arc::from(id.into()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::new(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(SourceId);
string_id!(SourceTable);
string_id!(TargetTable);

impl TargetTable {
    /// The name of the transient staging table used during a batch load,
    /// per the `new_<target_table>` convention.
    pub fn staging_name(&self) -> String {
        format!("new_{}", self.as_str())
    }
}
