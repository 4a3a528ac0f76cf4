pub mod identifiers;
pub mod plan;
pub mod schema;
pub mod sync_metadata;
pub mod value;
