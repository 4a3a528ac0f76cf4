pub mod batch;
pub mod incremental;
mod overlap;
pub mod refresh_recent;

pub use batch::{BatchLoadAction, BatchState};
pub use incremental::IncrementalLoadAction;
pub use refresh_recent::RefreshRecentAction;
