pub mod actions;
pub mod actor;
pub mod error;
pub mod manager;

pub use manager::{Manager, SourceWorker, WorkerCadence};
