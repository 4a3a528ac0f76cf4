use thiserror::Error;

use engine_core::error::SyncError;

#[derive(Debug, Error)]
pub enum ActorError {
    #[error("actor mailbox closed")]
    MailboxClosed,

    #[error(transparent)]
    Sync(#[from] SyncError),
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("actor error: {0}")]
    Actor(#[from] ActorError),
}
