//! Error types for the sync crate.

use srvlist_state::StateError;
use thiserror::Error;

/// Faults that stop a sync pass before any write is issued.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("run queue is full")]
    QueueFull,

    #[error("runner has stopped")]
    Stopped,

    #[error("run {id} failed: {message}")]
    Failed { id: u64, message: String },
}
