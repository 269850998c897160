//! srvlist-sync — reconciles a master-list snapshot with the store.
//!
//! - [`engine`]: diff against stored ids, chunked create/update/history
//!   writes under a concurrency ceiling.
//! - [`retention`]: age out history and servers that stopped reporting.
//! - [`run`]: one fetch → sync → sweep pass.
//! - [`runner`]: single-worker queue that serializes passes and keeps the
//!   last result for the status endpoint.

pub mod engine;
pub mod error;
pub mod retention;
pub mod run;
pub mod runner;

pub use engine::{ChunkFailure, ChunkOp, ServerStore, SyncEngine, SyncOptions, SyncReport};
pub use error::{RunnerError, SyncError};
pub use retention::{RetentionSweeper, SweepReport};
pub use run::{Pipeline, RunReport};
pub use runner::{RunHandle, RunId, RunSummary, Runner};

use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix time in seconds.
pub fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
