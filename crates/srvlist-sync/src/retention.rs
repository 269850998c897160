//! Retention sweeps.
//!
//! Two fixed windows: history older than [`HISTORY_RETENTION_SECS`] is
//! deleted, and servers that have no history within
//! [`INACTIVE_SERVER_SECS`] are deleted together with their history. The
//! two deletes are separate transactions and run regardless of each
//! other's outcome.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::engine::ServerStore;
use crate::error::SyncError;

pub const HISTORY_RETENTION_SECS: u64 = 7 * 24 * 60 * 60;
pub const INACTIVE_SERVER_SECS: u64 = 3 * 24 * 60 * 60;

/// Outcome of one sweep. A `None` count means that delete failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub history_deleted: Option<usize>,
    pub servers_deleted: Option<usize>,
    pub errors: Vec<String>,
}

pub struct RetentionSweeper<S> {
    store: Arc<S>,
}

impl<S: ServerStore> RetentionSweeper<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Sweep relative to the current time.
    pub async fn sweep(&self) -> SweepReport {
        self.sweep_at(crate::epoch_secs()).await
    }

    /// Sweep relative to `now` (Unix seconds).
    pub async fn sweep_at(&self, now: u64) -> SweepReport {
        let mut report = SweepReport::default();

        let history_cutoff = now.saturating_sub(HISTORY_RETENTION_SECS);
        match self.delete_old_history(history_cutoff).await {
            Ok(n) => report.history_deleted = Some(n),
            Err(e) => {
                error!(error = %e, cutoff = history_cutoff, "history retention delete failed");
                report.errors.push(format!("history: {e}"));
            }
        }

        let activity_cutoff = now.saturating_sub(INACTIVE_SERVER_SECS);
        match self.delete_inactive_servers(activity_cutoff).await {
            Ok(n) => report.servers_deleted = Some(n),
            Err(e) => {
                error!(error = %e, cutoff = activity_cutoff, "inactive server delete failed");
                report.errors.push(format!("servers: {e}"));
            }
        }

        info!(
            history_deleted = report.history_deleted.unwrap_or(0),
            servers_deleted = report.servers_deleted.unwrap_or(0),
            errors = report.errors.len(),
            "retention sweep complete"
        );
        report
    }

    async fn delete_old_history(&self, cutoff: u64) -> Result<usize, SyncError> {
        let store = Arc::clone(&self.store);
        Ok(tokio::task::spawn_blocking(move || store.delete_history_before(cutoff)).await??)
    }

    async fn delete_inactive_servers(&self, cutoff: u64) -> Result<usize, SyncError> {
        let store = Arc::clone(&self.store);
        Ok(tokio::task::spawn_blocking(move || {
            let inactive = store.servers_without_history_since(cutoff)?;
            store.delete_servers(&inactive)
        })
        .await??)
    }
}
