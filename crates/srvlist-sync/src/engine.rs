//! Diff-based batched persistence of one snapshot.
//!
//! The snapshot is sorted by player count, de-duplicated and capped, then
//! split into records the store already knows (`update`) and new ones
//! (`create`). Both partitions are chunked; every chunk yields one write
//! operation plus one history append, and all operations run as
//! independent tasks under a semaphore. A failing operation is recorded
//! in the [`SyncReport`] and does not affect its siblings. Nothing is
//! retried.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use srvlist_core::SyncConfig;
use srvlist_state::{HistorySample, ServerId, ServerView, StateResult, StateStore};

use crate::error::SyncError;

/// The store operations the sync engine and retention sweeper need.
///
/// Every call is atomic on its own; nothing spans calls.
pub trait ServerStore: Send + Sync + 'static {
    fn existing_ids(&self, ids: &[ServerId]) -> StateResult<HashSet<ServerId>>;
    /// Insert, silently skipping ids that already exist.
    fn insert_servers(&self, views: &[ServerView]) -> StateResult<usize>;
    fn update_server(&self, view: &ServerView) -> StateResult<()>;
    fn insert_history(&self, samples: &[HistorySample]) -> StateResult<usize>;
    fn delete_history_before(&self, cutoff: u64) -> StateResult<usize>;
    fn servers_without_history_since(&self, cutoff: u64) -> StateResult<Vec<ServerId>>;
    /// Delete servers and their history.
    fn delete_servers(&self, ids: &[ServerId]) -> StateResult<usize>;
}

impl ServerStore for StateStore {
    fn existing_ids(&self, ids: &[ServerId]) -> StateResult<HashSet<ServerId>> {
        StateStore::existing_ids(self, ids)
    }

    fn insert_servers(&self, views: &[ServerView]) -> StateResult<usize> {
        StateStore::insert_servers(self, views)
    }

    fn update_server(&self, view: &ServerView) -> StateResult<()> {
        StateStore::update_server(self, view)
    }

    fn insert_history(&self, samples: &[HistorySample]) -> StateResult<usize> {
        StateStore::insert_history(self, samples)
    }

    fn delete_history_before(&self, cutoff: u64) -> StateResult<usize> {
        StateStore::delete_history_before(self, cutoff)
    }

    fn servers_without_history_since(&self, cutoff: u64) -> StateResult<Vec<ServerId>> {
        StateStore::servers_without_history_since(self, cutoff)
    }

    fn delete_servers(&self, ids: &[ServerId]) -> StateResult<usize> {
        StateStore::delete_servers(self, ids)
    }
}

/// Limits for one sync pass.
#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    pub max_servers: usize,
    pub chunk_size: usize,
    pub max_in_flight: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for SyncOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            max_servers: config.max_servers,
            chunk_size: config.chunk_size.max(1),
            max_in_flight: config.max_in_flight.max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkOp {
    Create,
    Update,
    History,
}

/// One write operation that did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkFailure {
    pub op: ChunkOp,
    /// Records the operation covered.
    pub records: usize,
    /// Set for per-record updates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_id: Option<ServerId>,
    pub error: String,
}

/// Outcome of one sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Run-wide timestamp stamped on every history sample.
    pub timestamp: u64,
    /// Records handed to the engine.
    pub received: usize,
    /// Records left after de-duplication and the cap.
    pub considered: usize,
    pub create_attempts: usize,
    pub created: usize,
    pub update_attempts: usize,
    pub updated: usize,
    pub history_attempts: usize,
    pub history_written: usize,
    pub failures: Vec<ChunkFailure>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

enum Operation {
    Create(Vec<ServerView>),
    Update(Vec<ServerView>),
    History(Vec<HistorySample>),
}

impl Operation {
    fn kind(&self) -> ChunkOp {
        match self {
            Self::Create(_) => ChunkOp::Create,
            Self::Update(_) => ChunkOp::Update,
            Self::History(_) => ChunkOp::History,
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Create(v) | Self::Update(v) => v.len(),
            Self::History(s) => s.len(),
        }
    }
}

struct Outcome {
    op: ChunkOp,
    succeeded: usize,
    failures: Vec<ChunkFailure>,
}

/// Writes snapshots into a [`ServerStore`].
pub struct SyncEngine<S> {
    store: Arc<S>,
    options: SyncOptions,
}

impl<S: ServerStore> SyncEngine<S> {
    pub fn new(store: Arc<S>, options: SyncOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Persist one snapshot, stamping history with `timestamp`.
    ///
    /// Only the existence lookup can fail the pass as a whole; write
    /// failures end up in [`SyncReport::failures`].
    pub async fn sync(
        &self,
        views: Vec<ServerView>,
        timestamp: u64,
    ) -> Result<SyncReport, SyncError> {
        let started = Instant::now();
        let received = views.len();
        let views = prepare(views, self.options.max_servers);

        let ids: Vec<ServerId> = views.iter().map(|v| v.id.clone()).collect();
        let store = Arc::clone(&self.store);
        let existing = tokio::task::spawn_blocking(move || store.existing_ids(&ids)).await??;

        let (to_update, to_create): (Vec<ServerView>, Vec<ServerView>) =
            views.into_iter().partition(|v| existing.contains(&v.id));

        let mut report = SyncReport {
            timestamp,
            received,
            considered: to_create.len() + to_update.len(),
            create_attempts: to_create.len(),
            update_attempts: to_update.len(),
            history_attempts: to_create.len() + to_update.len(),
            ..Default::default()
        };
        debug!(
            received,
            create = to_create.len(),
            update = to_update.len(),
            "sync diff computed"
        );

        let mut operations = Vec::new();
        for chunk in to_create.chunks(self.options.chunk_size) {
            operations.push(Operation::Create(chunk.to_vec()));
            operations.push(Operation::History(samples(chunk, timestamp)));
        }
        for chunk in to_update.chunks(self.options.chunk_size) {
            operations.push(Operation::Update(chunk.to_vec()));
            operations.push(Operation::History(samples(chunk, timestamp)));
        }

        let semaphore = Arc::new(Semaphore::new(self.options.max_in_flight));
        let mut tasks = JoinSet::new();
        for operation in operations {
            let store = Arc::clone(&self.store);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let op = operation.kind();
                let records = operation.len();
                match tokio::task::spawn_blocking(move || apply(store.as_ref(), operation)).await {
                    Ok(outcome) => outcome,
                    Err(e) => Outcome {
                        op,
                        succeeded: 0,
                        failures: vec![ChunkFailure {
                            op,
                            records,
                            server_id: None,
                            error: e.to_string(),
                        }],
                    },
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(error = %e, "sync task aborted");
                    continue;
                }
            };
            match outcome.op {
                ChunkOp::Create => report.created += outcome.succeeded,
                ChunkOp::Update => report.updated += outcome.succeeded,
                ChunkOp::History => report.history_written += outcome.succeeded,
            }
            for failure in &outcome.failures {
                error!(
                    op = ?failure.op,
                    records = failure.records,
                    server_id = failure.server_id.as_deref().unwrap_or(""),
                    error = %failure.error,
                    "sync operation failed"
                );
            }
            report.failures.extend(outcome.failures);
        }

        info!(
            considered = report.considered,
            created = report.created,
            updated = report.updated,
            history = report.history_written,
            failures = report.failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "sync pass complete"
        );
        Ok(report)
    }
}

/// Most populated first, one record per id, at most `cap` records.
fn prepare(mut views: Vec<ServerView>, cap: usize) -> Vec<ServerView> {
    views.sort_by(|a, b| b.players_current.cmp(&a.players_current));
    let mut seen = HashSet::new();
    views.retain(|v| seen.insert(v.id.clone()));
    views.truncate(cap);
    views
}

fn samples(views: &[ServerView], timestamp: u64) -> Vec<HistorySample> {
    views
        .iter()
        .map(|v| HistorySample {
            server_id: v.id.clone(),
            clients: v.players_current,
            timestamp,
        })
        .collect()
}

fn apply<S: ServerStore>(store: &S, operation: Operation) -> Outcome {
    let op = operation.kind();
    let records = operation.len();
    let chunk_failure = |e: srvlist_state::StateError| ChunkFailure {
        op,
        records,
        server_id: None,
        error: e.to_string(),
    };

    match operation {
        Operation::Create(views) => match store.insert_servers(&views) {
            Ok(n) => Outcome { op, succeeded: n, failures: Vec::new() },
            Err(e) => Outcome { op, succeeded: 0, failures: vec![chunk_failure(e)] },
        },
        Operation::History(samples) => match store.insert_history(&samples) {
            Ok(n) => Outcome { op, succeeded: n, failures: Vec::new() },
            Err(e) => Outcome { op, succeeded: 0, failures: vec![chunk_failure(e)] },
        },
        Operation::Update(views) => {
            let mut succeeded = 0;
            let mut failures = Vec::new();
            for view in &views {
                match store.update_server(view) {
                    Ok(()) => succeeded += 1,
                    Err(e) => failures.push(ChunkFailure {
                        op,
                        records: 1,
                        server_id: Some(view.id.clone()),
                        error: e.to_string(),
                    }),
                }
            }
            Outcome { op, succeeded, failures }
        }
    }
}
