//! Run queue.
//!
//! Triggers submit jobs to a single worker, so passes within one process
//! never overlap; extra triggers wait their turn until the queue is full.
//! Each job carries a `oneshot` sender for its result; the last finished
//! run is kept for the status endpoint.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{RwLock, mpsc, oneshot, watch};
use tracing::{error, info, warn};

use crate::error::RunnerError;
use crate::run::RunReport;

pub type RunId = u64;

/// Jobs accepted beyond the one currently running.
const QUEUE_DEPTH: usize = 8;

type RunResult = Result<RunReport, String>;

struct Job {
    id: RunId,
    reply: oneshot::Sender<RunResult>,
}

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub id: RunId,
    pub ok: bool,
    pub finished_at: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<RunReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A submitted run.
pub struct RunHandle {
    pub id: RunId,
    result: oneshot::Receiver<RunResult>,
}

impl RunHandle {
    /// Wait for the run to finish.
    pub async fn wait(self) -> Result<RunReport, RunnerError> {
        match self.result.await {
            Ok(Ok(report)) => Ok(report),
            Ok(Err(message)) => Err(RunnerError::Failed { id: self.id, message }),
            Err(_) => Err(RunnerError::Stopped),
        }
    }
}

struct Shared {
    jobs: mpsc::Sender<Job>,
    next_id: AtomicU64,
    last: RwLock<Option<RunSummary>>,
}

/// Cheap to clone; all clones feed the same worker.
#[derive(Clone)]
pub struct Runner {
    shared: Arc<Shared>,
}

impl Runner {
    /// Start the worker. `run` is invoked once per submitted run; the
    /// worker exits when `shutdown` flips.
    pub fn spawn<F, Fut>(run: F, mut shutdown: watch::Receiver<bool>) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<RunReport>> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<Job>(QUEUE_DEPTH);
        let shared = Arc::new(Shared {
            jobs: tx,
            next_id: AtomicU64::new(1),
            last: RwLock::new(None),
        });

        let worker = Arc::clone(&shared);
        tokio::spawn(async move {
            info!("run worker started");
            loop {
                let job = tokio::select! {
                    job = rx.recv() => match job {
                        Some(job) => job,
                        None => break,
                    },
                    _ = shutdown.changed() => break,
                };

                info!(run_id = job.id, "run started");
                let result = run().await.map_err(|e| format!("{e:#}"));
                let summary = RunSummary {
                    id: job.id,
                    ok: result.is_ok(),
                    finished_at: crate::epoch_secs(),
                    report: result.as_ref().ok().cloned(),
                    error: result.as_ref().err().cloned(),
                };
                match &summary.error {
                    Some(e) => error!(run_id = job.id, error = %e, "run failed"),
                    None => info!(run_id = job.id, "run succeeded"),
                }
                *worker.last.write().await = Some(summary);
                // The submitter may have stopped waiting.
                let _ = job.reply.send(result);
            }
            info!("run worker stopped");
        });

        Self { shared }
    }

    /// Queue a run.
    pub fn submit(&self) -> Result<RunHandle, RunnerError> {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply, result) = oneshot::channel();
        self.shared
            .jobs
            .try_send(Job { id, reply })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => RunnerError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => RunnerError::Stopped,
            })?;
        info!(run_id = id, "run queued");
        Ok(RunHandle { id, result })
    }

    /// The most recently finished run, if any.
    pub async fn last_run(&self) -> Option<RunSummary> {
        self.shared.last.read().await.clone()
    }

    /// Submit a run every `interval` until `shutdown` flips.
    pub async fn schedule(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = interval.as_secs(), "run scheduler started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if let Err(e) = self.submit() {
                        warn!(error = %e, "scheduled run not queued");
                    }
                }
                _ = shutdown.changed() => {
                    info!("run scheduler shutting down");
                    break;
                }
            }
        }
    }
}
