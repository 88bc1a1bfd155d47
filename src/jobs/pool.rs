use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Semaphore, mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::foundation::error::{PanoError, PanoResult};

/// How long a task gets to wind down after its deadline cancelled it.
const CANCEL_GRACE: Duration = Duration::from_secs(30);

/// Kind of background task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Panorama fly-through animation.
    Animation,
    /// Image/text embedding extraction.
    Embedding,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Animation => "animation",
            Self::Embedding => "embedding",
        })
    }
}

/// Task lifecycle: `Pending -> Running -> {Completed, Failed}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Waiting for a worker slot.
    Pending,
    /// Executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error, was cancelled, or panicked.
    Failed,
}

impl JobState {
    /// Return `true` for `Completed` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Completion record published on the pool's report channel.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TaskReport {
    /// Task kind.
    pub kind: TaskKind,
    /// Record the task worked on.
    pub content_hash: String,
    /// Terminal state.
    pub state: JobState,
    /// Wall time from start of execution (not queueing) to completion.
    pub elapsed_ms: u64,
    /// Summary on success, error text on failure.
    pub detail: Option<String>,
}

/// Pool limits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Tasks allowed to execute at once; further tasks wait as `Pending`.
    pub max_concurrent: usize,
    /// Per-task execution deadline, `None` for unbounded.
    pub deadline: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            deadline: Some(Duration::from_secs(600)),
        }
    }
}

/// Handle to a spawned task.
///
/// Dropping it detaches the task; it keeps running and still reports on the pool channel.
#[derive(Debug)]
pub struct TaskHandle {
    kind: TaskKind,
    content_hash: String,
    cancel: CancellationToken,
    state: watch::Receiver<JobState>,
    join: JoinHandle<TaskReport>,
}

impl TaskHandle {
    /// Task kind.
    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Record the task works on.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Current state.
    pub fn state(&self) -> JobState {
        *self.state.borrow()
    }

    /// Ask the task to stop. Cooperative: the task observes its token between units of work.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the task and return its report.
    pub async fn join(self) -> TaskReport {
        match self.join.await {
            Ok(report) => report,
            Err(e) => TaskReport {
                kind: self.kind,
                content_hash: self.content_hash,
                state: JobState::Failed,
                elapsed_ms: 0,
                detail: Some(format!("task runner lost: {e}")),
            },
        }
    }
}

/// Bounded fire-and-forget executor for background tasks.
///
/// At most `max_concurrent` tasks execute at once. Every task and every supervisor is tracked, so
/// [`TaskPool::shutdown`] can wait for all of them before the process exits.
#[derive(Clone, Debug)]
pub struct TaskPool {
    slots: Arc<Semaphore>,
    deadline: Option<Duration>,
    reports: mpsc::UnboundedSender<TaskReport>,
    tracker: TaskTracker,
}

impl TaskPool {
    /// Build a pool and the receiving end of its completion channel.
    pub fn new(config: PoolConfig) -> PanoResult<(Self, mpsc::UnboundedReceiver<TaskReport>)> {
        if config.max_concurrent == 0 {
            return Err(PanoError::input("max_concurrent must be >= 1"));
        }
        if config.deadline.is_some_and(|d| d.is_zero()) {
            return Err(PanoError::input("task deadline must be > 0 when set"));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let pool = Self {
            slots: Arc::new(Semaphore::new(config.max_concurrent)),
            deadline: config.deadline,
            reports: tx,
            tracker: TaskTracker::new(),
        };
        Ok((pool, rx))
    }

    /// Tasks and supervisors that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Spawn `body` as a background task and return immediately.
    ///
    /// `body` receives the task's cancellation token; it is cancelled on deadline expiry or
    /// [`TaskHandle::cancel`]. `Ok(summary)` completes the task, `Err` fails it. Failures stay
    /// local: they are reported and logged, never propagated to the caller or to other tasks.
    pub fn spawn<F, Fut>(&self, kind: TaskKind, content_hash: impl Into<String>, body: F) -> TaskHandle
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = PanoResult<String>> + Send + 'static,
    {
        let content_hash = content_hash.into();
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(JobState::Pending);

        let slots = Arc::clone(&self.slots);
        let deadline = self.deadline;
        let reports = self.reports.clone();
        let token = cancel.clone();
        let hash = content_hash.clone();

        let join = self.tracker.spawn(async move {
            let permit = slots.acquire_owned().await;
            let started = Instant::now();
            state_tx.send_replace(JobState::Running);
            tracing::info!(%kind, content_hash = %hash, "task started");

            let outcome = match permit {
                Err(_) => Err(PanoError::cancelled("task pool closed")),
                Ok(_) if token.is_cancelled() => Err(PanoError::cancelled("cancelled before start")),
                Ok(_permit) => await_body(tokio::spawn(body(token.clone())), deadline, &token).await,
            };

            let elapsed_ms = started.elapsed().as_millis() as u64;
            let report = match outcome {
                Ok(summary) => {
                    tracing::info!(%kind, content_hash = %hash, elapsed_ms, summary = %summary, "task completed");
                    TaskReport {
                        kind,
                        content_hash: hash,
                        state: JobState::Completed,
                        elapsed_ms,
                        detail: Some(summary),
                    }
                }
                Err(e) => {
                    tracing::warn!(%kind, content_hash = %hash, elapsed_ms, error = %e, "task failed");
                    TaskReport {
                        kind,
                        content_hash: hash,
                        state: JobState::Failed,
                        elapsed_ms,
                        detail: Some(e.to_string()),
                    }
                }
            };
            state_tx.send_replace(report.state);
            // Nobody listening is fine.
            let _ = reports.send(report.clone());
            report
        });

        TaskHandle {
            kind,
            content_hash,
            cancel,
            state: state_rx,
            join,
        }
    }

    /// Attach a detached watcher that joins `handle` and logs its outcome.
    ///
    /// Nothing waits on the watcher itself except [`TaskPool::shutdown`].
    pub fn supervise(&self, handle: TaskHandle) {
        self.tracker.spawn(async move {
            let report = handle.join().await;
            match report.state {
                JobState::Completed => tracing::info!(
                    kind = %report.kind,
                    content_hash = %report.content_hash,
                    elapsed_ms = report.elapsed_ms,
                    "supervised task finished"
                ),
                _ => tracing::warn!(
                    kind = %report.kind,
                    content_hash = %report.content_hash,
                    detail = report.detail.as_deref().unwrap_or(""),
                    "supervised task did not complete"
                ),
            }
        });
    }

    /// Wait for every task and watcher spawned so far to finish.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

async fn await_body(
    mut task: JoinHandle<PanoResult<String>>,
    deadline: Option<Duration>,
    cancel: &CancellationToken,
) -> PanoResult<String> {
    let limit = match deadline {
        None => return joined(task.await),
        Some(limit) => match tokio::time::timeout(limit, &mut task).await {
            Ok(res) => return joined(res),
            Err(_) => limit,
        },
    };

    tracing::warn!(deadline_ms = limit.as_millis() as u64, "task deadline expired, cancelling");
    cancel.cancel();
    if tokio::time::timeout(CANCEL_GRACE, &mut task).await.is_err() {
        task.abort();
    }
    Err(PanoError::cancelled(format!(
        "deadline of {}ms expired",
        limit.as_millis()
    )))
}

fn joined(res: Result<PanoResult<String>, JoinError>) -> PanoResult<String> {
    res.map_err(|e| PanoError::Other(anyhow::anyhow!("task aborted or panicked: {e}")))?
}

#[cfg(test)]
#[path = "../../tests/unit/jobs/pool.rs"]
mod tests;
