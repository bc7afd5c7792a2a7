use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{error, warn};

use crate::StoreError;

type Task = Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'static>>;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("write did not finish within {0:?}")]
    TimedOut(Duration),

    #[error("write task panicked: {0}")]
    Panicked(String),

    #[error("write queue is not running")]
    Stopped,
}

struct Job {
    task: Task,
    deadline: Instant,
    reply: oneshot::Sender<Result<(), WriteError>>,
}

/// Single-writer FIFO queue in front of the store.
///
/// Tasks run one at a time in submission order. A failed task never blocks
/// the ones behind it.
///
/// The timeout is counted from `enqueue`, so a caller stuck behind a stalled
/// task still gets `TimedOut` on time. A task whose deadline passed while it
/// waited is skipped and never runs. A task that outlives its deadline while
/// running gets one more `task_timeout` to finish before the worker aborts it
/// and moves on.
#[derive(Clone)]
pub struct WriteSerializer {
    tx: mpsc::UnboundedSender<Job>,
    task_timeout: Duration,
}

impl WriteSerializer {
    /// Spawns the worker; must be called inside a tokio runtime.
    pub fn start(task_timeout: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_queue(rx, task_timeout));
        Self { tx, task_timeout }
    }

    /// Queues `task` immediately; the returned future resolves once it ran
    /// or its deadline passed.
    pub fn enqueue<F>(&self, task: F) -> impl Future<Output = Result<(), WriteError>> + Send + 'static
    where
        F: Future<Output = Result<(), StoreError>> + Send + 'static,
    {
        let task_timeout = self.task_timeout;
        let deadline = Instant::now() + task_timeout;
        let (reply, done) = oneshot::channel();
        let queued = self
            .tx
            .send(Job {
                task: Box::pin(task),
                deadline,
                reply,
            })
            .map_err(|_| WriteError::Stopped);

        async move {
            queued?;
            match tokio::time::timeout_at(deadline, done).await {
                Ok(replied) => replied.map_err(|_| WriteError::Stopped)?,
                Err(_) => Err(WriteError::TimedOut(task_timeout)),
            }
        }
    }
}

async fn run_queue(mut rx: mpsc::UnboundedReceiver<Job>, task_timeout: Duration) {
    while let Some(Job {
        task,
        deadline,
        reply,
    }) = rx.recv().await
    {
        if Instant::now() >= deadline {
            warn!(timeout = ?task_timeout, "write task expired in the queue; skipping it");
            let _ = reply.send(Err(WriteError::TimedOut(task_timeout)));
            continue;
        }

        let mut handle = tokio::spawn(task);
        let outcome = match tokio::time::timeout_at(deadline, &mut handle).await {
            Ok(joined) => flatten(joined),
            Err(_) => {
                warn!(timeout = ?task_timeout, "write task timed out; waiting once more before aborting it");
                match tokio::time::timeout(task_timeout, &mut handle).await {
                    Ok(joined) => {
                        if let Err(e) = flatten(joined) {
                            error!("timed out write task failed: {e}");
                        }
                    }
                    Err(_) => {
                        handle.abort();
                        error!(timeout = ?task_timeout, "write task still stalled; aborted");
                    }
                }
                Err(WriteError::TimedOut(task_timeout))
            }
        };

        if let Err(e) = &outcome {
            error!("write task failed: {e}");
        }
        // caller may have gone away; the write still happened
        let _ = reply.send(outcome);
    }
}

fn flatten(
    joined: Result<Result<(), StoreError>, tokio::task::JoinError>,
) -> Result<(), WriteError> {
    match joined {
        Ok(r) => r.map_err(WriteError::Store),
        Err(e) => Err(WriteError::Panicked(e.to_string())),
    }
}
