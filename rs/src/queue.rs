//! Single-concurrency FIFO task queue.
//!
//! Every mutation of the working copy (writes, syncs) is submitted here so
//! that at most one is in flight. [`TaskQueue::add`] enqueues synchronously
//! and hands back a [`TaskHandle`] that resolves with the job's result.
//!
//! A single worker task drains the queue in submission order. Each job is
//! spawned and awaited to completion before the next one starts, so a job
//! that fails or panics only affects its own handle, and a job keeps running
//! even if nobody awaits its handle any more.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use crate::error::{Error, Result};

type BoxedJob = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

struct QueuedTask {
    id: u64,
    run: BoxedJob,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: AtomicUsize,
    busy: AtomicBool,
    next_id: AtomicU64,
}

/// Handle to the queue. Cheap to clone; all clones share one worker.
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::UnboundedSender<QueuedTask>,
    state: Arc<QueueState>,
    limit: Option<usize>,
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("pending", &self.pending())
            .field("busy", &self.is_busy())
            .field("limit", &self.limit)
            .finish()
    }
}

impl TaskQueue {
    /// An unbounded queue. Must be called inside a tokio runtime.
    pub fn new() -> Self {
        Self::with_limit(None)
    }

    /// A queue that rejects new tasks with [`Error::QueueFull`] once `limit`
    /// tasks are waiting.
    pub fn bounded(limit: usize) -> Self {
        Self::with_limit(Some(limit))
    }

    fn with_limit(limit: Option<usize>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(QueueState::default());
        tokio::spawn(drain(rx, Arc::clone(&state)));
        Self { tx, state, limit }
    }

    /// Number of tasks waiting to start.
    pub fn pending(&self) -> usize {
        self.state.pending.load(Ordering::SeqCst)
    }

    /// Whether a task is currently running.
    pub fn is_busy(&self) -> bool {
        self.state.busy.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.pending() == 0
    }

    /// Enqueue `job` and return immediately.
    ///
    /// The job runs once every previously added job has finished. Its
    /// result, or [`Error::TaskAborted`] if it panicked, is delivered
    /// through the returned handle.
    pub fn add<F, Fut, T>(&self, job: F) -> TaskHandle<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        if let Some(limit) = self.limit {
            let reserved = self
                .state
                .pending
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                    (n < limit).then_some(n + 1)
                });
            if let Err(n) = reserved {
                return TaskHandle::rejected(Error::QueueFull(n));
            }
        } else {
            self.state.pending.fetch_add(1, Ordering::SeqCst);
        }

        let (done, rx) = oneshot::channel();
        let id = self.state.next_id.fetch_add(1, Ordering::SeqCst);
        let run: BoxedJob = Box::new(move || {
            Box::pin(async move {
                let result = job().await;
                // The caller may have stopped waiting; the job still ran.
                if let Err(Err(e)) = done.send(result) {
                    warn!(task = id, error = %e, "unobserved task failed");
                }
            })
        });

        if self.tx.send(QueuedTask { id, run }).is_err() {
            self.state.pending.fetch_sub(1, Ordering::SeqCst);
            return TaskHandle::rejected(Error::QueueClosed);
        }
        debug!(task = id, pending = self.pending(), "task queued");

        TaskHandle {
            state: HandleState::Waiting(rx),
        }
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

async fn drain(mut rx: mpsc::UnboundedReceiver<QueuedTask>, state: Arc<QueueState>) {
    while let Some(task) = rx.recv().await {
        state.pending.fetch_sub(1, Ordering::SeqCst);
        state.busy.store(true, Ordering::SeqCst);
        debug!(task = task.id, "task started");

        if let Err(e) = tokio::spawn((task.run)()).await {
            error!(task = task.id, error = %e, "task panicked");
        }

        state.busy.store(false, Ordering::SeqCst);
        debug!(task = task.id, "task finished");
    }
}

// ---------------------------------------------------------------------------
// TaskHandle
// ---------------------------------------------------------------------------

enum HandleState<T> {
    Waiting(oneshot::Receiver<Result<T>>),
    Rejected(Option<Error>),
}

/// Completion handle returned by [`TaskQueue::add`]; a future resolving to
/// the job's result.
pub struct TaskHandle<T> {
    state: HandleState<T>,
}

impl<T> TaskHandle<T> {
    fn rejected(err: Error) -> Self {
        Self {
            state: HandleState::Rejected(Some(err)),
        }
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            HandleState::Waiting(rx) => Pin::new(rx)
                .poll(cx)
                .map(|received| received.unwrap_or(Err(Error::TaskAborted))),
            HandleState::Rejected(err) => {
                Poll::Ready(Err(err.take().unwrap_or(Error::QueueClosed)))
            }
        }
    }
}
