//! Bounded-concurrency task runner.
//!
//! [`TaskRunner`] accepts boxed units of work, queues up to
//! `queue_capacity` of them, and runs at most `concurrency` at a time on
//! the Tokio runtime. Submission never waits: a full queue is reported as
//! [`CoreError::Capacity`].
//!
//! Every task receives a [`CompletionHook`] which releases its execution
//! slot. The slot is also released if the hook is dropped without being
//! called (for example when the task panics), so a misbehaving task can
//! never shrink the pool.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::CoreError;

/// Callback a task invokes once its work is finished.
pub type CompletionHook = Box<dyn FnOnce() + Send + 'static>;

/// A unit of work accepted by [`TaskRunner::submit`].
pub type Task = Box<dyn FnOnce(CompletionHook) -> BoxFuture<'static, ()> + Send + 'static>;

/// Runs submitted tasks with bounded concurrency.
///
/// Created once at startup via [`TaskRunner::start`]; the returned `Arc`
/// is shared with the job registry.
pub struct TaskRunner {
    queue: mpsc::Sender<Task>,
    active: Arc<AtomicUsize>,
    concurrency: usize,
    cancel: CancellationToken,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

/// Execution slot held by a running task.
struct Slot {
    _permit: OwnedSemaphorePermit,
    active: Arc<AtomicUsize>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

impl TaskRunner {
    /// Spawn the dispatch loop and return a shared handle.
    ///
    /// Both limits are clamped to at least 1. Must be called from within a
    /// Tokio runtime.
    pub fn start(concurrency: usize, queue_capacity: usize) -> Arc<Self> {
        let concurrency = concurrency.max(1);
        let (queue, rx) = mpsc::channel(queue_capacity.max(1));
        let active = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(dispatch_loop(
            rx,
            Arc::new(Semaphore::new(concurrency)),
            Arc::clone(&active),
            cancel.clone(),
        ));

        tracing::info!(concurrency, queue_capacity, "Task runner started");

        Arc::new(Self {
            queue,
            active,
            concurrency,
            cancel,
            dispatcher: Mutex::new(Some(handle)),
        })
    }

    /// Queue a task for execution without waiting for a free slot.
    pub fn submit(&self, task: Task) -> Result<(), CoreError> {
        self.queue.try_send(task).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                CoreError::Capacity("task runner queue is full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => {
                CoreError::Internal("task runner is stopped".to_string())
            }
        })
    }

    /// Number of tasks currently holding an execution slot.
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Maximum number of tasks run at once.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Stop dispatching. Tasks still queued are dropped; tasks already
    /// running are left to finish on their own.
    pub async fn stop(&self) {
        self.cancel.cancel();

        let handle = self.dispatcher.lock().ok().and_then(|mut h| h.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Task runner dispatch loop failed");
            }
        }

        tracing::info!(active = self.active_count(), "Task runner stopped");
    }
}

/// Pull tasks off the queue as slots become free and spawn them.
async fn dispatch_loop(
    mut rx: mpsc::Receiver<Task>,
    slots: Arc<Semaphore>,
    active: Arc<AtomicUsize>,
    cancel: CancellationToken,
) {
    loop {
        // Wait for a slot first so queued tasks keep counting against the
        // queue capacity while the pool is saturated.
        let permit = tokio::select! {
            _ = cancel.cancelled() => break,
            permit = Arc::clone(&slots).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let task = tokio::select! {
            _ = cancel.cancelled() => break,
            task = rx.recv() => match task {
                Some(task) => task,
                None => break,
            },
        };

        active.fetch_add(1, Ordering::SeqCst);
        let slot = Slot {
            _permit: permit,
            active: Arc::clone(&active),
        };
        let on_complete: CompletionHook = Box::new(move || drop(slot));

        tokio::spawn(task(on_complete));
    }

    tracing::debug!("Task runner dispatch loop exited");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
