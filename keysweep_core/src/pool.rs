//! Bounded-concurrency worker pool over a shared task queue
//!
//! [`WorkerPool::run_bounded`] drains a [`TaskQueue`] with a fixed number of
//! cooperative consumers. A task failure cancels further dequeues without
//! interrupting tasks already in flight; when every consumer has returned,
//! a non-empty error list becomes a single [`AggregateFailure`] carrying
//! all of them. The pool is reused by the scan phase (high ceiling) and the
//! write phase (low ceiling, to cap write amplification against the store).
//!
//! Queue pops and status writes are guarded by `std::sync` primitives and
//! never held across an await, so the pool behaves the same on a
//! multi-threaded runtime as on the single-threaded one.

use crate::error::{AggregateFailure, Error, Result};
use crate::record::{Query, Record};
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// One unit of work, dispatched by direct match on its kind
#[derive(Debug, Clone)]
pub enum Task {
    /// Scan one object type's records for duplicates
    Scan(Query),
    /// Write one repaired record back to the store
    Update {
        object_type: String,
        record: Record,
    },
}

/// Shared ordered backlog of pending tasks, consumed exactly once per entry
#[derive(Debug, Clone, Default)]
pub struct TaskQueue {
    inner: Arc<Mutex<VecDeque<Task>>>,
}

impl TaskQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a queue pre-filled with `tasks`, in order
    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(tasks.into())),
        }
    }

    /// Append a task to the back of the queue
    pub fn push(&self, task: Task) {
        self.inner.lock().expect("task queue lock poisoned").push_back(task);
    }

    /// Take the next task; a popped task is never redelivered
    pub fn pop(&self) -> Option<Task> {
        self.inner.lock().expect("task queue lock poisoned").pop_front()
    }

    /// Number of tasks still queued
    pub fn len(&self) -> usize {
        self.inner.lock().expect("task queue lock poisoned").len()
    }

    /// True when no tasks remain
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shared status of one pool run: a write-once cancellation flag and an
/// append-only error list
#[derive(Debug, Default)]
pub struct ExecutionStatus {
    cancelled: AtomicBool,
    errors: Mutex<Vec<Error>>,
}

impl ExecutionStatus {
    /// Fresh status for a new run
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Record an error and stop further dequeues. In-flight tasks finish.
    pub fn fail(&self, error: Error) {
        self.record_error(error);
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Record an error without cancelling; used by best-effort phases that
    /// let sibling tasks proceed while still surfacing every failure
    pub fn record_error(&self, error: Error) {
        self.errors
            .lock()
            .expect("status lock poisoned")
            .push(error);
    }

    /// Number of errors recorded so far
    pub fn error_count(&self) -> usize {
        self.errors.lock().expect("status lock poisoned").len()
    }

    fn take_errors(&self) -> Vec<Error> {
        std::mem::take(&mut *self.errors.lock().expect("status lock poisoned"))
    }
}

/// Executes one task. Implementations dispatch on the task kind and may
/// record best-effort errors on the status instead of returning them.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run(&self, task: Task, status: &ExecutionStatus) -> Result<()>;
}

/// Bounded worker pool primitive, reusable by any batch operation
pub struct WorkerPool;

impl WorkerPool {
    /// Drain `queue` with up to `limit` concurrent consumers.
    ///
    /// Returns `Ok(())` once the queue is empty and no errors were recorded.
    /// Any runner error cancels further dequeues; once all consumers have
    /// returned, recorded errors are surfaced together as an
    /// [`AggregateFailure`]. No ordering is guaranteed across consumers;
    /// each consumer drains sequentially in queue order.
    pub async fn run_bounded<R>(runner: &R, queue: &TaskQueue, limit: usize) -> Result<()>
    where
        R: TaskRunner + ?Sized,
    {
        let status = ExecutionStatus::new();
        let consumers = (0..limit.max(1)).map(|_| Self::consume(runner, queue, &status));
        join_all(consumers).await;

        let errors = status.take_errors();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Aggregate(AggregateFailure::new(errors)))
        }
    }

    async fn consume<R>(runner: &R, queue: &TaskQueue, status: &ExecutionStatus)
    where
        R: TaskRunner + ?Sized,
    {
        loop {
            if status.is_cancelled() {
                break;
            }
            let Some(task) = queue.pop() else {
                break;
            };
            if let Err(e) = runner.run(task, status).await {
                status.fail(e);
            }
        }
    }
}
