//! In-process task queue
//!
//! Tasks are queued FIFO and executed on tokio, at most `max_concurrent` at a
//! time. Continuations dispatched by a running task are counted as pending
//! before the parent finishes, so [`LocalTaskQueue::wait_idle`] only returns
//! once a whole chain has drained.

use super::{Task, TaskDispatcher, TaskHandler};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long the worker sleeps when the queue is empty
const QUEUE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How often `wait_idle` re-checks the pending count
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// FIFO task queue executed by a bounded tokio worker
#[derive(Clone)]
pub struct LocalTaskQueue {
    queue: Arc<Mutex<VecDeque<Task>>>,
    concurrent_limit: Arc<Semaphore>,
    max_concurrent: u32,
    /// Queued plus running tasks
    pending: Arc<AtomicUsize>,
    cancel: CancellationToken,
}

impl LocalTaskQueue {
    /// Create a queue running at most `max_concurrent` tasks at once
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.clamp(1, Semaphore::MAX_PERMITS) as u32;
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            concurrent_limit: Arc::new(Semaphore::new(max_concurrent as usize)),
            max_concurrent,
            pending: Arc::new(AtomicUsize::new(0)),
            cancel: CancellationToken::new(),
        }
    }

    /// Number of queued and running tasks
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Whether [`shutdown`](Self::shutdown) has been called
    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Start the worker loop executing queued tasks with `handler`
    pub fn start(&self, handler: Arc<dyn TaskHandler>) -> tokio::task::JoinHandle<()> {
        let queue = self.queue.clone();
        let concurrent_limit = self.concurrent_limit.clone();
        let pending = self.pending.clone();
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            info!("task queue started");
            loop {
                if cancel.is_cancelled() {
                    break;
                }

                let next = {
                    let mut queue_guard = queue.lock().await;
                    queue_guard.pop_front()
                };

                let Some(task) = next else {
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = tokio::time::sleep(QUEUE_POLL_INTERVAL) => {}
                    }
                    continue;
                };

                let permit = tokio::select! {
                    permit = concurrent_limit.clone().acquire_owned() => permit.ok(),
                    _ = cancel.cancelled() => None,
                };
                let Some(permit) = permit else {
                    pending.fetch_sub(1, Ordering::SeqCst);
                    break;
                };

                let handler = handler.clone();
                let pending = pending.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    debug!(task = %task, "running task");
                    if let Err(e) = handler.handle(task.clone()).await {
                        warn!(task = %task, error = %e, "task failed");
                    }
                    pending.fetch_sub(1, Ordering::SeqCst);
                });
            }
            info!("task queue stopped");
        })
    }

    /// Wait until no task is queued or running
    pub async fn wait_idle(&self) {
        while self.pending() > 0 {
            tokio::time::sleep(IDLE_POLL_INTERVAL).await;
        }
    }

    /// Stop accepting tasks, drop queued ones and wait for running ones
    pub async fn shutdown(&self) {
        self.cancel.cancel();

        let dropped = {
            let mut queue_guard = self.queue.lock().await;
            let dropped = queue_guard.len();
            queue_guard.clear();
            dropped
        };
        self.pending.fetch_sub(dropped, Ordering::SeqCst);
        if dropped > 0 {
            info!(dropped, "dropped queued tasks on shutdown");
        }

        // Holding every permit means no task is running
        if let Ok(permits) = self.concurrent_limit.acquire_many(self.max_concurrent).await {
            permits.forget();
        }
        self.concurrent_limit.close();
    }
}

#[async_trait]
impl TaskDispatcher for LocalTaskQueue {
    async fn dispatch(&self, task: Task) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::ShuttingDown);
        }
        let mut queue_guard = self.queue.lock().await;
        self.pending.fetch_add(1, Ordering::SeqCst);
        debug!(task = %task, "task queued");
        queue_guard.push_back(task);
        Ok(())
    }
}
