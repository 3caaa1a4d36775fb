//! Startup and shutdown coordination.

use super::PodcastArchiver;
use crate::error::Result;
use crate::tasks::CycleScheduler;
use std::sync::Arc;
use std::time::Duration;

/// How long shutdown waits for background workers
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

impl PodcastArchiver {
    /// Start the background workers
    ///
    /// - In local dispatch mode, the task queue worker
    /// - When `sync.schedule_cycles` is set, the cycle scheduler
    ///
    /// Calling this more than once starts duplicate workers.
    pub async fn start(&self) {
        let mut background = self.background.lock().await;

        if let Some(queue) = &self.queue {
            background.push(queue.start(Arc::new(self.runner.clone())));
        }

        if self.config.sync.schedule_cycles {
            let scheduler = CycleScheduler::new(
                Arc::new(self.clone()),
                self.config.sync.cycle_interval,
                self.cancel.child_token(),
            );
            background.push(tokio::spawn(scheduler.run()));
        }

        tracing::info!(workers = background.len(), "background workers started");
    }

    /// Spawn the REST API server in a background task
    pub fn spawn_api_server(self: &Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        let archiver = self.clone();
        let config = self.config.clone();
        let shutdown = self.cancel.clone();

        tokio::spawn(async move {
            crate::api::start_api_server(archiver, config, shutdown.cancelled_owned()).await
        })
    }

    /// Gracefully shut down
    ///
    /// 1. Stops the scheduler and rejects new tasks
    /// 2. Drops queued tasks and waits for running ones (bounded by a timeout)
    /// 3. Closes the database pool
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");
        self.cancel.cancel();

        if let Some(queue) = &self.queue {
            queue.shutdown().await;
        }

        let handles: Vec<_> = self.background.lock().await.drain(..).collect();
        let wait = futures::future::join_all(handles);
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, wait).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        tracing::warn!(error = %e, "background worker ended abnormally");
                    }
                }
            }
            Err(_) => {
                tracing::warn!("Timeout waiting for background workers, proceeding with shutdown");
            }
        }

        self.db.pool().close().await;
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }
}
