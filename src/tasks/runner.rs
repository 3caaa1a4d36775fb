//! Executes tasks and hands their follow-ups to the dispatcher

use super::{Task, TaskDispatcher, TaskHandler};
use crate::db::Database;
use crate::error::Result;
use crate::sync::SyncOrchestrator;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

/// Runs one task per call: fan-out tasks enqueue their children, sync tasks
/// run one step and enqueue its continuation
#[derive(Clone)]
pub struct TaskRunner {
    db: Arc<Database>,
    orchestrator: SyncOrchestrator,
    dispatcher: Arc<dyn TaskDispatcher>,
}

impl TaskRunner {
    /// Create a runner issuing follow-up tasks through `dispatcher`
    pub fn new(
        db: Arc<Database>,
        orchestrator: SyncOrchestrator,
        dispatcher: Arc<dyn TaskDispatcher>,
    ) -> Self {
        Self {
            db,
            orchestrator,
            dispatcher,
        }
    }

    /// The orchestrator running sync steps
    pub fn orchestrator(&self) -> &SyncOrchestrator {
        &self.orchestrator
    }

    /// Execute `task` and return the tasks it enqueued
    pub async fn run(&self, task: Task) -> Result<Vec<Task>> {
        let follow_ups = match &task {
            Task::StartCycle => {
                info!("sync cycle started");
                vec![Task::QueueOwners]
            }
            Task::QueueOwners => self
                .db
                .list_owners()
                .await?
                .into_iter()
                .map(|owner| Task::QueueSubscriptions { owner })
                .collect(),
            Task::QueueSubscriptions { owner } => {
                let reclaimed = self.orchestrator.reclaim_stale(owner, Utc::now()).await?;
                if !reclaimed.is_empty() {
                    info!(owner = %owner, count = reclaimed.len(), "reclaimed stale subscriptions");
                }
                self.db
                    .list_subscription_ids(owner)
                    .await?
                    .into_iter()
                    .map(|id| Task::SyncSubscription {
                        owner: owner.clone(),
                        id,
                    })
                    .collect()
            }
            Task::SyncSubscription { .. } | Task::ArchiveSubscription { .. } => self
                .orchestrator
                .run_step(&task)
                .await?
                .continuation
                .into_iter()
                .collect(),
        };

        for follow_up in &follow_ups {
            self.dispatcher.dispatch(follow_up.clone()).await?;
        }
        debug!(task = %task, follow_ups = follow_ups.len(), "task completed");
        Ok(follow_ups)
    }
}

#[async_trait]
impl TaskHandler for TaskRunner {
    async fn handle(&self, task: Task) -> Result<()> {
        self.run(task).await.map(|_| ())
    }
}
