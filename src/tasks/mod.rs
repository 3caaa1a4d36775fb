//! Self-rescheduling task chain
//!
//! Every unit of pipeline work is a [`Task`]. Executing a task does one
//! bounded step and hands any follow-up tasks to a [`TaskDispatcher`]:
//!
//! ```text
//! StartCycle -> QueueOwners -> QueueSubscriptions{owner}
//!            -> SyncSubscription{owner,id} -> ArchiveSubscription{owner,id} (repeats)
//! ```
//!
//! Dispatchers:
//! - [`LocalTaskQueue`] runs tasks in-process on tokio, bounded by a semaphore
//! - [`HttpTaskDispatcher`] posts tasks to the `/internal/*` endpoints of a
//!   (possibly remote) instance

use crate::error::{Error, Result};
use crate::types::SubscriptionId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

mod http;
mod local;
mod runner;
mod scheduler;

pub use http::HttpTaskDispatcher;
pub use local::LocalTaskQueue;
pub use runner::TaskRunner;
pub use scheduler::CycleScheduler;

/// One unit of pipeline work
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum Task {
    /// Begin a sync cycle
    StartCycle,
    /// Fan out to every owner
    QueueOwners,
    /// Reclaim stale subscriptions of an owner and fan out to the rest
    QueueSubscriptions {
        /// Owner identity
        owner: String,
    },
    /// Parse every source of a subscription
    SyncSubscription {
        /// Owner identity
        owner: String,
        /// Subscription ID
        id: SubscriptionId,
    },
    /// Archive at most one entry of a subscription
    ArchiveSubscription {
        /// Owner identity
        owner: String,
        /// Subscription ID
        id: SubscriptionId,
    },
}

/// Form body of the task endpoints
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct TaskForm {
    /// Owner identity (queue-subscriptions, sync-subscription, archive-subscription)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Subscription ID (sync-subscription, archive-subscription)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Shared secret of the task endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Endpoint names of every task, in chain order
pub const TASK_ENDPOINTS: [&str; 5] = [
    "start-cycle",
    "queue-owners",
    "queue-subscriptions",
    "sync-subscription",
    "archive-subscription",
];

impl Task {
    /// Endpoint name under `/internal/`
    pub fn endpoint(&self) -> &'static str {
        match self {
            Task::StartCycle => "start-cycle",
            Task::QueueOwners => "queue-owners",
            Task::QueueSubscriptions { .. } => "queue-subscriptions",
            Task::SyncSubscription { .. } => "sync-subscription",
            Task::ArchiveSubscription { .. } => "archive-subscription",
        }
    }

    /// Form fields carrying this task's arguments (without the API key)
    pub fn to_form(&self) -> TaskForm {
        match self {
            Task::StartCycle | Task::QueueOwners => TaskForm::default(),
            Task::QueueSubscriptions { owner } => TaskForm {
                owner: Some(owner.clone()),
                ..TaskForm::default()
            },
            Task::SyncSubscription { owner, id } | Task::ArchiveSubscription { owner, id } => {
                TaskForm {
                    owner: Some(owner.clone()),
                    id: Some(id.get()),
                    api_key: None,
                }
            }
        }
    }

    /// Rebuild a task from its endpoint name and form fields
    pub fn from_form(endpoint: &str, form: &TaskForm) -> Result<Self> {
        let owner = || {
            form.owner
                .clone()
                .filter(|o| !o.is_empty())
                .ok_or_else(|| Error::Validation(format!("{} requires an owner", endpoint)))
        };
        let id = || {
            form.id
                .map(SubscriptionId)
                .ok_or_else(|| Error::Validation(format!("{} requires an id", endpoint)))
        };

        match endpoint {
            "start-cycle" => Ok(Task::StartCycle),
            "queue-owners" => Ok(Task::QueueOwners),
            "queue-subscriptions" => Ok(Task::QueueSubscriptions { owner: owner()? }),
            "sync-subscription" => Ok(Task::SyncSubscription {
                owner: owner()?,
                id: id()?,
            }),
            "archive-subscription" => Ok(Task::ArchiveSubscription {
                owner: owner()?,
                id: id()?,
            }),
            other => Err(Error::NotFound(format!("task endpoint '{}'", other))),
        }
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Task::StartCycle | Task::QueueOwners => write!(f, "{}", self.endpoint()),
            Task::QueueSubscriptions { owner } => write!(f, "{}({})", self.endpoint(), owner),
            Task::SyncSubscription { owner, id } | Task::ArchiveSubscription { owner, id } => {
                write!(f, "{}({}/{})", self.endpoint(), owner, id)
            }
        }
    }
}

/// Hands tasks over for (eventual) execution
#[async_trait]
pub trait TaskDispatcher: Send + Sync {
    /// Enqueue `task`; returns once the task is accepted, not executed
    async fn dispatch(&self, task: Task) -> Result<()>;
}

/// Executes a task
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Run one task to completion
    async fn handle(&self, task: Task) -> Result<()>;
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
