//! The [`PodcastArchiver`] facade
//!
//! Owns the database, the source registry, the object store, the task chain
//! and the event channel, and exposes the operations the REST API and
//! embedding applications need.

use crate::config::{Config, DispatchMode};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::fetcher;
use crate::parser::SourceRegistry;
use crate::portability::{self, SubscriptionRecord};
use crate::publish;
use crate::storage::{FsObjectStore, ObjectStore, PartitionedArchiver};
use crate::sync::SyncOrchestrator;
use crate::tasks::{HttpTaskDispatcher, LocalTaskQueue, Task, TaskDispatcher, TaskRunner};
use crate::types::{Event, Subscription, SubscriptionId};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;

mod lifecycle;

/// Broadcast buffer of the event channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Main entry point: a podcast archiver instance
#[derive(Clone)]
pub struct PodcastArchiver {
    /// Database handle
    pub db: Arc<Database>,
    pub(crate) event_tx: broadcast::Sender<Event>,
    pub(crate) config: Arc<Config>,
    pub(crate) registry: Arc<SourceRegistry>,
    pub(crate) archiver: Arc<PartitionedArchiver>,
    pub(crate) runner: TaskRunner,
    /// Present in local dispatch mode
    pub(crate) queue: Option<LocalTaskQueue>,
    pub(crate) cancel: CancellationToken,
    pub(crate) background: Arc<Mutex<Vec<tokio::task::JoinHandle<()>>>>,
}

impl PodcastArchiver {
    /// Create an archiver from configuration
    ///
    /// This initializes every collaborator:
    /// - Opens/creates the SQLite database and runs migrations
    /// - Opens the directory-backed object store at `storage.root`
    /// - Builds the shared HTTP client and the standard source registry
    /// - Selects the task dispatcher configured in `tasks.dispatch`
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let db = Database::new(&config.persistence.database_path).await?;
        let store =
            FsObjectStore::new(config.storage.root.clone(), config.storage.compose_limit).await?;
        let client = fetcher::build_client(&config.fetch)?;
        let registry = SourceRegistry::standard(&config, client.clone())?;

        Self::from_parts(config, Arc::new(db), Arc::new(store), registry, client)
    }

    /// Create an archiver from already-built collaborators
    pub fn from_parts(
        config: Config,
        db: Arc<Database>,
        store: Arc<dyn ObjectStore>,
        registry: SourceRegistry,
        client: reqwest::Client,
    ) -> Result<Self> {
        config.validate()?;

        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let registry = Arc::new(registry);
        let archiver = Arc::new(PartitionedArchiver::new(store, &config.storage));

        let orchestrator = SyncOrchestrator::new(
            db.clone(),
            registry.clone(),
            archiver.clone(),
            config.sync.clone(),
            event_tx.clone(),
        );

        let (queue, dispatcher): (Option<LocalTaskQueue>, Arc<dyn TaskDispatcher>) =
            match &config.tasks.dispatch {
                DispatchMode::Local => {
                    let queue = LocalTaskQueue::new(config.tasks.max_concurrent);
                    (Some(queue.clone()), Arc::new(queue))
                }
                DispatchMode::Http { base_url } => (
                    None,
                    Arc::new(HttpTaskDispatcher::new(
                        client,
                        base_url.clone(),
                        config.tasks.task_api_key.clone(),
                    )),
                ),
            };

        tracing::info!(
            parsers = ?registry.names(),
            dispatch = ?config.tasks.dispatch,
            "podcast archiver initialized"
        );

        Ok(Self {
            runner: TaskRunner::new(db.clone(), orchestrator, dispatcher),
            db,
            event_tx,
            config: Arc::new(config),
            registry,
            archiver,
            queue,
            cancel: CancellationToken::new(),
            background: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Subscribe to pipeline events
    ///
    /// Each receiver gets every event independently; a receiver that falls
    /// more than the channel capacity behind gets `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Registered source types
    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// The object store media is archived into
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        self.archiver.store()
    }

    /// The sync step runner
    pub fn orchestrator(&self) -> &SyncOrchestrator {
        self.runner.orchestrator()
    }

    /// Create a subscription of `owner`
    pub async fn add_subscription(
        &self,
        owner: &str,
        record: SubscriptionRecord,
    ) -> Result<Subscription> {
        validate_owner(owner)?;
        if record.title.trim().is_empty() {
            return Err(Error::Validation("title must not be empty".to_string()));
        }
        record.validate(&self.registry, self.config.sync.max_sources_per_subscription)?;

        let id = self
            .db
            .insert_subscription(&record.into_subscription(owner))
            .await?;
        tracing::info!(subscription_id = %id, owner = %owner, "subscription created");
        self.get_subscription(owner, id).await
    }

    /// Load a subscription with its feed
    pub async fn get_subscription(&self, owner: &str, id: SubscriptionId) -> Result<Subscription> {
        self.db
            .get_subscription(owner, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("subscription {} of '{}'", id, owner)))
    }

    /// All subscriptions of `owner`
    pub async fn list_subscriptions(&self, owner: &str) -> Result<Vec<Subscription>> {
        self.db.list_subscriptions(owner).await
    }

    /// Delete a subscription and its stored media
    pub async fn delete_subscription(&self, owner: &str, id: SubscriptionId) -> Result<()> {
        if self.orchestrator().delete_subscription(owner, id).await? {
            Ok(())
        } else {
            Err(Error::NotFound(format!("subscription {} of '{}'", id, owner)))
        }
    }

    /// Every subscription of `owner` in portable form
    pub async fn export_subscriptions(&self, owner: &str) -> Result<Vec<SubscriptionRecord>> {
        portability::export_subscriptions(&self.db, owner).await
    }

    /// Create one subscription of `owner` per record
    pub async fn import_subscriptions(
        &self,
        owner: &str,
        records: Vec<SubscriptionRecord>,
    ) -> Result<Vec<SubscriptionId>> {
        validate_owner(owner)?;
        portability::import_subscriptions(
            &self.db,
            &self.registry,
            self.config.sync.max_sources_per_subscription,
            owner,
            records,
        )
        .await
    }

    /// Render the published RSS document of a subscription.
    ///
    /// Counts as an access for the subscription retention policy.
    pub async fn render_feed(
        &self,
        owner: &str,
        id: SubscriptionId,
        self_url: &str,
    ) -> Result<String> {
        if !self.db.touch_accessed(owner, id, Utc::now()).await? {
            return Err(Error::NotFound(format!("subscription {} of '{}'", id, owner)));
        }
        let subscription = self.get_subscription(owner, id).await?;
        Ok(publish::render_feed(&subscription, self_url))
    }

    /// Execute a task to completion in the calling task
    pub async fn run_task(&self, task: Task) -> Result<Vec<Task>> {
        self.runner.run(task).await
    }

    /// Accept a task for background execution.
    ///
    /// In local mode the task joins the bounded queue; otherwise it runs on a
    /// detached tokio task and its failure is only logged.
    pub async fn submit_task(&self, task: Task) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::ShuttingDown);
        }
        match &self.queue {
            Some(queue) => queue.dispatch(task).await,
            None => {
                let runner = self.runner.clone();
                tokio::spawn(async move {
                    if let Err(e) = runner.run(task.clone()).await {
                        tracing::warn!(task = %task, error = %e, "task failed");
                    }
                });
                Ok(())
            }
        }
    }

    /// Start a sync cycle now
    pub async fn start_cycle(&self) -> Result<()> {
        self.submit_task(Task::StartCycle).await
    }

    /// Wait until the local queue has drained. Returns at once in HTTP mode.
    pub async fn wait_idle(&self) {
        if let Some(queue) = &self.queue {
            queue.wait_idle().await;
        }
    }
}

#[async_trait]
impl TaskDispatcher for PodcastArchiver {
    async fn dispatch(&self, task: Task) -> Result<()> {
        self.submit_task(task).await
    }
}

/// Owners become a storage path segment, so they may not be empty, contain
/// `/` or start with `.`
fn validate_owner(owner: &str) -> Result<()> {
    if owner.is_empty() || owner.contains('/') || owner.starts_with('.') {
        return Err(Error::Validation(format!("invalid owner '{}'", owner)));
    }
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
