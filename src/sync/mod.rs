//! Per-subscription sync state machine
//!
//! [`SyncOrchestrator`] performs exactly one bounded step per invocation and
//! returns at most one continuation [`Task`]:
//!
//! | Step | Transition | Continuation |
//! |------|------------|--------------|
//! | [`parse_step`](SyncOrchestrator::parse_step) | ParsePending -> ArchivePending | `ArchiveSubscription` |
//! | [`archive_step`](SyncOrchestrator::archive_step), work left | ArchivePending -> ArchiveInProgress -> ArchivePending | `ArchiveSubscription` |
//! | [`archive_step`](SyncOrchestrator::archive_step), nothing left | ArchivePending -> Idle | none |
//!
//! The subscription is re-read right before every final write, so a step that
//! runs twice (duplicate task delivery) or races an edit never clobbers newer
//! state.

use crate::config::SyncConfig;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::feed::EntryIdentity;
use crate::parser::SourceRegistry;
use crate::storage::PartitionedArchiver;
use crate::tasks::Task;
use crate::types::{Event, Source, Subscription, SubscriptionId, SyncState};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::broadcast;

mod archive;
mod parse;

/// Result of one step
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepOutcome {
    /// State the subscription was left in
    pub state: SyncState,
    /// Follow-up task to enqueue, if any
    pub continuation: Option<Task>,
    /// Parse details (parse steps only)
    pub report: Option<ParseReport>,
}

impl StepOutcome {
    fn done(state: SyncState) -> Self {
        Self {
            state,
            continuation: None,
            report: None,
        }
    }
}

/// What a parse step found
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParseReport {
    /// Identities added to the feed
    pub new_entries: Vec<EntryIdentity>,
    /// Sources that failed, with the failure description
    pub failures: Vec<SourceFailure>,
}

/// A source skipped during a parse step
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceFailure {
    /// The failing source
    pub source: Source,
    /// Failure description
    pub reason: String,
}

/// Runs sync steps against the database, the registry and the object store
#[derive(Clone)]
pub struct SyncOrchestrator {
    db: Arc<Database>,
    registry: Arc<SourceRegistry>,
    archiver: Arc<PartitionedArchiver>,
    config: SyncConfig,
    event_tx: broadcast::Sender<Event>,
}

impl SyncOrchestrator {
    /// Create an orchestrator from its collaborators
    pub fn new(
        db: Arc<Database>,
        registry: Arc<SourceRegistry>,
        archiver: Arc<PartitionedArchiver>,
        config: SyncConfig,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            db,
            registry,
            archiver,
            config,
            event_tx,
        }
    }

    /// Run the step a sync task names
    pub async fn run_step(&self, task: &Task) -> Result<StepOutcome> {
        match task {
            Task::SyncSubscription { owner, id } => self.parse_step(owner, *id).await,
            Task::ArchiveSubscription { owner, id } => self.archive_step(owner, *id).await,
            other => Err(Error::Validation(format!("{} is not a sync step", other))),
        }
    }

    /// Delete a subscription together with every object stored for it.
    /// Returns false if it did not exist.
    pub async fn delete_subscription(&self, owner: &str, id: SubscriptionId) -> Result<bool> {
        if self.db.get_subscription(owner, id).await?.is_none() {
            return Ok(false);
        }

        let prefix = self.archiver.subscription_prefix(owner, id);
        let store = self.archiver.store();
        let objects = store.list(&prefix).await?;
        for path in &objects {
            store.delete(path).await?;
        }

        let deleted = self.db.delete_subscription(owner, id).await?;
        tracing::info!(
            subscription_id = %id,
            owner = %owner,
            objects = objects.len(),
            "deleted subscription"
        );
        Ok(deleted)
    }

    /// Delete every subscription of `owner` whose feed was not requested
    /// within the subscription retention window. Returns the deleted IDs.
    pub async fn reclaim_stale(
        &self,
        owner: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<SubscriptionId>> {
        let cutoff = window_start(now, self.config.subscription_retention);
        let stale = self.db.stale_subscriptions(owner, cutoff).await?;

        let mut reclaimed = Vec::with_capacity(stale.len());
        for id in stale {
            if self.delete_subscription(owner, id).await? {
                self.emit_event(Event::SubscriptionExpired {
                    id,
                    owner: owner.to_string(),
                });
                reclaimed.push(id);
            }
        }
        Ok(reclaimed)
    }

    /// Oldest publish time still inside the retention window
    pub fn retention_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        window_start(now, self.config.episode_retention)
    }

    /// Sync settings
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    async fn load(&self, owner: &str, id: SubscriptionId) -> Result<Subscription> {
        self.db
            .get_subscription(owner, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("subscription {} of '{}'", id, owner)))
    }

    fn emit_event(&self, event: Event) {
        // send() returns Err if there are no receivers, which is fine - we just drop the event
        self.event_tx.send(event).ok();
    }
}

fn window_start(now: DateTime<Utc>, window: std::time::Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(window)
        .ok()
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
