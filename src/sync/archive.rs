//! Archive step: ArchivePending -> ArchiveInProgress -> ArchivePending | Idle

use super::{StepOutcome, SyncOrchestrator};
use crate::error::{Error, Result};
use crate::feed::{Entry, EntryIdentity};
use crate::storage::ArchivedObject;
use crate::tasks::Task;
use crate::types::{Event, Subscription, SubscriptionId, SyncState};
use chrono::Utc;
use tracing::{debug, info, warn};

/// How the selected entry ended up
enum Archival {
    Stored(ArchivedObject),
    Fallback(String),
}

impl SyncOrchestrator {
    /// Archive at most one entry of a subscription.
    ///
    /// Entries outside the retention window are dropped first. The oldest
    /// unarchived entry is then resolved and stored; an entry whose media
    /// cannot be downloaded keeps its upstream link. When nothing is left the
    /// subscription goes idle and no continuation is returned.
    pub async fn archive_step(&self, owner: &str, id: SubscriptionId) -> Result<StepOutcome> {
        let mut subscription = self.load(owner, id).await?;
        let cutoff = self.retention_cutoff(Utc::now());

        let expired = self.expire_entries(&subscription, cutoff).await?;
        if !expired.is_empty() {
            // Re-read after the deletes; a parse step may have merged entries meanwhile
            let Some(fresh) = self.db.get_subscription(owner, id).await? else {
                info!(subscription_id = %id, "subscription deleted during expiry");
                return Ok(StepOutcome::done(SyncState::Idle));
            };
            subscription = fresh;
            for identity in &expired {
                subscription.feed.remove(identity);
            }
            self.db.save_subscription(&subscription).await?;
        }

        let Some(entry) = subscription.feed.oldest_unarchived(cutoff).cloned() else {
            self.db.set_sync_state(id, SyncState::Idle).await?;
            info!(subscription_id = %id, expired = expired.len(), "nothing left to archive");
            self.emit_event(Event::SyncIdle { id });
            return Ok(StepOutcome::done(SyncState::Idle));
        };

        self.db
            .set_sync_state(id, SyncState::ArchiveInProgress)
            .await?;

        let archival = self.fetch_and_store(owner, id, &entry).await?;

        // Re-read right before writing; the entry may be gone or archived already
        let Some(mut subscription) = self.db.get_subscription(owner, id).await? else {
            info!(subscription_id = %id, "subscription deleted during archival");
            if let Archival::Stored(object) = &archival {
                self.archiver.store().delete(&object.path).await?;
            }
            return Ok(StepOutcome::done(SyncState::Idle));
        };

        self.apply(&mut subscription, entry.identity(), archival)
            .await?;
        subscription.sync_state = SyncState::ArchivePending;
        self.db.save_subscription(&subscription).await?;

        Ok(StepOutcome {
            state: SyncState::ArchivePending,
            continuation: Some(Task::ArchiveSubscription {
                owner: owner.to_string(),
                id,
            }),
            report: None,
        })
    }

    /// Delete the stored media of entries published before `cutoff`.
    /// Returns their identities; the caller drops them from the feed.
    async fn expire_entries(
        &self,
        subscription: &Subscription,
        cutoff: chrono::DateTime<Utc>,
    ) -> Result<Vec<EntryIdentity>> {
        let expired = subscription.feed.expired(cutoff);
        for identity in &expired {
            let Some(entry) = subscription.feed.get(identity) else {
                continue;
            };
            if let Some(path) = entry.media_path() {
                self.archiver.store().delete(path).await?;
            }
            debug!(subscription_id = %subscription.id, link = %identity.link, "entry expired");
            self.emit_event(Event::EntryExpired {
                id: subscription.id,
                link: identity.link.clone(),
            });
        }
        Ok(expired)
    }

    /// Resolve and upload the media of `entry`.
    ///
    /// Download failures become [`Archival::Fallback`]; storage failures propagate.
    async fn fetch_and_store(
        &self,
        owner: &str,
        id: SubscriptionId,
        entry: &Entry,
    ) -> Result<Archival> {
        let identity = entry.identity();
        let fetcher = match self.registry.fetcher(&identity.parser) {
            Ok(fetcher) => fetcher,
            Err(e) => return Ok(Archival::Fallback(e.to_string())),
        };

        let source = match fetcher.resolve(&identity.link).await {
            Ok(source) => source,
            Err(e @ Error::DownloadUnavailable { .. }) => {
                return Ok(Archival::Fallback(e.to_string()));
            }
            Err(e) => return Err(e),
        };

        let destination = self.archiver.destination_for(owner, id, &identity.link);
        match self.archiver.archive(source, &destination).await {
            Ok(object) => Ok(Archival::Stored(object)),
            Err(e @ Error::DownloadUnavailable { .. }) => Ok(Archival::Fallback(e.to_string())),
            Err(e) => Err(e),
        }
    }

    /// Record the archival outcome on the freshly loaded subscription
    async fn apply(
        &self,
        subscription: &mut Subscription,
        identity: &EntryIdentity,
        archival: Archival,
    ) -> Result<()> {
        let id = subscription.id;
        let Some(entry) = subscription.feed.get_mut(identity) else {
            debug!(subscription_id = %id, link = %identity.link, "entry removed during archival");
            if let Archival::Stored(object) = &archival {
                self.archiver.store().delete(&object.path).await?;
            }
            return Ok(());
        };

        match archival {
            Archival::Stored(object) => {
                if entry.mark_archived(
                    &object.url,
                    &object.path,
                    object.size_bytes,
                    &object.content_type,
                ) {
                    info!(
                        subscription_id = %id,
                        link = %identity.link,
                        size_bytes = object.size_bytes,
                        "entry archived"
                    );
                    self.emit_event(Event::EntryArchived {
                        id,
                        link: identity.link.clone(),
                        url: object.url,
                        size_bytes: object.size_bytes,
                    });
                } else {
                    debug!(subscription_id = %id, link = %identity.link, "entry already archived");
                    if entry.media_path() != Some(object.path.as_str()) {
                        self.archiver.store().delete(&object.path).await?;
                    }
                }
            }
            Archival::Fallback(reason) => {
                if entry.mark_fallback() {
                    warn!(
                        subscription_id = %id,
                        link = %identity.link,
                        reason = %reason,
                        "media unavailable, keeping upstream link"
                    );
                    self.emit_event(Event::EntryFallback {
                        id,
                        link: identity.link.clone(),
                        reason,
                    });
                }
            }
        }
        Ok(())
    }
}
