//! Parse step: ParsePending -> ArchivePending

use super::{ParseReport, SourceFailure, StepOutcome, SyncOrchestrator};
use crate::error::Result;
use crate::feed::Entry;
use crate::parser::SourceListing;
use crate::tasks::Task;
use crate::types::{Event, SubscriptionId, SyncState};
use chrono::Utc;
use tracing::{debug, info, warn};

/// Listing metadata used to fill empty subscription fields
#[derive(Default)]
struct ListingMeta {
    title: Option<String>,
    description: Option<String>,
    image_url: Option<String>,
}

impl ListingMeta {
    fn absorb(&mut self, listing: &SourceListing) {
        if self.title.is_none() {
            self.title = listing.title.clone();
        }
        if self.description.is_none() {
            self.description = listing.description.clone();
        }
        if self.image_url.is_none() {
            self.image_url = listing.image_url.clone();
        }
    }
}

impl SyncOrchestrator {
    /// Parse every source of a subscription and merge the results.
    ///
    /// A failing source is logged, reported and skipped; the remaining
    /// sources still contribute. Candidates published before the retention
    /// cutoff are not merged.
    pub async fn parse_step(&self, owner: &str, id: SubscriptionId) -> Result<StepOutcome> {
        let subscription = self.load(owner, id).await?;
        let now = Utc::now();
        let cutoff = self.retention_cutoff(now);

        let mut candidates: Vec<Entry> = Vec::new();
        let mut failures = Vec::new();
        let mut meta = ListingMeta::default();

        for source in subscription.sources() {
            let listing = match self.registry.parser(&source.parser) {
                Ok(parser) => parser.list_entries(source).await,
                Err(e) => Err(e),
            };

            match listing {
                Ok(listing) => {
                    debug!(
                        subscription_id = %id,
                        url = %source.url,
                        entries = listing.entries.len(),
                        "source parsed"
                    );
                    meta.absorb(&listing);
                    candidates.extend(
                        listing
                            .entries
                            .into_iter()
                            .filter(|raw| raw.published >= cutoff)
                            .map(|raw| raw.into_entry(&source.parser)),
                    );
                }
                Err(e) => {
                    warn!(
                        subscription_id = %id,
                        url = %source.url,
                        parser = %source.parser,
                        error = %e,
                        "source failed, skipping"
                    );
                    self.emit_event(Event::SourceFailed {
                        id,
                        url: source.url.clone(),
                        reason: e.to_string(),
                    });
                    failures.push(SourceFailure {
                        source: source.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        // Re-read right before writing so concurrent edits survive
        let Some(mut subscription) = self.db.get_subscription(owner, id).await? else {
            info!(subscription_id = %id, "subscription deleted during parse");
            return Ok(StepOutcome::done(SyncState::Idle));
        };

        let new_entries = subscription.feed.merge(candidates);
        if subscription.title.is_empty()
            && let Some(title) = meta.title
        {
            subscription.title = title;
        }
        if subscription.description.is_empty()
            && let Some(description) = meta.description
        {
            subscription.description = description;
        }
        if subscription.image_url.is_none() {
            subscription.image_url = meta.image_url;
        }
        subscription.last_synced_at = Some(now);
        subscription.sync_state = SyncState::ArchivePending;
        self.db.save_subscription(&subscription).await?;

        info!(
            subscription_id = %id,
            new_entries = new_entries.len(),
            failed_sources = failures.len(),
            "subscription parsed"
        );
        self.emit_event(Event::SubscriptionParsed {
            id,
            new_entries: new_entries.len(),
            failed_sources: failures.len(),
        });

        Ok(StepOutcome {
            state: SyncState::ArchivePending,
            continuation: Some(Task::ArchiveSubscription {
                owner: owner.to_string(),
                id,
            }),
            report: Some(ParseReport {
                new_entries,
                failures,
            }),
        })
    }
}
