//! Subscription import and export
//!
//! The portable form of a subscription is its user-editable part only: title,
//! description, image and sources. Feeds, archival state and timestamps are
//! rebuilt by the next sync after an import.

use crate::db::Database;
use crate::error::{Error, Result};
use crate::parser::SourceRegistry;
use crate::types::{Source, Subscription, SubscriptionId};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

/// Portable form of one subscription
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionRecord {
    /// Display title
    pub title: String,
    /// Display description
    #[serde(default)]
    pub description: String,
    /// Cover image URL
    #[serde(default)]
    pub image: Option<String>,
    /// Sources feeding the subscription
    pub sources: Vec<Source>,
}

impl SubscriptionRecord {
    /// Portable form of a subscription
    pub fn from_subscription(subscription: &Subscription) -> Self {
        Self {
            title: subscription.title.clone(),
            description: subscription.description.clone(),
            image: subscription.image_url.clone(),
            sources: subscription.sources().to_vec(),
        }
    }

    /// Check parser types and the source limit
    pub fn validate(&self, registry: &SourceRegistry, max_sources: usize) -> Result<()> {
        if self.sources.len() > max_sources {
            return Err(Error::Validation(format!(
                "'{}' has {} sources, at most {} are allowed",
                self.title,
                self.sources.len(),
                max_sources
            )));
        }
        if let Some(unknown) = self.sources.iter().find(|s| !registry.contains(&s.parser)) {
            return Err(Error::Validation(format!(
                "'{}' uses unknown parser type '{}'",
                self.title, unknown.parser
            )));
        }
        Ok(())
    }

    /// A new subscription of `owner` built from this record
    pub fn into_subscription(self, owner: &str) -> Subscription {
        let mut subscription = Subscription::new(owner, self.title);
        subscription.description = self.description;
        subscription.image_url = self.image;
        for source in self.sources {
            subscription.add_source(source);
        }
        subscription
    }
}

/// Every subscription of `owner` in portable form
pub async fn export_subscriptions(db: &Database, owner: &str) -> Result<Vec<SubscriptionRecord>> {
    let subscriptions = db.list_subscriptions(owner).await?;
    Ok(subscriptions
        .iter()
        .map(SubscriptionRecord::from_subscription)
        .collect())
}

/// Create a subscription of `owner` per record.
///
/// All records are validated before anything is written, so an invalid
/// record rejects the whole import.
pub async fn import_subscriptions(
    db: &Database,
    registry: &SourceRegistry,
    max_sources: usize,
    owner: &str,
    records: Vec<SubscriptionRecord>,
) -> Result<Vec<SubscriptionId>> {
    for record in &records {
        record.validate(registry, max_sources)?;
    }

    let mut ids = Vec::with_capacity(records.len());
    for record in records {
        let subscription = record.into_subscription(owner);
        ids.push(db.insert_subscription(&subscription).await?);
    }

    info!(owner = %owner, count = ids.len(), "imported subscriptions");
    Ok(ids)
}
