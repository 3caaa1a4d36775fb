//! Subscription CRUD and retention queries.

use crate::error::DatabaseError;
use crate::types::{Subscription, SubscriptionId, SyncState};
use crate::{Error, Result};
use chrono::{DateTime, Utc};

use super::{Database, SubscriptionRow, from_unix};

impl Database {
    /// Insert a new subscription with its sources and entries
    ///
    /// The `id` field of `subscription` is ignored; the generated ID is returned.
    pub async fn insert_subscription(&self, subscription: &Subscription) -> Result<SubscriptionId> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to begin transaction: {}",
                e
            )))
        })?;

        let result = sqlx::query(
            r#"
            INSERT INTO subscriptions (owner, title, description, image_url, last_synced_at,
                                       last_accessed_at, created_at, sync_state)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&subscription.owner)
        .bind(&subscription.title)
        .bind(&subscription.description)
        .bind(&subscription.image_url)
        .bind(subscription.last_synced_at.map(|t| t.timestamp()))
        .bind(subscription.last_accessed_at.timestamp())
        .bind(subscription.created_at.timestamp())
        .bind(subscription.sync_state.to_i32())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert subscription: {}",
                e
            )))
        })?;

        let id = result.last_insert_rowid();
        Self::write_sources(&mut tx, id, subscription.sources()).await?;
        Self::write_feed(&mut tx, id, &subscription.feed).await?;

        tx.commit().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to commit subscription insert: {}",
                e
            )))
        })?;

        Ok(SubscriptionId(id))
    }

    /// Persist every field, source and entry of an existing subscription
    ///
    /// Entries missing from the subscription's feed are deleted.
    pub async fn save_subscription(&self, subscription: &Subscription) -> Result<()> {
        let id = subscription.id.get();
        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to begin transaction: {}",
                e
            )))
        })?;

        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET title = ?, description = ?, image_url = ?, last_synced_at = ?,
                last_accessed_at = ?, sync_state = ?
            WHERE id = ? AND owner = ?
            "#,
        )
        .bind(&subscription.title)
        .bind(&subscription.description)
        .bind(&subscription.image_url)
        .bind(subscription.last_synced_at.map(|t| t.timestamp()))
        .bind(subscription.last_accessed_at.timestamp())
        .bind(subscription.sync_state.to_i32())
        .bind(id)
        .bind(&subscription.owner)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to update subscription: {}",
                e
            )))
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::Database(DatabaseError::NotFound(format!(
                "Subscription {} of '{}' not found",
                id, subscription.owner
            ))));
        }

        Self::write_sources(&mut tx, id, subscription.sources()).await?;
        Self::write_feed(&mut tx, id, &subscription.feed).await?;

        tx.commit().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to commit subscription update: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Load a subscription with its sources and feed
    pub async fn get_subscription(
        &self,
        owner: &str,
        id: SubscriptionId,
    ) -> Result<Option<Subscription>> {
        let row = sqlx::query_as::<_, SubscriptionRow>(
            r#"
            SELECT id, owner, title, description, image_url, last_synced_at,
                   last_accessed_at, created_at, sync_state
            FROM subscriptions
            WHERE id = ? AND owner = ?
            "#,
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get subscription: {}",
                e
            )))
        })?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    /// All subscriptions of an owner, oldest first
    pub async fn list_subscriptions(&self, owner: &str) -> Result<Vec<Subscription>> {
        let rows = sqlx::query_as::<_, SubscriptionRow>(
            r#"
            SELECT id, owner, title, description, image_url, last_synced_at,
                   last_accessed_at, created_at, sync_state
            FROM subscriptions
            WHERE owner = ?
            ORDER BY id ASC
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list subscriptions: {}",
                e
            )))
        })?;

        let mut subscriptions = Vec::with_capacity(rows.len());
        for row in rows {
            subscriptions.push(self.hydrate(row).await?);
        }
        Ok(subscriptions)
    }

    /// IDs of an owner's subscriptions, oldest first
    pub async fn list_subscription_ids(&self, owner: &str) -> Result<Vec<SubscriptionId>> {
        let ids: Vec<SubscriptionId> =
            sqlx::query_scalar("SELECT id FROM subscriptions WHERE owner = ? ORDER BY id ASC")
                .bind(owner)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to list subscription ids: {}",
                        e
                    )))
                })?;

        Ok(ids)
    }

    /// Every owner with at least one subscription, sorted
    pub async fn list_owners(&self) -> Result<Vec<String>> {
        sqlx::query_scalar("SELECT DISTINCT owner FROM subscriptions ORDER BY owner ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to list owners: {}",
                    e
                )))
            })
    }

    /// Delete a subscription; its sources and entries cascade.
    /// Returns false if it did not exist.
    pub async fn delete_subscription(&self, owner: &str, id: SubscriptionId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE id = ? AND owner = ?")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete subscription: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected() > 0)
    }

    /// Update only the sync state of a subscription
    pub async fn set_sync_state(&self, id: SubscriptionId, state: SyncState) -> Result<()> {
        sqlx::query("UPDATE subscriptions SET sync_state = ? WHERE id = ?")
            .bind(state.to_i32())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to update sync state: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Record a request for the published feed. Returns false if the
    /// subscription does not exist.
    pub async fn touch_accessed(
        &self,
        owner: &str,
        id: SubscriptionId,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let result =
            sqlx::query("UPDATE subscriptions SET last_accessed_at = ? WHERE id = ? AND owner = ?")
                .bind(at.timestamp())
                .bind(id)
                .bind(owner)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to update access time: {}",
                        e
                    )))
                })?;

        Ok(result.rows_affected() > 0)
    }

    /// Subscriptions of an owner whose feed was last requested before `cutoff`
    pub async fn stale_subscriptions(
        &self,
        owner: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<SubscriptionId>> {
        let ids: Vec<SubscriptionId> = sqlx::query_scalar(
            r#"
            SELECT id FROM subscriptions
            WHERE owner = ? AND last_accessed_at < ?
            ORDER BY id ASC
            "#,
        )
        .bind(owner)
        .bind(cutoff.timestamp())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to query stale subscriptions: {}",
                e
            )))
        })?;

        Ok(ids)
    }

    async fn hydrate(&self, row: SubscriptionRow) -> Result<Subscription> {
        let sources = self.get_sources(row.id).await?;
        let feed = self.get_feed(row.id).await?;

        let mut subscription = Subscription::new(row.owner, row.title);
        subscription.id = SubscriptionId(row.id);
        subscription.description = row.description;
        subscription.image_url = row.image_url;
        subscription.feed = feed;
        subscription.last_synced_at = row.last_synced_at.map(from_unix);
        subscription.last_accessed_at = from_unix(row.last_accessed_at);
        subscription.created_at = from_unix(row.created_at);
        subscription.sync_state = SyncState::from_i32(row.sync_state);
        for source in sources {
            subscription.add_source(source);
        }
        Ok(subscription)
    }
}
