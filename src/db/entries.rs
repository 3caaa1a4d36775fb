//! Source and feed-entry rows of a subscription.
//!
//! Writers take a `&mut SqliteConnection` so they run inside the caller's
//! transaction.

use crate::error::DatabaseError;
use crate::feed::{Entry, Feed, StoredEntry};
use crate::types::Source;
use crate::{Error, Result};
use sqlx::SqliteConnection;
use std::collections::HashSet;

use super::{Database, FeedEntryRow, SourceRow, published_key};

impl Database {
    /// Sources of a subscription, sorted by (url, parser)
    pub async fn get_sources(&self, subscription_id: i64) -> Result<Vec<Source>> {
        let rows = sqlx::query_as::<_, SourceRow>(
            r#"
            SELECT url, parser
            FROM subscription_sources
            WHERE subscription_id = ?
            ORDER BY url ASC, parser ASC
            "#,
        )
        .bind(subscription_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get sources: {}",
                e
            )))
        })?;

        Ok(rows
            .into_iter()
            .map(|row| Source::new(row.url, row.parser))
            .collect())
    }

    /// Feed of a subscription, newest first with ties in insertion order
    pub async fn get_feed(&self, subscription_id: i64) -> Result<Feed> {
        let rows = sqlx::query_as::<_, FeedEntryRow>(
            r#"
            SELECT id, parser, link, published, title, description, archived,
                   media_url, media_path, size_bytes, mime_type
            FROM feed_entries
            WHERE subscription_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(subscription_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get feed entries: {}",
                e
            )))
        })?;

        let entries = rows
            .into_iter()
            .map(|row| StoredEntry::try_from(row).map(Entry::restore))
            .collect::<Result<Vec<_>>>()?;

        // Rows come back in insertion order; the feed's stable sort keeps it for ties
        Ok(Feed::from_entries(entries))
    }

    /// Replace the source rows of a subscription
    pub(crate) async fn write_sources(
        conn: &mut SqliteConnection,
        subscription_id: i64,
        sources: &[Source],
    ) -> Result<()> {
        sqlx::query("DELETE FROM subscription_sources WHERE subscription_id = ?")
            .bind(subscription_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to clear sources: {}",
                    e
                )))
            })?;

        for source in sources {
            sqlx::query(
                "INSERT INTO subscription_sources (subscription_id, url, parser) VALUES (?, ?, ?)",
            )
            .bind(subscription_id)
            .bind(&source.url)
            .bind(&source.parser)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to insert source: {}",
                    e
                )))
            })?;
        }

        Ok(())
    }

    /// Bring the entry rows of a subscription in line with `feed`.
    ///
    /// Rows whose identity left the feed are deleted; existing rows are
    /// updated in place so their insertion order survives.
    pub(crate) async fn write_feed(
        conn: &mut SqliteConnection,
        subscription_id: i64,
        feed: &Feed,
    ) -> Result<()> {
        let existing: Vec<(i64, String, String, String)> = sqlx::query_as(
            "SELECT id, parser, link, published FROM feed_entries WHERE subscription_id = ?",
        )
        .bind(subscription_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to read existing entries: {}",
                e
            )))
        })?;

        let keep: HashSet<(&str, &str, String)> = feed
            .entries()
            .iter()
            .map(|e| {
                let identity = e.identity();
                (
                    identity.parser.as_str(),
                    identity.link.as_str(),
                    published_key(&identity.published),
                )
            })
            .collect();

        for (row_id, parser, link, published) in &existing {
            if !keep.contains(&(parser.as_str(), link.as_str(), published.clone())) {
                sqlx::query("DELETE FROM feed_entries WHERE id = ?")
                    .bind(row_id)
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| {
                        Error::Database(DatabaseError::QueryFailed(format!(
                            "Failed to delete entry: {}",
                            e
                        )))
                    })?;
            }
        }

        // Feed order: among equal publish times, later insertions get higher row ids
        for entry in feed.entries() {
            let identity = entry.identity();
            sqlx::query(
                r#"
                INSERT INTO feed_entries (subscription_id, parser, link, published, title,
                                          description, archived, media_url, media_path,
                                          size_bytes, mime_type)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT (subscription_id, parser, link, published) DO UPDATE SET
                    title = excluded.title,
                    description = excluded.description,
                    archived = excluded.archived,
                    media_url = excluded.media_url,
                    media_path = excluded.media_path,
                    size_bytes = excluded.size_bytes,
                    mime_type = excluded.mime_type
                "#,
            )
            .bind(subscription_id)
            .bind(&identity.parser)
            .bind(&identity.link)
            .bind(published_key(&identity.published))
            .bind(entry.title())
            .bind(entry.description())
            .bind(entry.is_archived() as i32)
            .bind(entry.media_url())
            .bind(entry.media_path())
            .bind(entry.size_bytes() as i64)
            .bind(entry.mime_type())
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to upsert entry: {}",
                    e
                )))
            })?;
        }

        Ok(())
    }
}
