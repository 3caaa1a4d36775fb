//! Database layer for podcast-archiver
//!
//! Handles SQLite persistence for subscriptions, their sources and their feed
//! entries. Feed state lives in explicit tables so every entry can be queried
//! and updated on its own.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`subscriptions`] - Subscription CRUD and retention queries
//! - [`entries`] - Source and feed-entry rows of a subscription

use crate::error::DatabaseError;
use crate::feed::{EntryIdentity, StoredEntry};
use crate::{Error, Result};
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use sqlx::{FromRow, sqlite::SqlitePool};

mod entries;
mod migrations;
mod subscriptions;

/// Subscription record from database
#[derive(Debug, Clone, FromRow)]
pub struct SubscriptionRow {
    /// Unique database ID
    pub id: i64,
    /// Owning user identity
    pub owner: String,
    /// Title
    pub title: String,
    /// Description
    pub description: String,
    /// Cover image URL
    pub image_url: Option<String>,
    /// Unix timestamp of the last parse pass
    pub last_synced_at: Option<i64>,
    /// Unix timestamp of the last feed request
    pub last_accessed_at: i64,
    /// Unix timestamp when the subscription was created
    pub created_at: i64,
    /// Sync state code (see [`crate::types::SyncState::from_i32`])
    pub sync_state: i32,
}

/// Source record from database
#[derive(Debug, Clone, FromRow)]
pub struct SourceRow {
    /// Upstream URL
    pub url: String,
    /// Parser name
    pub parser: String,
}

/// Feed entry record from database
#[derive(Debug, Clone, FromRow)]
pub struct FeedEntryRow {
    /// Unique database ID
    pub id: i64,
    /// Parser that discovered the entry
    pub parser: String,
    /// Canonical link
    pub link: String,
    /// Publish time, RFC 3339
    pub published: String,
    /// Title
    pub title: String,
    /// Description
    pub description: String,
    /// Whether the entry is archived (0 = no, 1 = yes)
    pub archived: i32,
    /// Resolved media URL
    pub media_url: String,
    /// Object store path of the archived media
    pub media_path: Option<String>,
    /// Size in bytes
    pub size_bytes: i64,
    /// MIME type
    pub mime_type: String,
}

impl TryFrom<FeedEntryRow> for StoredEntry {
    type Error = Error;

    fn try_from(row: FeedEntryRow) -> Result<Self> {
        let published = DateTime::parse_from_rfc3339(&row.published)
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Invalid publish time '{}' on entry {}: {}",
                    row.published, row.id, e
                )))
            })?
            .with_timezone(&Utc);

        Ok(StoredEntry {
            identity: EntryIdentity::new(row.parser, row.link, published),
            title: row.title,
            description: row.description,
            archived: row.archived != 0,
            media_url: row.media_url,
            media_path: row.media_path,
            size_bytes: row.size_bytes.max(0) as u64,
            mime_type: row.mime_type,
        })
    }
}

/// Canonical text form of a publish time; part of the entry uniqueness key
pub(crate) fn published_key(published: &DateTime<Utc>) -> String {
    published.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub(crate) fn from_unix(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0).single().unwrap_or_else(Utc::now)
}

/// Database handle for podcast-archiver
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
