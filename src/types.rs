//! Core types for podcast-archiver

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::feed::Feed;

/// Unique identifier for a subscription
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct SubscriptionId(pub i64);

impl SubscriptionId {
    /// Create a new SubscriptionId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for SubscriptionId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<SubscriptionId> for i64 {
    fn from(id: SubscriptionId) -> Self {
        id.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SubscriptionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

// Implement sqlx Type, Encode, and Decode for database operations
impl sqlx::Type<sqlx::Sqlite> for SubscriptionId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for SubscriptionId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for SubscriptionId {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// Where a subscription pulls entries from: a (url, parser) pair
///
/// Equality and ordering are by `(url, parser)`.
#[derive(
    Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
pub struct Source {
    /// Upstream URL (feed URL or channel page)
    pub url: String,
    /// Registered parser name ("rss", "youtube-audio", "youtube-video")
    pub parser: String,
}

impl Source {
    /// Create a new source
    pub fn new(url: impl Into<String>, parser: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            parser: parser.into(),
        }
    }
}

/// Position of a subscription in its sync state machine
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Sources must be re-parsed before archiving continues
    ParsePending,
    /// Parsed; the next archive step will pick an entry
    ArchivePending,
    /// An entry is being resolved and uploaded
    ArchiveInProgress,
    /// No work left in this cycle
    #[default]
    Idle,
}

impl SyncState {
    /// Convert integer state code to SyncState
    pub fn from_i32(state: i32) -> Self {
        match state {
            0 => SyncState::ParsePending,
            1 => SyncState::ArchivePending,
            2 => SyncState::ArchiveInProgress,
            _ => SyncState::Idle,
        }
    }

    /// Convert SyncState to integer state code
    pub fn to_i32(&self) -> i32 {
        match self {
            SyncState::ParsePending => 0,
            SyncState::ArchivePending => 1,
            SyncState::ArchiveInProgress => 2,
            SyncState::Idle => 3,
        }
    }
}

/// A user's registration of one or more sources and the feed built from them
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct Subscription {
    /// Subscription ID
    pub id: SubscriptionId,
    /// Owning user identity
    pub owner: String,
    /// Human-readable title
    pub title: String,
    /// Human-readable description
    pub description: String,
    /// Cover image URL
    pub image_url: Option<String>,
    /// Sources, deduplicated and sorted
    sources: Vec<Source>,
    /// Entries, newest first
    pub feed: Feed,
    /// Last successful parse pass
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Last time the published feed was requested
    pub last_accessed_at: DateTime<Utc>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Current sync state
    pub sync_state: SyncState,
}

impl Subscription {
    /// Create a subscription that has not been persisted yet (id 0)
    pub fn new(owner: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: SubscriptionId(0),
            owner: owner.into(),
            title: title.into(),
            description: String::new(),
            image_url: None,
            sources: Vec::new(),
            feed: Feed::new(),
            last_synced_at: None,
            last_accessed_at: now,
            created_at: now,
            sync_state: SyncState::ParsePending,
        }
    }

    /// The subscription's sources
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Add a source; returns false if an equal source is already registered
    pub fn add_source(&mut self, source: Source) -> bool {
        match self.sources.binary_search(&source) {
            Ok(_) => false,
            Err(pos) => {
                self.sources.insert(pos, source);
                true
            }
        }
    }

    /// Remove a source; returns false if it was not registered
    pub fn remove_source(&mut self, source: &Source) -> bool {
        match self.sources.binary_search(source) {
            Ok(pos) => {
                self.sources.remove(pos);
                true
            }
            Err(_) => false,
        }
    }
}

/// Event emitted by the sync pipeline
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A parse pass completed
    SubscriptionParsed {
        /// Subscription ID
        id: SubscriptionId,
        /// Number of entries added by the merge
        new_entries: usize,
        /// Number of sources that failed
        failed_sources: usize,
    },

    /// One source of a subscription failed to parse and was skipped
    SourceFailed {
        /// Subscription ID
        id: SubscriptionId,
        /// Source URL
        url: String,
        /// Failure description
        reason: String,
    },

    /// An entry's media was stored
    EntryArchived {
        /// Subscription ID
        id: SubscriptionId,
        /// Canonical link of the entry
        link: String,
        /// Public URL of the stored media
        url: String,
        /// Stored size in bytes
        size_bytes: u64,
    },

    /// An entry could not be downloaded and keeps its upstream link
    EntryFallback {
        /// Subscription ID
        id: SubscriptionId,
        /// Canonical link of the entry
        link: String,
        /// Failure description
        reason: String,
    },

    /// An entry fell out of the retention window and was removed
    EntryExpired {
        /// Subscription ID
        id: SubscriptionId,
        /// Canonical link of the entry
        link: String,
    },

    /// No archival work remains for this cycle
    SyncIdle {
        /// Subscription ID
        id: SubscriptionId,
    },

    /// A subscription was deleted by the retention policy
    SubscriptionExpired {
        /// Subscription ID
        id: SubscriptionId,
        /// Owning user
        owner: String,
    },
}
