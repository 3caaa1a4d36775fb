//! Feed and entry model
//!
//! A [`Feed`] is the ordered, deduplicated entry collection of one subscription.
//! Entries are kept newest first; entries with equal publish times keep their
//! insertion order. Two entries are the same entry when their
//! [`EntryIdentity`] matches, whatever their titles or descriptions say.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use utoipa::ToSchema;

/// Stable identity of an entry: parser tag, canonical link and publish time
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct EntryIdentity {
    /// Parser that discovered the entry
    pub parser: String,
    /// Canonical link (enclosure URL or item link)
    pub link: String,
    /// Publish time reported upstream
    pub published: DateTime<Utc>,
}

impl EntryIdentity {
    /// Create a new identity
    pub fn new(parser: impl Into<String>, link: impl Into<String>, published: DateTime<Utc>) -> Self {
        Self {
            parser: parser.into(),
            link: link.into(),
            published,
        }
    }
}

/// One discovered item of content
///
/// The identity is fixed at construction. Archival fields change only through
/// [`Entry::mark_archived`] and [`Entry::mark_fallback`].
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct Entry {
    #[serde(flatten)]
    identity: EntryIdentity,
    title: String,
    description: String,
    archived: bool,
    media_url: String,
    media_path: Option<String>,
    size_bytes: u64,
    mime_type: String,
}

/// Persisted form of an entry, used to restore it from storage
#[derive(Clone, Debug)]
pub struct StoredEntry {
    /// Identity
    pub identity: EntryIdentity,
    /// Title
    pub title: String,
    /// Description
    pub description: String,
    /// Archival status
    pub archived: bool,
    /// Resolved media URL
    pub media_url: String,
    /// Object store path of the archived media
    pub media_path: Option<String>,
    /// Size in bytes
    pub size_bytes: u64,
    /// MIME type
    pub mime_type: String,
}

impl Entry {
    /// Create a not-yet-archived entry whose media URL is its canonical link
    pub fn new(
        identity: EntryIdentity,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let media_url = identity.link.clone();
        Self {
            identity,
            title: title.into(),
            description: description.into(),
            archived: false,
            media_url,
            media_path: None,
            size_bytes: 0,
            mime_type: String::new(),
        }
    }

    /// Rebuild an entry from its persisted form
    pub fn restore(stored: StoredEntry) -> Self {
        Self {
            identity: stored.identity,
            title: stored.title,
            description: stored.description,
            archived: stored.archived,
            media_url: stored.media_url,
            media_path: stored.media_path,
            size_bytes: stored.size_bytes,
            mime_type: stored.mime_type,
        }
    }

    /// The entry's identity
    pub fn identity(&self) -> &EntryIdentity {
        &self.identity
    }

    /// Canonical upstream link
    pub fn link(&self) -> &str {
        &self.identity.link
    }

    /// Publish time
    pub fn published(&self) -> DateTime<Utc> {
        self.identity.published
    }

    /// Title
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether the archival step has processed this entry
    pub fn is_archived(&self) -> bool {
        self.archived
    }

    /// URL the published feed points at
    pub fn media_url(&self) -> &str {
        &self.media_url
    }

    /// Object store path of the archived copy, if any
    pub fn media_path(&self) -> Option<&str> {
        self.media_path.as_deref()
    }

    /// Size of the media in bytes (0 when unknown)
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// MIME type of the media (empty when unknown)
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Point the entry at its archived copy. Returns false if it was already archived.
    pub fn mark_archived(
        &mut self,
        media_url: impl Into<String>,
        media_path: impl Into<String>,
        size_bytes: u64,
        mime_type: impl Into<String>,
    ) -> bool {
        if self.archived {
            return false;
        }
        self.archived = true;
        self.media_url = media_url.into();
        self.media_path = Some(media_path.into());
        self.size_bytes = size_bytes;
        self.mime_type = mime_type.into();
        true
    }

    /// Mark the entry archived while keeping its upstream link.
    /// Returns false if it was already archived.
    pub fn mark_fallback(&mut self) -> bool {
        if self.archived {
            return false;
        }
        self.archived = true;
        self.media_url = self.identity.link.clone();
        self.media_path = None;
        true
    }

    /// Persisted form of this entry
    pub fn to_stored(&self) -> StoredEntry {
        StoredEntry {
            identity: self.identity.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            archived: self.archived,
            media_url: self.media_url.clone(),
            media_path: self.media_path.clone(),
            size_bytes: self.size_bytes,
            mime_type: self.mime_type.clone(),
        }
    }
}

/// Entries of one subscription, newest first
#[derive(Clone, Debug, Default, PartialEq, Serialize, ToSchema)]
pub struct Feed {
    entries: Vec<Entry>,
}

impl Feed {
    /// Create an empty feed
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a feed from entries, dropping duplicate identities (first wins)
    pub fn from_entries(entries: impl IntoIterator<Item = Entry>) -> Self {
        let mut feed = Self::new();
        feed.merge(entries);
        feed
    }

    /// Entries, newest first
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the feed has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether an entry with this identity is present
    pub fn contains(&self, identity: &EntryIdentity) -> bool {
        self.entries.iter().any(|e| &e.identity == identity)
    }

    /// Look up an entry by identity
    pub fn get(&self, identity: &EntryIdentity) -> Option<&Entry> {
        self.entries.iter().find(|e| &e.identity == identity)
    }

    /// Look up an entry by identity for archival updates
    pub fn get_mut(&mut self, identity: &EntryIdentity) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| &e.identity == identity)
    }

    /// Insert an entry. Returns false (and leaves the feed untouched) when an
    /// entry with the same identity already exists.
    pub fn insert(&mut self, entry: Entry) -> bool {
        if self.contains(&entry.identity) {
            return false;
        }
        self.entries.push(entry);
        self.sort();
        true
    }

    /// Remove the entry with this identity
    pub fn remove(&mut self, identity: &EntryIdentity) -> Option<Entry> {
        let pos = self.entries.iter().position(|e| &e.identity == identity)?;
        let removed = self.entries.remove(pos);
        self.sort();
        Some(removed)
    }

    /// Insert every candidate whose identity is not yet present.
    ///
    /// Returns the identities that were added. Existing entries are never
    /// modified, so merging the same candidates twice is a no-op.
    pub fn merge(&mut self, candidates: impl IntoIterator<Item = Entry>) -> Vec<EntryIdentity> {
        let mut seen: HashSet<EntryIdentity> =
            self.entries.iter().map(|e| e.identity.clone()).collect();
        let mut added = Vec::new();

        for candidate in candidates {
            if seen.insert(candidate.identity.clone()) {
                added.push(candidate.identity.clone());
                self.entries.push(candidate);
            }
        }

        if !added.is_empty() {
            self.sort();
        }
        added
    }

    /// The oldest entry not yet archived whose publish time is at or after `cutoff`
    pub fn oldest_unarchived(&self, cutoff: DateTime<Utc>) -> Option<&Entry> {
        self.entries
            .iter()
            .rev()
            .find(|e| !e.archived && e.identity.published >= cutoff)
    }

    /// Identities of entries published before `cutoff`
    pub fn expired(&self, cutoff: DateTime<Utc>) -> Vec<EntryIdentity> {
        self.entries
            .iter()
            .filter(|e| e.identity.published < cutoff)
            .map(|e| e.identity.clone())
            .collect()
    }

    fn sort(&mut self) {
        // Vec::sort_by is stable: equal timestamps keep insertion order
        self.entries
            .sort_by(|a, b| b.identity.published.cmp(&a.identity.published));
    }
}
