//! Source parsers and the source-type registry
//!
//! A [`SourceParser`] turns a [`Source`] into a [`SourceListing`]: optional
//! listing metadata plus the candidate entries the upstream currently
//! advertises. Each parser-type name is bound to a parser and a
//! [`ContentFetcher`] in the [`SourceRegistry`].
//!
//! Failures are reported per source:
//! - [`Error::UpstreamUnavailable`] when the source cannot be fetched or an
//!   expected marker is missing
//! - [`Error::ParseFailure`] when the body is not a feed
//!
//! A feed that parses but lists nothing is a successful, empty listing.

use crate::config::{FetchConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::feed::{Entry, EntryIdentity};
use crate::retry::fetch_with_retry;
use crate::types::Source;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

mod channel;
mod registry;
mod syndication;

pub use channel::ChannelParser;
pub use registry::{SourceRegistry, SourceType};
pub use syndication::{SyndicationParser, parse_feed};

/// Parser name for plain RSS/Atom feeds
pub const PARSER_RSS: &str = "rss";
/// Parser name for platform channels archived as audio
pub const PARSER_YOUTUBE_AUDIO: &str = "youtube-audio";
/// Parser name for platform channels archived as video
pub const PARSER_YOUTUBE_VIDEO: &str = "youtube-video";

/// One candidate entry as listed upstream
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawEntry {
    /// Title
    pub title: String,
    /// Description or summary
    pub description: String,
    /// Canonical link (enclosure URL, else item link)
    pub link: String,
    /// Publish time
    pub published: DateTime<Utc>,
}

impl RawEntry {
    /// Turn the candidate into a not-yet-archived entry tagged with `parser`
    pub fn into_entry(self, parser: &str) -> Entry {
        Entry::new(
            EntryIdentity::new(parser, self.link, self.published),
            self.title,
            self.description,
        )
    }
}

/// What a parser found at a source
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceListing {
    /// Listing title
    pub title: Option<String>,
    /// Listing description
    pub description: Option<String>,
    /// Listing image URL
    pub image_url: Option<String>,
    /// Candidate entries in upstream order
    pub entries: Vec<RawEntry>,
}

/// Turns a source URL into candidate entries
#[async_trait]
pub trait SourceParser: Send + Sync {
    /// Fetch and normalize the listing at `source`
    async fn list_entries(&self, source: &Source) -> Result<SourceListing>;
}

/// HTTP settings shared by the parsers
#[derive(Clone, Debug)]
pub struct ParserContext {
    /// HTTP client
    pub client: reqwest::Client,
    /// Retry policy for listing fetches
    pub retry: RetryConfig,
    /// Total timeout per listing request
    pub timeout: Duration,
}

impl ParserContext {
    /// Build a context from fetch and retry settings
    pub fn new(client: reqwest::Client, fetch: &FetchConfig, retry: &RetryConfig) -> Self {
        Self {
            client,
            retry: retry.clone(),
            timeout: fetch.request_timeout,
        }
    }

    /// GET `url` as text, retrying transient failures. Any failure is
    /// reported as `UpstreamUnavailable`.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        fetch_with_retry(&self.retry, || async {
            let response = self
                .client
                .get(url)
                .timeout(self.timeout)
                .send()
                .await?
                .error_for_status()?;
            Ok::<_, Error>(response.text().await?)
        })
        .await
        .map_err(|e| Error::upstream(url, e))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
