//! Platform channel parsing
//!
//! A channel page does not link its syndication feed directly. The stable
//! channel id is scraped from the page first, then the channel's feed is
//! requested and parsed like any syndication source.

use super::{ParserContext, SourceListing, SourceParser, parse_feed};
use crate::error::{Error, Result};
use crate::types::Source;
use async_trait::async_trait;
use regex::Regex;

/// Patterns carrying the channel id, tried in order
const CHANNEL_ID_PATTERNS: [&str; 2] = [
    r#"externalId":"([^"]+)""#,
    r#"channel-external-id="([^"]+)""#,
];

/// Parser for platform channel pages
#[derive(Debug, Clone)]
pub struct ChannelParser {
    ctx: ParserContext,
    feed_template: String,
    patterns: Vec<Regex>,
}

impl ChannelParser {
    /// Create a parser; `feed_template` contains a `{channel_id}` placeholder
    pub fn new(ctx: ParserContext, feed_template: String) -> Result<Self> {
        let patterns = CHANNEL_ID_PATTERNS
            .iter()
            .map(|p| Regex::new(p))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Other(format!("invalid channel id pattern: {}", e)))?;
        Ok(Self {
            ctx,
            feed_template,
            patterns,
        })
    }

    /// Channel id embedded in a channel page, if any pattern matches
    pub fn extract_channel_id(&self, page: &str) -> Option<String> {
        self.patterns
            .iter()
            .find_map(|re| re.captures(page))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// Syndication feed URL of a channel
    pub fn feed_url(&self, channel_id: &str) -> String {
        self.feed_template
            .replace("{channel_id}", &urlencoding::encode(channel_id))
    }
}

#[async_trait]
impl SourceParser for ChannelParser {
    async fn list_entries(&self, source: &Source) -> Result<SourceListing> {
        let page = self.ctx.fetch_text(&source.url).await?;
        let channel_id = self
            .extract_channel_id(&page)
            .ok_or_else(|| Error::upstream(&source.url, "channel id marker not found in page"))?;

        let feed_url = self.feed_url(&channel_id);
        tracing::debug!(url = %source.url, channel_id = %channel_id, "resolved channel feed");
        let content = self.ctx.fetch_text(&feed_url).await?;
        parse_feed(&feed_url, &content)
    }
}
