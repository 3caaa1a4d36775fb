//! RSS 2.0 / Atom parsing

use super::{ParserContext, RawEntry, SourceListing, SourceParser};
use crate::error::{Error, Result};
use crate::types::Source;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

/// Parser for plain syndication feeds
#[derive(Debug, Clone)]
pub struct SyndicationParser {
    ctx: ParserContext,
}

impl SyndicationParser {
    /// Create a parser using `ctx` for HTTP access
    pub fn new(ctx: ParserContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl SourceParser for SyndicationParser {
    async fn list_entries(&self, source: &Source) -> Result<SourceListing> {
        debug!(url = %source.url, "fetching syndication feed");
        let content = self.ctx.fetch_text(&source.url).await?;
        parse_feed(&source.url, &content)
    }
}

/// Parse feed content as RSS, falling back to Atom.
///
/// Items without a usable link or publish date are skipped.
pub fn parse_feed(url: &str, content: &str) -> Result<SourceListing> {
    match parse_as_rss(content) {
        Ok(listing) => {
            debug!(url = %url, entries = listing.entries.len(), "parsed as RSS");
            Ok(listing)
        }
        Err(rss_err) => match parse_as_atom(content) {
            Ok(listing) => {
                debug!(url = %url, entries = listing.entries.len(), "parsed as Atom");
                Ok(listing)
            }
            Err(atom_err) => Err(Error::parse_failure(
                url,
                format!(
                    "not an RSS or Atom document. RSS error: {}. Atom error: {}",
                    rss_err, atom_err
                ),
            )),
        },
    }
}

fn parse_as_rss(content: &str) -> std::result::Result<SourceListing, rss::Error> {
    let channel = content.parse::<rss::Channel>()?;

    let entries = channel
        .items()
        .iter()
        .filter_map(|item| {
            let link = item
                .enclosure()
                .map(|enc| enc.url().to_string())
                .or_else(|| item.link().map(|l| l.to_string()))
                .filter(|l| !l.is_empty());
            let published = item.pub_date().and_then(parse_date);

            let (Some(link), Some(published)) = (link, published) else {
                debug!(title = ?item.title(), "skipping RSS item without link or date");
                return None;
            };
            Some(RawEntry {
                title: item.title().unwrap_or("").to_string(),
                description: item.description().unwrap_or("").to_string(),
                link,
                published,
            })
        })
        .collect();

    Ok(SourceListing {
        title: Some(channel.title().to_string()).filter(|t| !t.is_empty()),
        description: Some(channel.description().to_string()).filter(|d| !d.is_empty()),
        image_url: channel
            .image()
            .map(|i| i.url().to_string())
            .or_else(|| {
                channel
                    .itunes_ext()
                    .and_then(|ext| ext.image())
                    .map(str::to_string)
            }),
        entries,
    })
}

fn parse_as_atom(content: &str) -> std::result::Result<SourceListing, atom_syndication::Error> {
    let feed = atom_syndication::Feed::read_from(content.as_bytes())?;

    let entries = feed
        .entries()
        .iter()
        .filter_map(|entry| {
            // Prefer published, fall back to updated
            let stamp = entry.published().unwrap_or(entry.updated());
            let published = DateTime::parse_from_rfc3339(&stamp.to_rfc3339())
                .ok()
                .map(|dt| dt.with_timezone(&Utc))?;

            let links = entry.links();
            let link = links
                .iter()
                .find(|l| l.rel() == "enclosure")
                .or_else(|| links.iter().find(|l| l.rel() == "alternate"))
                .or_else(|| links.first())
                .map(|l| l.href().to_string())
                .filter(|l| !l.is_empty());
            let Some(link) = link else {
                debug!(id = %entry.id(), "skipping Atom entry without link");
                return None;
            };

            let description = entry
                .summary()
                .map(|s| s.as_str().to_string())
                .or_else(|| entry.content().and_then(|c| c.value().map(|v| v.to_string())))
                .unwrap_or_default();

            Some(RawEntry {
                title: entry.title().as_str().to_string(),
                description,
                link,
                published,
            })
        })
        .collect();

    Ok(SourceListing {
        title: Some(feed.title().as_str().to_string()).filter(|t| !t.is_empty()),
        description: feed
            .subtitle()
            .map(|s| s.as_str().to_string())
            .filter(|s| !s.is_empty()),
        image_url: feed.logo().or(feed.icon()).map(str::to_string),
        entries,
    })
}

/// RFC 2822 dates, with RFC 3339 accepted from feeds that use it anyway
fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .or_else(|_| DateTime::parse_from_rfc3339(value.trim()))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
