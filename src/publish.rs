//! RSS 2.0 rendering of an archived subscription

use crate::feed::Entry;
use crate::fetcher::DEFAULT_MIME_TYPE;
use crate::types::Subscription;
use rss::{
    Channel, ChannelBuilder, EnclosureBuilder, GuidBuilder, ImageBuilder, Item, ItemBuilder,
};

/// MIME type of the published document
pub const RSS_CONTENT_TYPE: &str = "application/rss+xml";

const GENERATOR: &str = concat!("podcast-archiver ", env!("CARGO_PKG_VERSION"));

/// Build the RSS channel of a subscription; `self_url` is where it is served
pub fn to_channel(subscription: &Subscription, self_url: &str) -> Channel {
    let items: Vec<Item> = subscription.feed.entries().iter().map(to_item).collect();

    let image = subscription.image_url.as_ref().map(|url| {
        ImageBuilder::default()
            .url(url.clone())
            .title(subscription.title.clone())
            .link(self_url.to_string())
            .build()
    });

    ChannelBuilder::default()
        .title(subscription.title.clone())
        .link(self_url.to_string())
        .description(subscription.description.clone())
        .generator(Some(GENERATOR.to_string()))
        .last_build_date(subscription.last_synced_at.map(|at| at.to_rfc2822()))
        .image(image)
        .items(items)
        .build()
}

/// Render a subscription as an RSS 2.0 document
pub fn render_feed(subscription: &Subscription, self_url: &str) -> String {
    to_channel(subscription, self_url).to_string()
}

fn to_item(entry: &Entry) -> Item {
    let guid = GuidBuilder::default()
        .value(entry.link().to_string())
        .permalink(false)
        .build();

    let mime_type = if entry.mime_type().is_empty() {
        DEFAULT_MIME_TYPE
    } else {
        entry.mime_type()
    };
    let enclosure = EnclosureBuilder::default()
        .url(entry.media_url().to_string())
        .length(entry.size_bytes().to_string())
        .mime_type(mime_type.to_string())
        .build();

    ItemBuilder::default()
        .title(Some(entry.title().to_string()))
        .link(Some(entry.link().to_string()))
        .description(Some(entry.description().to_string()))
        .guid(Some(guid))
        .pub_date(Some(entry.published().to_rfc2822()))
        .enclosure(Some(enclosure))
        .build()
}
