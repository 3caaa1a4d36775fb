
use crate::db::Database;
use crate::feed::{Entry, EntryIdentity};
use crate::types::{Source, Subscription};
use chrono::{DateTime, TimeZone, Utc};
use tempfile::NamedTempFile;

pub(super) async fn create_test_db() -> (Database, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    (db, temp_file)
}

pub(super) fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap()
}

pub(super) fn entry(link: &str, published: DateTime<Utc>) -> Entry {
    Entry::new(
        EntryIdentity::new("rss", link, published),
        format!("title of {}", link),
        "",
    )
}

pub(super) fn sample_subscription(owner: &str) -> Subscription {
    let mut subscription = Subscription::new(owner, "Example Show");
    subscription.description = "Weekly".to_string();
    subscription.image_url = Some("https://example.com/cover.jpg".to_string());
    subscription.add_source(Source::new("https://example.com/feed.xml", "rss"));
    subscription.add_source(Source::new("https://www.youtube.com/c/x", "youtube-audio"));
    subscription.feed.merge([
        entry("https://cdn/1.mp3", at(1_700_000_000)),
        entry("https://cdn/2.mp3", at(1_700_100_000)),
    ]);
    subscription
}
