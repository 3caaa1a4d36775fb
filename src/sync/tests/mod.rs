mod archive;

use super::*;
use crate::config::StorageConfig;
use crate::fetcher::{ContentFetcher, MediaSource};
use crate::parser::{RawEntry, SourceListing, SourceParser};
use crate::storage::{MemoryObjectStore, ObjectStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tempfile::NamedTempFile;

pub(super) const PARSER: &str = "stub";

/// Parser answering from a fixed url -> listing table; missing urls fail
#[derive(Default)]
pub(super) struct StubParser {
    listings: HashMap<String, SourceListing>,
}

impl StubParser {
    pub(super) fn with(mut self, url: &str, listing: SourceListing) -> Self {
        self.listings.insert(url.to_string(), listing);
        self
    }
}

#[async_trait]
impl SourceParser for StubParser {
    async fn list_entries(&self, source: &Source) -> Result<SourceListing> {
        self.listings
            .get(&source.url)
            .cloned()
            .ok_or_else(|| Error::upstream(&source.url, "connection refused"))
    }
}

/// Fetcher serving fixed bytes per link; links without bytes are unavailable
#[derive(Default)]
pub(super) struct StubFetcher {
    media: HashMap<String, Vec<u8>>,
    pub(super) calls: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub(super) fn with(mut self, link: &str, bytes: &[u8]) -> Self {
        self.media.insert(link.to_string(), bytes.to_vec());
        self
    }

    pub(super) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentFetcher for StubFetcher {
    async fn resolve(&self, link: &str) -> Result<MediaSource> {
        self.calls.lock().unwrap().push(link.to_string());
        match self.media.get(link) {
            Some(bytes) => Ok(MediaSource::from_chunks(
                "audio/mpeg",
                bytes.chunks(4).map(<[u8]>::to_vec).collect(),
            )),
            None => Err(Error::download_unavailable(link, "no playable format")),
        }
    }
}

pub(super) struct Harness {
    pub(super) orchestrator: SyncOrchestrator,
    pub(super) db: Arc<Database>,
    pub(super) store: Arc<MemoryObjectStore>,
    pub(super) events: broadcast::Receiver<Event>,
    _db_file: NamedTempFile,
}

impl Harness {
    pub(super) async fn new(parser: StubParser, fetcher: Arc<dyn ContentFetcher>) -> Self {
        let db_file = NamedTempFile::new().unwrap();
        let db = Arc::new(Database::new(db_file.path()).await.unwrap());

        let mut registry = SourceRegistry::new();
        registry.register(PARSER, "Stub", Arc::new(parser), fetcher);

        let store = Arc::new(MemoryObjectStore::new(4));
        let storage = StorageConfig {
            chunk_size: 8,
            compose_limit: 4,
            public_base_url: "https://archive.example".to_string(),
            ..StorageConfig::default()
        };
        let archiver = Arc::new(PartitionedArchiver::new(store.clone(), &storage));

        let (event_tx, events) = broadcast::channel(256);
        let orchestrator = SyncOrchestrator::new(
            db.clone(),
            Arc::new(registry),
            archiver,
            SyncConfig::default(),
            event_tx,
        );

        Self {
            orchestrator,
            db,
            store,
            events,
            _db_file: db_file,
        }
    }

    /// Insert a subscription of `owner` with the given source urls
    pub(super) async fn subscribe(&self, owner: &str, urls: &[&str]) -> SubscriptionId {
        let mut subscription = Subscription::new(owner, "");
        for url in urls {
            subscription.add_source(Source::new(*url, PARSER));
        }
        self.db.insert_subscription(&subscription).await.unwrap()
    }

    pub(super) async fn load(&self, owner: &str, id: SubscriptionId) -> Subscription {
        self.db.get_subscription(owner, id).await.unwrap().unwrap()
    }

    pub(super) fn drain_events(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

pub(super) fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - chrono::Duration::days(days)
}

pub(super) fn raw(link: &str, published: DateTime<Utc>) -> RawEntry {
    RawEntry {
        title: format!("Episode at {}", link),
        description: String::new(),
        link: link.to_string(),
        published,
    }
}

pub(super) fn listing(entries: Vec<RawEntry>) -> SourceListing {
    SourceListing {
        title: Some("Upstream Show".to_string()),
        description: Some("From upstream".to_string()),
        image_url: Some("https://upstream.example/cover.png".to_string()),
        entries,
    }
}

#[tokio::test]
async fn run_step_rejects_fan_out_tasks() {
    let harness = Harness::new(StubParser::default(), Arc::new(StubFetcher::default())).await;

    let err = harness
        .orchestrator
        .run_step(&Task::QueueOwners)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn steps_on_missing_subscription_are_not_found() {
    let harness = Harness::new(StubParser::default(), Arc::new(StubFetcher::default())).await;

    let err = harness
        .orchestrator
        .parse_step("alice", SubscriptionId(99))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    let err = harness
        .orchestrator
        .archive_step("alice", SubscriptionId(99))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn delete_subscription_removes_rows_and_media() {
    let parser = StubParser::default().with(
        "https://feed/a",
        listing(vec![raw("https://cdn/1.mp3", days_ago(1))]),
    );
    let fetcher = StubFetcher::default().with("https://cdn/1.mp3", b"episode one");
    let harness = Harness::new(parser, Arc::new(fetcher)).await;
    let id = harness.subscribe("alice", &["https://feed/a"]).await;
    let other = harness.subscribe("bob", &["https://feed/a"]).await;

    harness.orchestrator.parse_step("alice", id).await.unwrap();
    harness.orchestrator.archive_step("alice", id).await.unwrap();
    harness.orchestrator.parse_step("bob", other).await.unwrap();
    harness.orchestrator.archive_step("bob", other).await.unwrap();
    assert_eq!(harness.store.list("media/").await.unwrap().len(), 2);

    assert!(
        harness
            .orchestrator
            .delete_subscription("alice", id)
            .await
            .unwrap()
    );
    assert!(
        !harness
            .orchestrator
            .delete_subscription("alice", id)
            .await
            .unwrap()
    );

    assert!(harness.db.get_subscription("alice", id).await.unwrap().is_none());
    let remaining = harness.store.list("media/").await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert!(remaining[0].starts_with(&format!("media/bob/{}/", other)));
}

#[tokio::test]
async fn retention_cutoff_is_window_before_now() {
    let harness = Harness::new(StubParser::default(), Arc::new(StubFetcher::default())).await;
    let now = Utc::now();
    let window = chrono::Duration::from_std(SyncConfig::default().episode_retention).unwrap();

    assert_eq!(harness.orchestrator.retention_cutoff(now), now - window);
}

#[tokio::test]
async fn reclaim_stale_deletes_unvisited_subscriptions() {
    let mut harness = Harness::new(StubParser::default(), Arc::new(StubFetcher::default())).await;
    let stale = harness.subscribe("alice", &["https://feed/a"]).await;
    let fresh = harness.subscribe("alice", &["https://feed/b"]).await;
    harness
        .db
        .touch_accessed("alice", stale, days_ago(90))
        .await
        .unwrap();

    let reclaimed = harness
        .orchestrator
        .reclaim_stale("alice", Utc::now())
        .await
        .unwrap();

    assert_eq!(reclaimed, vec![stale]);
    assert_eq!(
        harness.db.list_subscription_ids("alice").await.unwrap(),
        vec![fresh]
    );
    assert!(matches!(
        harness.drain_events().as_slice(),
        [Event::SubscriptionExpired { id, .. }] if *id == stale
    ));
}
