use super::*;
use crate::feed::{Entry, EntryIdentity};

#[tokio::test]
async fn three_entries_archive_oldest_first_then_idle() {
    let parser = StubParser::default().with(
        "https://feed/a",
        listing(vec![
            raw("https://cdn/new.mp3", days_ago(1)),
            raw("https://cdn/mid.mp3", days_ago(2)),
            raw("https://cdn/old.mp3", days_ago(3)),
        ]),
    );
    let fetcher = Arc::new(
        StubFetcher::default()
            .with("https://cdn/new.mp3", b"newest episode bytes")
            .with("https://cdn/mid.mp3", b"middle episode")
            .with("https://cdn/old.mp3", b"the oldest episode, a bit longer"),
    );
    let mut harness = Harness::new(parser, fetcher.clone()).await;
    let id = harness.subscribe("alice", &["https://feed/a"]).await;
    harness.orchestrator.parse_step("alice", id).await.unwrap();
    harness.drain_events();

    for _ in 0..3 {
        let outcome = harness.orchestrator.archive_step("alice", id).await.unwrap();
        assert_eq!(outcome.state, SyncState::ArchivePending);
        assert_eq!(
            outcome.continuation,
            Some(Task::ArchiveSubscription {
                owner: "alice".to_string(),
                id
            })
        );
    }

    let last = harness.orchestrator.archive_step("alice", id).await.unwrap();
    assert_eq!(last.state, SyncState::Idle);
    assert!(last.continuation.is_none());

    assert_eq!(
        fetcher.calls(),
        vec![
            "https://cdn/old.mp3",
            "https://cdn/mid.mp3",
            "https://cdn/new.mp3"
        ]
    );

    let subscription = harness.load("alice", id).await;
    assert_eq!(subscription.sync_state, SyncState::Idle);
    for entry in subscription.feed.entries() {
        assert!(entry.is_archived());
        let path = entry.media_path().unwrap();
        assert!(path.starts_with(&format!("media/alice/{}/", id)));
        assert_eq!(
            entry.media_url(),
            format!("https://archive.example/{}", path)
        );
        assert_eq!(entry.mime_type(), "audio/mpeg");
        assert_eq!(
            harness.store.read(path).await.unwrap().len() as u64,
            entry.size_bytes()
        );
    }
    assert!(harness.store.list("tmp/").await.unwrap().is_empty());

    let events = harness.drain_events();
    let archived = events
        .iter()
        .filter(|e| matches!(e, Event::EntryArchived { .. }))
        .count();
    assert_eq!(archived, 3);
    assert!(matches!(events.last(), Some(Event::SyncIdle { .. })));
}

#[tokio::test]
async fn unavailable_media_keeps_upstream_link() {
    let parser = StubParser::default().with(
        "https://feed/a",
        listing(vec![raw("https://cdn/gone.mp3", days_ago(1))]),
    );
    let mut harness = Harness::new(parser, Arc::new(StubFetcher::default())).await;
    let id = harness.subscribe("alice", &["https://feed/a"]).await;
    harness.orchestrator.parse_step("alice", id).await.unwrap();
    harness.drain_events();

    let outcome = harness.orchestrator.archive_step("alice", id).await.unwrap();
    assert!(outcome.continuation.is_some());

    let subscription = harness.load("alice", id).await;
    let entry = &subscription.feed.entries()[0];
    assert!(entry.is_archived());
    assert_eq!(entry.media_url(), "https://cdn/gone.mp3");
    assert!(entry.media_path().is_none());
    assert!(harness.store.list("media/").await.unwrap().is_empty());

    assert!(matches!(
        harness.drain_events().as_slice(),
        [Event::EntryFallback { link, .. }] if link == "https://cdn/gone.mp3"
    ));

    let next = harness.orchestrator.archive_step("alice", id).await.unwrap();
    assert_eq!(next.state, SyncState::Idle);
}

#[tokio::test]
async fn expired_entries_are_dropped_with_their_media() {
    let fetcher = Arc::new(StubFetcher::default());
    let harness = Harness::new(StubParser::default(), fetcher.clone()).await;

    // An archived entry that has since aged out of the window
    let old_published = days_ago(45);
    let old_path = "media/alice/1/old";
    harness
        .store
        .put(old_path, b"stale".to_vec())
        .await
        .unwrap();
    let mut old = Entry::new(
        EntryIdentity::new(PARSER, "https://cdn/old.mp3", old_published),
        "Old",
        "",
    );
    old.mark_archived("https://archive.example/media/old", old_path, 5, "audio/mpeg");

    let mut subscription = Subscription::new("alice", "Show");
    subscription.add_source(Source::new("https://feed/a", PARSER));
    subscription.feed.merge([old]);
    let id = harness.db.insert_subscription(&subscription).await.unwrap();

    let outcome = harness.orchestrator.archive_step("alice", id).await.unwrap();

    assert_eq!(outcome.state, SyncState::Idle);
    assert!(harness.load("alice", id).await.feed.is_empty());
    assert!(harness.store.stat(old_path).await.unwrap().is_none());
    assert!(fetcher.calls().is_empty());
}

#[tokio::test]
async fn duplicate_archive_task_after_idle_is_a_no_op() {
    let parser = StubParser::default().with(
        "https://feed/a",
        listing(vec![raw("https://cdn/1.mp3", days_ago(1))]),
    );
    let fetcher = Arc::new(StubFetcher::default().with("https://cdn/1.mp3", b"one"));
    let harness = Harness::new(parser, fetcher.clone()).await;
    let id = harness.subscribe("alice", &["https://feed/a"]).await;

    harness.orchestrator.parse_step("alice", id).await.unwrap();
    harness.orchestrator.archive_step("alice", id).await.unwrap();
    let before = harness.load("alice", id).await;

    for _ in 0..2 {
        let outcome = harness.orchestrator.archive_step("alice", id).await.unwrap();
        assert_eq!(outcome.state, SyncState::Idle);
        assert!(outcome.continuation.is_none());
    }

    assert_eq!(fetcher.calls().len(), 1);
    assert_eq!(harness.load("alice", id).await.feed, before.feed);
}

/// Fetcher that archives the entry through the database while the step is
/// still resolving it, as a concurrent duplicate task would
struct RacingFetcher {
    db: Arc<Database>,
    owner: String,
    id: Mutex<Option<SubscriptionId>>,
}

#[async_trait]
impl ContentFetcher for RacingFetcher {
    async fn resolve(&self, link: &str) -> Result<MediaSource> {
        let id = self.id.lock().unwrap().unwrap();
        let mut subscription = self
            .db
            .get_subscription(&self.owner, id)
            .await
            .unwrap()
            .unwrap();
        for entry in subscription.feed.entries().to_vec() {
            if entry.link() == link {
                subscription
                    .feed
                    .get_mut(entry.identity())
                    .unwrap()
                    .mark_archived("https://elsewhere/x", "media/alice/racer", 1, "audio/ogg");
            }
        }
        self.db.save_subscription(&subscription).await.unwrap();
        Ok(MediaSource::from_chunks("audio/mpeg", vec![b"late".to_vec()]))
    }
}

#[tokio::test]
async fn concurrent_archival_is_not_overwritten() {
    let db_file = NamedTempFile::new().unwrap();
    let db = Arc::new(Database::new(db_file.path()).await.unwrap());
    let racer = Arc::new(RacingFetcher {
        db: db.clone(),
        owner: "alice".to_string(),
        id: Mutex::new(None),
    });

    let parser = StubParser::default().with(
        "https://feed/a",
        listing(vec![raw("https://cdn/1.mp3", days_ago(1))]),
    );
    let mut registry = SourceRegistry::new();
    registry.register(PARSER, "Stub", Arc::new(parser), racer.clone());
    let store = Arc::new(MemoryObjectStore::new(4));
    let archiver = Arc::new(PartitionedArchiver::new(
        store.clone(),
        &StorageConfig::default(),
    ));
    let (event_tx, _events) = broadcast::channel(16);
    let orchestrator = SyncOrchestrator::new(
        db.clone(),
        Arc::new(registry),
        archiver,
        SyncConfig::default(),
        event_tx,
    );

    let mut subscription = Subscription::new("alice", "Race");
    subscription.add_source(Source::new("https://feed/a", PARSER));
    let id = db.insert_subscription(&subscription).await.unwrap();
    *racer.id.lock().unwrap() = Some(id);

    orchestrator.parse_step("alice", id).await.unwrap();
    let outcome = orchestrator.archive_step("alice", id).await.unwrap();
    assert!(outcome.continuation.is_some());

    let stored = db.get_subscription("alice", id).await.unwrap().unwrap();
    let entry = &stored.feed.entries()[0];
    assert_eq!(entry.media_url(), "https://elsewhere/x");
    assert_eq!(entry.mime_type(), "audio/ogg");
}

/// Store that merges a new entry into the subscription while media is being
/// deleted, as a parse step running alongside the archive chain would
struct MergingStore {
    inner: MemoryObjectStore,
    db: Arc<Database>,
    target: Mutex<Option<(String, SubscriptionId)>>,
}

#[async_trait]
impl ObjectStore for MergingStore {
    fn compose_limit(&self) -> usize {
        self.inner.compose_limit()
    }

    async fn put(&self, path: &str, data: Vec<u8>) -> Result<u64> {
        self.inner.put(path, data).await
    }

    async fn compose(&self, sources: &[String], destination: &str) -> Result<u64> {
        self.inner.compose(sources, destination).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let target = self.target.lock().unwrap().take();
        if let Some((owner, id)) = target {
            let mut subscription = self.db.get_subscription(&owner, id).await?.unwrap();
            subscription.feed.merge([Entry::new(
                EntryIdentity::new(PARSER, "https://cdn/fresh.mp3", days_ago(1)),
                "Fresh",
                "",
            )]);
            self.db.save_subscription(&subscription).await?;
        }
        self.inner.delete(path).await
    }

    async fn set_content_type(&self, path: &str, content_type: &str) -> Result<()> {
        self.inner.set_content_type(path, content_type).await
    }

    async fn stat(&self, path: &str) -> Result<Option<crate::storage::ObjectMeta>> {
        self.inner.stat(path).await
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.inner.read(path).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        self.inner.list(prefix).await
    }
}

#[tokio::test]
async fn entries_merged_during_expiry_survive() {
    let db_file = NamedTempFile::new().unwrap();
    let db = Arc::new(Database::new(db_file.path()).await.unwrap());
    let store = Arc::new(MergingStore {
        inner: MemoryObjectStore::new(4),
        db: db.clone(),
        target: Mutex::new(None),
    });

    let fetcher = Arc::new(StubFetcher::default().with("https://cdn/fresh.mp3", b"fresh bytes"));
    let mut registry = SourceRegistry::new();
    registry.register(
        PARSER,
        "Stub",
        Arc::new(StubParser::default()),
        fetcher.clone(),
    );
    let archiver = Arc::new(PartitionedArchiver::new(
        store.clone(),
        &StorageConfig::default(),
    ));
    let (event_tx, _events) = broadcast::channel(16);
    let orchestrator = SyncOrchestrator::new(
        db.clone(),
        Arc::new(registry),
        archiver,
        SyncConfig::default(),
        event_tx,
    );

    let old_path = "media/alice/1/old";
    store.inner.put(old_path, b"stale".to_vec()).await.unwrap();
    let mut old = Entry::new(
        EntryIdentity::new(PARSER, "https://cdn/old.mp3", days_ago(45)),
        "Old",
        "",
    );
    old.mark_archived("https://archive.example/media/old", old_path, 5, "audio/mpeg");
    let mut subscription = Subscription::new("alice", "Show");
    subscription.feed.merge([old]);
    let id = db.insert_subscription(&subscription).await.unwrap();
    *store.target.lock().unwrap() = Some(("alice".to_string(), id));

    let outcome = orchestrator.archive_step("alice", id).await.unwrap();

    assert_eq!(outcome.state, SyncState::ArchivePending);
    assert!(outcome.continuation.is_some());
    let stored = db.get_subscription("alice", id).await.unwrap().unwrap();
    let links: Vec<&str> = stored.feed.entries().iter().map(Entry::link).collect();
    assert_eq!(links, ["https://cdn/fresh.mp3"]);
    assert!(stored.feed.entries()[0].is_archived());
    assert_eq!(fetcher.calls(), ["https://cdn/fresh.mp3"]);
    assert!(store.stat(old_path).await.unwrap().is_none());
}

/// Body yielding one chunk and then losing the connection
struct TruncatedBody {
    sent: bool,
}

#[async_trait]
impl crate::fetcher::MediaBody for TruncatedBody {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        if self.sent {
            return Err(Error::download_unavailable(
                "https://cdn/cut.mp3",
                "connection reset",
            ));
        }
        self.sent = true;
        Ok(Some(vec![7u8; 20]))
    }
}

struct TruncatingFetcher;

#[async_trait]
impl ContentFetcher for TruncatingFetcher {
    async fn resolve(&self, _link: &str) -> Result<MediaSource> {
        Ok(MediaSource {
            mime_type: "audio/mpeg".to_string(),
            content_length: Some(1_000),
            body: Box::new(TruncatedBody { sent: false }),
        })
    }
}

#[tokio::test]
async fn stream_cut_mid_upload_keeps_upstream_link() {
    let parser = StubParser::default().with(
        "https://feed/a",
        listing(vec![raw("https://cdn/cut.mp3", days_ago(1))]),
    );
    let mut harness = Harness::new(parser, Arc::new(TruncatingFetcher)).await;
    let id = harness.subscribe("alice", &["https://feed/a"]).await;
    harness.orchestrator.parse_step("alice", id).await.unwrap();
    harness.drain_events();

    let outcome = harness.orchestrator.archive_step("alice", id).await.unwrap();

    assert_eq!(outcome.state, SyncState::ArchivePending);
    assert_eq!(
        outcome.continuation,
        Some(Task::ArchiveSubscription {
            owner: "alice".to_string(),
            id
        })
    );
    let subscription = harness.load("alice", id).await;
    let entry = &subscription.feed.entries()[0];
    assert!(entry.is_archived());
    assert_eq!(entry.media_url(), "https://cdn/cut.mp3");
    assert!(entry.media_path().is_none());
    assert!(harness.store.list("tmp/").await.unwrap().is_empty());
    assert!(harness.store.list("media/").await.unwrap().is_empty());
    assert!(matches!(
        harness.drain_events().as_slice(),
        [Event::EntryFallback { link, .. }] if link == "https://cdn/cut.mp3"
    ));
}
