use super::test_helpers::{create_test_archiver, create_test_archiver_with, test_config};
use super::*;
use crate::config::DispatchMode;
use crate::parser::{PARSER_RSS, PARSER_YOUTUBE_VIDEO};
use crate::types::Source;
use chrono::Duration as ChronoDuration;

fn record(title: &str, sources: Vec<Source>) -> SubscriptionRecord {
    SubscriptionRecord {
        title: title.to_string(),
        description: String::new(),
        image: None,
        sources,
    }
}

fn rss(url: &str) -> Source {
    Source::new(url, PARSER_RSS)
}

#[tokio::test]
async fn add_subscription_persists_sorted_sources() {
    let (archiver, _temp_dir) = create_test_archiver().await;

    let created = archiver
        .add_subscription(
            "alice",
            record(
                "Morning Show",
                vec![
                    rss("https://z.example/feed.xml"),
                    Source::new("https://www.youtube.com/@show", PARSER_YOUTUBE_VIDEO),
                    rss("https://a.example/feed.xml"),
                ],
            ),
        )
        .await
        .unwrap();

    assert_eq!(created.owner, "alice");
    assert_eq!(created.sync_state, crate::types::SyncState::ParsePending);
    assert_eq!(created.sources().len(), 3);
    assert!(created.sources().windows(2).all(|w| w[0] <= w[1]));

    let listed = archiver.list_subscriptions("alice").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, created.id);
    assert!(archiver.list_subscriptions("bob").await.unwrap().is_empty());
}

#[tokio::test]
async fn add_subscription_rejects_invalid_input() {
    let (archiver, _temp_dir) = create_test_archiver().await;

    let cases = [
        ("alice", record("  ", vec![])),
        ("alice", record("Show", vec![Source::new("https://x.example", "gopher")])),
        ("", record("Show", vec![])),
        ("alice/../bob", record("Show", vec![])),
        (".alice", record("Show", vec![])),
        ("..", record("Show", vec![])),
    ];

    for (owner, record) in cases {
        let err = archiver.add_subscription(owner, record).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "owner {owner:?}: {err}");
    }
    assert!(archiver.db.list_owners().await.unwrap().is_empty());
}

#[tokio::test]
async fn accepted_owners_map_to_valid_storage_paths() {
    let (archiver, _temp_dir) = create_test_archiver().await;

    let err = archiver
        .import_subscriptions(".hidden", vec![record("Show", vec![])])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    for owner in ["alice.smith", "bob@example.com", "carol."] {
        let created = archiver
            .add_subscription(owner, record("Show", vec![]))
            .await
            .unwrap();
        let destination =
            archiver
                .archiver
                .destination_for(owner, created.id, "https://cdn.example/ep.mp3");
        assert!(crate::storage::validate_path(&destination).is_ok(), "{destination}");
    }
}

#[tokio::test]
async fn subscriptions_are_scoped_to_their_owner() {
    let (archiver, _temp_dir) = create_test_archiver().await;
    let created = archiver
        .add_subscription("alice", record("Show", vec![]))
        .await
        .unwrap();

    let err = archiver
        .get_subscription("bob", created.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    let err = archiver
        .delete_subscription("bob", created.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert!(archiver.get_subscription("alice", created.id).await.is_ok());
}

#[tokio::test]
async fn delete_subscription_removes_stored_media() {
    let (archiver, _temp_dir) = create_test_archiver().await;
    let keep = archiver
        .add_subscription("alice", record("Keep", vec![]))
        .await
        .unwrap();
    let drop = archiver
        .add_subscription("alice", record("Drop", vec![]))
        .await
        .unwrap();

    let store = archiver.store();
    store
        .put(&format!("media/alice/{}/one", drop.id), b"1".to_vec())
        .await
        .unwrap();
    store
        .put(&format!("media/alice/{}/two", drop.id), b"2".to_vec())
        .await
        .unwrap();
    store
        .put(&format!("media/alice/{}/kept", keep.id), b"3".to_vec())
        .await
        .unwrap();

    archiver.delete_subscription("alice", drop.id).await.unwrap();

    assert_eq!(
        store.list("media/").await.unwrap(),
        vec![format!("media/alice/{}/kept", keep.id)]
    );
    assert!(matches!(
        archiver.get_subscription("alice", drop.id).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn render_feed_counts_as_access() {
    let (archiver, _temp_dir) = create_test_archiver().await;
    let created = archiver
        .add_subscription("alice", record("Show", vec![]))
        .await
        .unwrap();
    let long_ago = Utc::now() - ChronoDuration::days(90);
    archiver
        .db
        .touch_accessed("alice", created.id, long_ago)
        .await
        .unwrap();

    let xml = archiver
        .render_feed("alice", created.id, "http://pods.example/podcast/alice/1")
        .await
        .unwrap();

    assert!(xml.contains("<title>Show</title>"));
    let reloaded = archiver.get_subscription("alice", created.id).await.unwrap();
    assert!(reloaded.last_accessed_at > long_ago + ChronoDuration::days(89));
}

#[tokio::test]
async fn render_feed_of_unknown_subscription_is_not_found() {
    let (archiver, _temp_dir) = create_test_archiver().await;

    let err = archiver
        .render_feed("alice", SubscriptionId(42), "http://pods.example/x")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn import_then_export_round_trips() {
    let (archiver, _temp_dir) = create_test_archiver().await;
    let records = vec![
        SubscriptionRecord {
            description: "Daily news".to_string(),
            image: Some("https://img.example/news.png".to_string()),
            ..record("News", vec![rss("https://news.example/rss")])
        },
        record("Talks", vec![]),
    ];

    let ids = archiver
        .import_subscriptions("carol", records.clone())
        .await
        .unwrap();

    assert_eq!(ids.len(), 2);
    assert_eq!(archiver.export_subscriptions("carol").await.unwrap(), records);
}

#[tokio::test]
async fn run_task_returns_follow_ups() {
    let (archiver, _temp_dir) = create_test_archiver().await;
    archiver
        .add_subscription("alice", record("Show", vec![]))
        .await
        .unwrap();

    assert_eq!(
        archiver.run_task(Task::StartCycle).await.unwrap(),
        vec![Task::QueueOwners]
    );
    assert_eq!(
        archiver.run_task(Task::QueueOwners).await.unwrap(),
        vec![Task::QueueSubscriptions {
            owner: "alice".to_string()
        }]
    );
}

#[tokio::test]
async fn started_archiver_drains_a_cycle() {
    let (archiver, _temp_dir) = create_test_archiver().await;
    let created = archiver
        .add_subscription("alice", record("Empty", vec![]))
        .await
        .unwrap();
    let mut events = archiver.subscribe();

    archiver.start().await;
    archiver.start_cycle().await.unwrap();
    archiver.wait_idle().await;

    let subscription = archiver.get_subscription("alice", created.id).await.unwrap();
    assert_eq!(subscription.sync_state, crate::types::SyncState::Idle);
    assert!(subscription.last_synced_at.is_some());

    let mut saw_idle = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, Event::SyncIdle { id } if id == created.id) {
            saw_idle = true;
        }
    }
    assert!(saw_idle);

    archiver.shutdown().await.unwrap();
}

#[tokio::test]
async fn submit_after_shutdown_is_refused() {
    let (archiver, _temp_dir) = create_test_archiver().await;
    archiver.start().await;

    archiver.shutdown().await.unwrap();

    assert!(matches!(
        archiver.submit_task(Task::StartCycle).await,
        Err(Error::ShuttingDown)
    ));
}

#[tokio::test]
async fn http_dispatch_mode_has_no_local_queue() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&temp_dir);
    config.tasks.dispatch = DispatchMode::Http {
        base_url: "http://127.0.0.1:9".to_string(),
    };

    let archiver = create_test_archiver_with(config).await;

    assert!(archiver.queue.is_none());
    // Returns at once without a local queue
    archiver.wait_idle().await;
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&temp_dir);
    config.storage.compose_limit = 1;

    let err = PodcastArchiver::new(config).await.err().expect("config should be rejected");

    assert!(matches!(err, Error::Config { .. }));
}
