
use super::*;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Dispatcher that only records what it was given
#[derive(Default)]
pub(super) struct RecordingDispatcher {
    tasks: Mutex<Vec<Task>>,
}

impl RecordingDispatcher {
    pub(super) fn tasks(&self) -> Vec<Task> {
        self.tasks.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskDispatcher for RecordingDispatcher {
    async fn dispatch(&self, task: Task) -> Result<()> {
        self.tasks.lock().unwrap().push(task);
        Ok(())
    }
}

fn sync_task() -> Task {
    Task::SyncSubscription {
        owner: "alice".to_string(),
        id: SubscriptionId(7),
    }
}

#[test]
fn every_task_rebuilds_from_its_form() {
    let tasks = [
        Task::StartCycle,
        Task::QueueOwners,
        Task::QueueSubscriptions {
            owner: "alice".to_string(),
        },
        sync_task(),
        Task::ArchiveSubscription {
            owner: "bob".to_string(),
            id: SubscriptionId(3),
        },
    ];

    for task in tasks {
        let rebuilt = Task::from_form(task.endpoint(), &task.to_form()).unwrap();
        assert_eq!(rebuilt, task);
    }
}

#[test]
fn endpoints_match_the_published_list() {
    let endpoints: Vec<&str> = [
        Task::StartCycle,
        Task::QueueOwners,
        Task::QueueSubscriptions {
            owner: String::new(),
        },
        sync_task(),
        Task::ArchiveSubscription {
            owner: String::new(),
            id: SubscriptionId(1),
        },
    ]
    .iter()
    .map(Task::endpoint)
    .collect();

    assert_eq!(endpoints, TASK_ENDPOINTS);
}

#[test]
fn from_form_requires_arguments() {
    let err = Task::from_form("sync-subscription", &TaskForm::default()).unwrap_err();
    assert!(matches!(err, Error::Validation(msg) if msg.contains("owner")));

    let form = TaskForm {
        owner: Some("alice".to_string()),
        ..TaskForm::default()
    };
    let err = Task::from_form("archive-subscription", &form).unwrap_err();
    assert!(matches!(err, Error::Validation(msg) if msg.contains("id")));

    let form = TaskForm {
        owner: Some(String::new()),
        ..TaskForm::default()
    };
    assert!(Task::from_form("queue-subscriptions", &form).is_err());
}

#[test]
fn unknown_endpoint_is_not_found() {
    let err = Task::from_form("reticulate-splines", &TaskForm::default()).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
fn display_names_task_and_arguments() {
    assert_eq!(Task::QueueOwners.to_string(), "queue-owners");
    assert_eq!(sync_task().to_string(), "sync-subscription(alice/7)");
}

#[test]
fn task_json_is_tagged() {
    let json = serde_json::to_value(sync_task()).unwrap();
    assert_eq!(json["task"], "sync_subscription");
    assert_eq!(json["owner"], "alice");
    assert_eq!(json["id"], 7);
}

#[tokio::test]
async fn scheduler_starts_a_cycle_immediately_and_stops_on_cancel() {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let cancel = CancellationToken::new();
    let scheduler = CycleScheduler::new(dispatcher.clone(), Duration::from_secs(3600), cancel.clone());

    let handle = tokio::spawn(scheduler.run());
    tokio::time::timeout(Duration::from_secs(5), async {
        while dispatcher.tasks().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(dispatcher.tasks(), vec![Task::StartCycle]);
}

#[tokio::test]
async fn scheduler_fires_every_interval() {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let cancel = CancellationToken::new();
    let scheduler = CycleScheduler::new(dispatcher.clone(), Duration::from_millis(20), cancel.clone());

    let handle = tokio::spawn(scheduler.run());
    tokio::time::sleep(Duration::from_millis(150)).await;
    cancel.cancel();
    handle.await.unwrap();

    let tasks = dispatcher.tasks();
    assert!(tasks.len() >= 3, "expected several cycles, got {}", tasks.len());
    assert!(tasks.iter().all(|t| *t == Task::StartCycle));
}
