//! Shared test helpers for creating PodcastArchiver instances in tests.

use crate::config::Config;
use crate::db::Database;
use crate::parser::SourceRegistry;
use crate::service::PodcastArchiver;
use crate::storage::MemoryObjectStore;
use std::sync::Arc;
use tempfile::{TempDir, tempdir};

/// Task key configured by [`test_config`]
pub(crate) const TEST_TASK_KEY: &str = "task-key";

/// Config rooted in `temp_dir`, with a task key, local dispatch and no
/// scheduler
pub(crate) fn test_config(temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = temp_dir.path().join("test.db");
    config.storage.root = temp_dir.path().join("archive");
    config.storage.public_base_url = "https://archive.example".to_string();
    config.storage.chunk_size = 4;
    config.storage.compose_limit = 3;
    config.sync.schedule_cycles = false;
    config.tasks.task_api_key = Some(TEST_TASK_KEY.to_string());
    config
}

/// Archiver over an in-memory store and the standard registry.
/// Returns the archiver and the tempdir (which must be kept alive).
pub(crate) async fn create_test_archiver() -> (PodcastArchiver, TempDir) {
    let temp_dir = tempdir().unwrap();
    let config = test_config(&temp_dir);
    (create_test_archiver_with(config).await, temp_dir)
}

/// Archiver for `config` over an in-memory store and the standard registry
pub(crate) async fn create_test_archiver_with(config: Config) -> PodcastArchiver {
    let db = Database::new(&config.persistence.database_path)
        .await
        .unwrap();
    let store = Arc::new(MemoryObjectStore::new(config.storage.compose_limit));
    let client = reqwest::Client::new();
    let registry = SourceRegistry::standard(&config, client.clone()).unwrap();

    PodcastArchiver::from_parts(config, Arc::new(db), store, registry, client).unwrap()
}
