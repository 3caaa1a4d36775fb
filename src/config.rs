//! Configuration types for podcast-archiver

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Object storage layout and chunking
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct StorageConfig {
    /// Root directory of the filesystem object store (default: "./archive")
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,

    /// Base URL object paths are appended to when publishing media URLs
    /// (default: "http://127.0.0.1:6790", the built-in API server)
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Prefix for temporary upload parts (default: "tmp")
    #[serde(default = "default_scratch_prefix")]
    pub scratch_prefix: String,

    /// Prefix for final media objects (default: "media")
    #[serde(default = "default_media_prefix")]
    pub media_prefix: String,

    /// Size of each uploaded part in bytes (default: 8 MiB)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Maximum number of objects one compose call accepts (default: 32)
    #[serde(default = "default_compose_limit")]
    pub compose_limit: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            public_base_url: default_public_base_url(),
            scratch_prefix: default_scratch_prefix(),
            media_prefix: default_media_prefix(),
            chunk_size: default_chunk_size(),
            compose_limit: default_compose_limit(),
        }
    }
}

/// Retention windows and limits of the sync pipeline
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SyncConfig {
    /// Entries published longer ago than this are dropped instead of archived
    /// (default: 30 days)
    #[serde(default = "default_episode_retention", with = "duration_serde")]
    pub episode_retention: Duration,

    /// Subscriptions whose feed was not requested for this long are deleted
    /// (default: 60 days)
    #[serde(default = "default_subscription_retention", with = "duration_serde")]
    pub subscription_retention: Duration,

    /// Maximum number of sources a single subscription may reference (default: 20)
    #[serde(default = "default_max_sources")]
    pub max_sources_per_subscription: usize,

    /// Interval between sync cycles (default: 1 hour)
    #[serde(default = "default_cycle_interval", with = "duration_serde")]
    pub cycle_interval: Duration,

    /// Run the cycle scheduler in-process (default: true)
    #[serde(default = "default_true")]
    pub schedule_cycles: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            episode_retention: default_episode_retention(),
            subscription_retention: default_subscription_retention(),
            max_sources_per_subscription: default_max_sources(),
            cycle_interval: default_cycle_interval(),
            schedule_cycles: true,
        }
    }
}

/// Upstream fetching (HTTP client, platform endpoints, transcoder)
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct FetchConfig {
    /// User-Agent header sent to upstream hosts
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Request timeout (default: 60 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Channel syndication feed URL template; `{channel_id}` is substituted
    #[serde(default = "default_channel_feed_template")]
    pub channel_feed_template: String,

    /// Platform metadata endpoint template; `{video_id}` is substituted
    #[serde(default = "default_video_info_template")]
    pub video_info_template: String,

    /// Extract audio with ffmpeg instead of selecting audio-only formats (default: false)
    #[serde(default)]
    pub transcode_audio: bool,

    /// Path to ffmpeg executable (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            request_timeout: default_request_timeout(),
            channel_feed_template: default_channel_feed_template(),
            video_info_template: default_video_info_template(),
            transcode_audio: false,
            ffmpeg_path: None,
        }
    }
}

/// How continuation tasks are delivered
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// In-process queue with a bounded worker pool
    #[default]
    Local,
    /// POST each task to the `/internal/*` endpoints of a task host
    Http {
        /// Base URL of the host serving the task endpoints
        base_url: String,
    },
}

/// Task chain configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TaskConfig {
    /// Key every task invocation must carry (default: none, tasks are rejected)
    #[serde(default)]
    pub task_api_key: Option<String>,

    /// Task delivery mode (default: local)
    #[serde(default)]
    pub dispatch: DispatchMode,

    /// Maximum tasks executed concurrently by the local queue (default: 4)
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent: usize,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            task_api_key: None,
            dispatch: DispatchMode::default(),
            max_concurrent: default_max_concurrent_tasks(),
        }
    }
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PersistenceConfig {
    /// Database path (default: "./podcast-archiver.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:6790)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Optional API key for the subscription management endpoints
    #[serde(default)]
    pub api_key: Option<String>,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            api_key: None,
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

/// Retry configuration for transient upstream failures
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Main configuration for PodcastArchiver
///
/// Fields are organized into nested sections:
/// - [`storage`](StorageConfig): object store layout, chunk size, compose fan-in
/// - [`sync`](SyncConfig): retention windows and cycle cadence
/// - [`fetch`](FetchConfig): HTTP client and platform endpoints
/// - [`tasks`](TaskConfig): task key and dispatch mode
/// - [`persistence`](PersistenceConfig): database location
/// - [`api`](ApiConfig): REST server
/// - [`retry`](RetryConfig): backoff for upstream fetches
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Object storage
    #[serde(default)]
    pub storage: StorageConfig,

    /// Sync pipeline
    #[serde(default)]
    pub sync: SyncConfig,

    /// Upstream fetching
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Task chain
    #[serde(default)]
    pub tasks: TaskConfig,

    /// Database
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// REST API
    #[serde(default)]
    pub api: ApiConfig,

    /// Upstream retry policy
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Config {
    /// Reject settings the pipeline cannot operate with
    pub fn validate(&self) -> Result<()> {
        if self.storage.compose_limit < 2 {
            return Err(Error::Config {
                message: format!(
                    "compose_limit must be at least 2, got {}",
                    self.storage.compose_limit
                ),
                key: Some("storage.compose_limit".to_string()),
            });
        }
        if self.storage.chunk_size == 0 {
            return Err(Error::Config {
                message: "chunk_size must be greater than zero".to_string(),
                key: Some("storage.chunk_size".to_string()),
            });
        }
        for (key, prefix) in [
            ("storage.scratch_prefix", &self.storage.scratch_prefix),
            ("storage.media_prefix", &self.storage.media_prefix),
        ] {
            if prefix.is_empty() || prefix.contains('/') || prefix.starts_with('.') {
                return Err(Error::Config {
                    message: format!("'{}' is not a single path segment", prefix),
                    key: Some(key.to_string()),
                });
            }
        }
        if self.storage.scratch_prefix == self.storage.media_prefix {
            return Err(Error::Config {
                message: "scratch_prefix and media_prefix must differ".to_string(),
                key: Some("storage.scratch_prefix".to_string()),
            });
        }
        if self.tasks.max_concurrent == 0 {
            return Err(Error::Config {
                message: "max_concurrent must be greater than zero".to_string(),
                key: Some("tasks.max_concurrent".to_string()),
            });
        }
        Ok(())
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("./archive")
}

fn default_public_base_url() -> String {
    "http://127.0.0.1:6790".to_string()
}

fn default_scratch_prefix() -> String {
    "tmp".to_string()
}

fn default_media_prefix() -> String {
    "media".to_string()
}

fn default_chunk_size() -> usize {
    8 * 1024 * 1024
}

fn default_compose_limit() -> usize {
    32
}

fn default_episode_retention() -> Duration {
    Duration::from_secs(30 * 24 * 60 * 60)
}

fn default_subscription_retention() -> Duration {
    Duration::from_secs(60 * 24 * 60 * 60)
}

fn default_max_sources() -> usize {
    20
}

fn default_cycle_interval() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_user_agent() -> String {
    concat!("podcast-archiver/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_channel_feed_template() -> String {
    "https://www.youtube.com/feeds/videos.xml?channel_id={channel_id}".to_string()
}

fn default_video_info_template() -> String {
    "https://www.youtube.com/get_video_info?video_id={video_id}".to_string()
}

fn default_max_concurrent_tasks() -> usize {
    4
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./podcast-archiver.db")
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6790))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
