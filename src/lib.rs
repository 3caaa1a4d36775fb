//! # podcast-archiver
//!
//! Self-hosted podcast archiver: aggregates feeds and video channels into
//! per-user subscriptions, archives every episode's media into object
//! storage, and republishes each subscription as an RSS 2.0 feed pointing at
//! the archived copies.
//!
//! ## Design
//!
//! - **Self-rescheduling tasks** - Work is a chain of bounded [`Task`]s; each
//!   step hands its continuation to a [`TaskDispatcher`], in-process or over HTTP
//! - **Pluggable sources** - Parser/fetcher pairs are registered by name in the
//!   [`SourceRegistry`] (`rss`, `youtube-audio`, `youtube-video`)
//! - **Bounded archiving** - Media is uploaded in parts and composed within the
//!   store's fan-in limit, never buffered whole in memory
//! - **Event-driven** - Consumers subscribe to pipeline events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use podcast_archiver::{Config, PodcastArchiver, Source, SubscriptionRecord};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let archiver = PodcastArchiver::new(Config::default()).await?;
//!
//!     archiver
//!         .add_subscription(
//!             "alice",
//!             SubscriptionRecord {
//!                 title: "Morning Show".to_string(),
//!                 description: String::new(),
//!                 image: None,
//!                 sources: vec![Source::new("https://example.com/feed.xml", "rss")],
//!             },
//!         )
//!         .await?;
//!
//!     // Subscribe to events
//!     let mut events = archiver.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     archiver.start().await;
//!     archiver.start_cycle().await?;
//!     archiver.wait_idle().await;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Error types
pub mod error;
/// Entries and their merge/dedup rules
pub mod feed;
/// Media fetchers
pub mod fetcher;
/// Source parsers and the source-type registry
pub mod parser;
/// Subscription import and export
pub mod portability;
/// RSS rendering of archived subscriptions
pub mod publish;
/// Retry logic with exponential backoff
pub mod retry;
/// The archiver facade
pub mod service;
/// Object storage and the partitioned archiver
pub mod storage;
/// Parse and archive steps of the sync state machine
pub mod sync;
/// Self-rescheduling task chain
pub mod tasks;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{Config, DispatchMode};
pub use db::Database;
pub use error::{
    ApiError, DatabaseError, Error, ErrorDetail, Result, StorageError, ToHttpStatus,
};
pub use feed::{Entry, EntryIdentity, Feed};
pub use parser::SourceRegistry;
pub use portability::SubscriptionRecord;
pub use service::PodcastArchiver;
pub use storage::{FsObjectStore, MemoryObjectStore, ObjectStore};
pub use tasks::{Task, TaskDispatcher};
pub use types::{Event, Source, Subscription, SubscriptionId, SyncState};

/// Helper function to run the archiver with graceful signal handling.
///
/// Waits for a termination signal and then calls the archiver's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use podcast_archiver::{Config, PodcastArchiver, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let archiver = PodcastArchiver::new(Config::default()).await?;
///     archiver.start().await;
///
///     // Run with automatic signal handling
///     run_with_shutdown(&archiver).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(archiver: &PodcastArchiver) -> Result<()> {
    wait_for_signal().await;
    archiver.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
