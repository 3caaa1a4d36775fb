//! Archive server example
//!
//! Runs podcast-archiver with its REST API and the in-process cycle
//! scheduler. Pass a JSON config file as the first argument to override the
//! defaults; set `RUST_LOG` to adjust logging (default: info).
//!
//! After starting, you can:
//! - View Swagger UI at http://localhost:6790/swagger-ui
//! - Add a subscription via POST http://localhost:6790/subscriptions/alice
//! - Read the archived feed via GET http://localhost:6790/podcast/alice/1
//! - Stream events via GET http://localhost:6790/events

use podcast_archiver::{Config, PodcastArchiver, run_with_shutdown};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            let raw = tokio::fs::read_to_string(&path).await?;
            serde_json::from_str::<Config>(&raw)?
        }
        None => Config::default(),
    };
    let bind_address = config.api.bind_address;

    let archiver = Arc::new(PodcastArchiver::new(config).await?);
    archiver.start().await;
    let api = archiver.spawn_api_server();

    println!("Starting podcast-archiver on http://{}", bind_address);
    println!("Swagger UI: http://{}/swagger-ui", bind_address);
    println!();
    println!("Example commands:");
    println!("  # Subscribe alice to a feed");
    println!("  curl -X POST http://{}/subscriptions/alice \\", bind_address);
    println!("    -H 'Content-Type: application/json' \\");
    println!(
        "    -d '{{\"title\": \"Show\", \"sources\": [{{\"url\": \"https://example.com/feed.xml\", \"parser\": \"rss\"}}]}}'"
    );
    println!();
    println!("  # Stream events (Server-Sent Events)");
    println!("  curl -N http://{}/events", bind_address);

    run_with_shutdown(&archiver).await?;
    api.await??;

    Ok(())
}
