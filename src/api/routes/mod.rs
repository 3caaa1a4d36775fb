//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`tasks`] - `/internal/*` task invocation
//! - [`feeds`] - Published RSS documents
//! - [`subscriptions`] - Subscription management, import and export
//! - [`media`] - Stored media objects
//! - [`system`] - Health, events, OpenAPI

use crate::types::SubscriptionId;
use serde::{Deserialize, Serialize};

mod feeds;
mod media;
mod subscriptions;
mod system;
mod tasks;

// Re-export all handlers so `routes::function_name` works
pub use feeds::*;
pub use media::*;
pub use subscriptions::*;
pub use system::*;
pub use tasks::*;

// ============================================================================
// Request/Response Types (shared across handlers)
// ============================================================================

/// A registered source type, as listed by GET /parsers
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ParserInfo {
    /// Parser name stored on sources ("rss", "youtube-audio", ...)
    pub name: String,
    /// Human-readable name
    pub display_name: String,
}

/// Response for POST /subscriptions/:owner/import
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ImportResponse {
    /// IDs of the created subscriptions, in record order
    pub ids: Vec<SubscriptionId>,
}

/// Response for POST /subscriptions/:owner/:id/sync
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct SyncAcceptedResponse {
    /// The accepted task
    pub task: crate::tasks::Task,
}
