//! OpenAPI documentation and schema generation
//!
//! This module defines the OpenAPI specification for the podcast-archiver
//! REST API using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the podcast-archiver REST API
///
/// The spec can be accessed via:
/// - `/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "podcast-archiver REST API",
        version = "0.1.0",
        description = "Manage podcast subscriptions, drive the archival task chain, and serve archived feeds and media",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:6790", description = "Local development server")
    ),
    paths(
        // Task chain
        crate::api::routes::invoke_task,

        // Published feeds and media
        crate::api::routes::podcast_feed,
        crate::api::routes::serve_media,

        // Subscriptions
        crate::api::routes::list_subscriptions,
        crate::api::routes::create_subscription,
        crate::api::routes::get_subscription,
        crate::api::routes::delete_subscription,
        crate::api::routes::sync_subscription,
        crate::api::routes::export_subscriptions,
        crate::api::routes::import_subscriptions,
        crate::api::routes::list_parsers,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(schemas(
        // Domain types
        crate::types::SubscriptionId,
        crate::types::Subscription,
        crate::types::Source,
        crate::types::SyncState,
        crate::types::Event,
        crate::feed::Feed,
        crate::feed::Entry,
        crate::feed::EntryIdentity,
        crate::portability::SubscriptionRecord,
        crate::tasks::Task,
        crate::tasks::TaskForm,

        // Config types from config.rs
        crate::config::Config,
        crate::config::StorageConfig,
        crate::config::SyncConfig,
        crate::config::FetchConfig,
        crate::config::TaskConfig,
        crate::config::DispatchMode,
        crate::config::PersistenceConfig,
        crate::config::ApiConfig,
        crate::config::RetryConfig,

        // API request/response types
        crate::api::routes::ParserInfo,
        crate::api::routes::ImportResponse,
        crate::api::routes::SyncAcceptedResponse,

        // Error types from error.rs
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "tasks", description = "Task chain - Internal endpoints driving sync cycles, guarded by the task key"),
        (name = "feeds", description = "Published feeds - RSS 2.0 documents of archived subscriptions"),
        (name = "media", description = "Media - Archived media objects"),
        (name = "subscriptions", description = "Subscriptions - Create, inspect, delete, import and export subscriptions"),
        (name = "system", description = "System endpoints - Health checks, OpenAPI spec, events"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Security addon to add API key authentication scheme to OpenAPI spec
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = &mut openapi.components {
            components.add_security_scheme(
                "api_key",
                utoipa::openapi::security::SecurityScheme::ApiKey(
                    utoipa::openapi::security::ApiKey::Header(
                        utoipa::openapi::security::ApiKeyValue::new("X-Api-Key"),
                    ),
                ),
            );
        }
    }
}
