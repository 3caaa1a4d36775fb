//! REST API server module
//!
//! Serves the published feeds and archived media, the `/internal/*` task
//! endpoints that drive the sync chain, and the subscription management API.

use crate::{Config, PodcastArchiver, Result};
use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod auth;
pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Task Chain (form body must carry `tasks.task_api_key`)
/// - `POST /internal/:task` - Run one task step
///
/// ## Published Feeds and Media (public)
/// - `GET /podcast/:owner/:id` - RSS 2.0 document
/// - `GET /<media prefix>/*path` - Archived media object
///
/// ## Subscriptions (X-Api-Key when `api.api_key` is set)
/// - `GET /subscriptions/:owner` - List subscriptions
/// - `POST /subscriptions/:owner` - Create subscription
/// - `GET /subscriptions/:owner/:id` - Get subscription
/// - `DELETE /subscriptions/:owner/:id` - Delete subscription and its media
/// - `POST /subscriptions/:owner/:id/sync` - Queue a sync now
/// - `GET /subscriptions/:owner/export` - Export portable records
/// - `POST /subscriptions/:owner/import` - Import portable records
/// - `GET /parsers` - Registered source types
/// - `GET /events` - Server-sent events stream
///
/// ## System (public)
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive Swagger UI documentation (if enabled)
pub fn create_router(archiver: Arc<PodcastArchiver>, config: Arc<Config>) -> Router {
    let state = AppState::new(archiver, config.clone());

    let management = Router::new()
        .route(
            "/subscriptions/:owner",
            get(routes::list_subscriptions).post(routes::create_subscription),
        )
        .route(
            "/subscriptions/:owner/export",
            get(routes::export_subscriptions),
        )
        .route(
            "/subscriptions/:owner/import",
            post(routes::import_subscriptions),
        )
        .route(
            "/subscriptions/:owner/:id",
            get(routes::get_subscription).delete(routes::delete_subscription),
        )
        .route(
            "/subscriptions/:owner/:id/sync",
            post(routes::sync_subscription),
        )
        .route("/parsers", get(routes::list_parsers))
        .route("/events", get(routes::event_stream));

    // route_layer: only matched management routes are guarded, the public
    // routes merged below are not
    let management = if config.api.api_key.is_some() {
        management.route_layer(middleware::from_fn_with_state(
            config.api.api_key.clone(),
            auth::require_api_key,
        ))
    } else {
        management
    };

    let media_route = format!("/{}/*path", config.storage.media_prefix);
    let router = Router::new()
        .route("/internal/:task", post(routes::invoke_task))
        .route("/podcast/:owner/:id", get(routes::podcast_feed))
        .route(&media_route, get(routes::serve_media))
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec))
        .merge(management);

    // Swagger UI serves its own copy of the document; /openapi.json is taken
    let router = if config.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router.with_state(state).layer(TraceLayer::new_for_http());

    if config.api.cors_enabled {
        let cors = build_cors_layer(&config.api.cors_origins);
        router.layer(cors)
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// `"*"` or an empty list allows any origin; otherwise only the listed
/// origins are allowed. Methods and headers are unrestricted.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address.
///
/// Runs until `shutdown` resolves, then stops accepting connections and
/// lets in-flight requests finish.
///
/// # Example
///
/// ```no_run
/// use podcast_archiver::{Config, PodcastArchiver};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let archiver = Arc::new(PodcastArchiver::new((*config).clone()).await?);
///
/// podcast_archiver::api::start_api_server(archiver, config, async {
///     let _ = tokio::signal::ctrl_c().await;
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(
    archiver: Arc<PodcastArchiver>,
    config: Arc<Config>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let bind_address = config.api.bind_address;

    tracing::info!(address = %bind_address, "Starting API server");

    let app = create_router(archiver, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(address = %bind_address, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
