//! Subscription management handlers.

use super::{ImportResponse, ParserInfo, SyncAcceptedResponse};
use crate::api::AppState;
use crate::portability::SubscriptionRecord;
use crate::tasks::Task;
use crate::types::SubscriptionId;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// GET /subscriptions/:owner - List subscriptions of an owner
#[utoipa::path(
    get,
    path = "/subscriptions/{owner}",
    tag = "subscriptions",
    params(
        ("owner" = String, Path, description = "Owner identity")
    ),
    responses(
        (status = 200, description = "Subscriptions with their feeds", body = Vec<crate::types::Subscription>),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn list_subscriptions(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Response {
    match state.archiver.list_subscriptions(&owner).await {
        Ok(subscriptions) => (StatusCode::OK, Json(subscriptions)).into_response(),
        Err(e) => {
            tracing::error!(owner = %owner, error = %e, "Failed to list subscriptions");
            e.into_response()
        }
    }
}

/// POST /subscriptions/:owner - Create a subscription
#[utoipa::path(
    post,
    path = "/subscriptions/{owner}",
    tag = "subscriptions",
    params(
        ("owner" = String, Path, description = "Owner identity")
    ),
    request_body = SubscriptionRecord,
    responses(
        (status = 201, description = "Subscription created", body = crate::types::Subscription),
        (status = 400, description = "Invalid record (unknown parser, too many sources, empty title)", body = crate::error::ApiError)
    )
)]
pub async fn create_subscription(
    State(state): State<AppState>,
    Path(owner): Path<String>,
    Json(record): Json<SubscriptionRecord>,
) -> Response {
    match state.archiver.add_subscription(&owner, record).await {
        Ok(subscription) => (StatusCode::CREATED, Json(subscription)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /subscriptions/:owner/:id - Get a subscription with its feed
#[utoipa::path(
    get,
    path = "/subscriptions/{owner}/{id}",
    tag = "subscriptions",
    params(
        ("owner" = String, Path, description = "Owner identity"),
        ("id" = i64, Path, description = "Subscription ID")
    ),
    responses(
        (status = 200, description = "Subscription", body = crate::types::Subscription),
        (status = 404, description = "Subscription not found", body = crate::error::ApiError)
    )
)]
pub async fn get_subscription(
    State(state): State<AppState>,
    Path((owner, id)): Path<(String, i64)>,
) -> Response {
    match state
        .archiver
        .get_subscription(&owner, SubscriptionId(id))
        .await
    {
        Ok(subscription) => (StatusCode::OK, Json(subscription)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// DELETE /subscriptions/:owner/:id - Delete a subscription and its stored media
#[utoipa::path(
    delete,
    path = "/subscriptions/{owner}/{id}",
    tag = "subscriptions",
    params(
        ("owner" = String, Path, description = "Owner identity"),
        ("id" = i64, Path, description = "Subscription ID")
    ),
    responses(
        (status = 204, description = "Subscription deleted"),
        (status = 404, description = "Subscription not found", body = crate::error::ApiError)
    )
)]
pub async fn delete_subscription(
    State(state): State<AppState>,
    Path((owner, id)): Path<(String, i64)>,
) -> Response {
    match state
        .archiver
        .delete_subscription(&owner, SubscriptionId(id))
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /subscriptions/:owner/:id/sync - Queue a sync of one subscription now
#[utoipa::path(
    post,
    path = "/subscriptions/{owner}/{id}/sync",
    tag = "subscriptions",
    params(
        ("owner" = String, Path, description = "Owner identity"),
        ("id" = i64, Path, description = "Subscription ID")
    ),
    responses(
        (status = 202, description = "Sync queued", body = SyncAcceptedResponse),
        (status = 404, description = "Subscription not found", body = crate::error::ApiError),
        (status = 503, description = "Shutting down", body = crate::error::ApiError)
    )
)]
pub async fn sync_subscription(
    State(state): State<AppState>,
    Path((owner, id)): Path<(String, i64)>,
) -> Response {
    let id = SubscriptionId(id);
    if let Err(e) = state.archiver.get_subscription(&owner, id).await {
        return e.into_response();
    }

    let task = Task::SyncSubscription { owner, id };
    match state.archiver.submit_task(task.clone()).await {
        Ok(()) => (StatusCode::ACCEPTED, Json(SyncAcceptedResponse { task })).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /subscriptions/:owner/export - Export subscriptions in portable form
#[utoipa::path(
    get,
    path = "/subscriptions/{owner}/export",
    tag = "subscriptions",
    params(
        ("owner" = String, Path, description = "Owner identity")
    ),
    responses(
        (status = 200, description = "Portable subscription records", body = Vec<SubscriptionRecord>),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn export_subscriptions(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Response {
    match state.archiver.export_subscriptions(&owner).await {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /subscriptions/:owner/import - Import portable subscription records
///
/// All records are validated before any is created.
#[utoipa::path(
    post,
    path = "/subscriptions/{owner}/import",
    tag = "subscriptions",
    params(
        ("owner" = String, Path, description = "Owner identity")
    ),
    request_body = Vec<SubscriptionRecord>,
    responses(
        (status = 201, description = "Subscriptions created", body = ImportResponse),
        (status = 400, description = "A record is invalid; nothing was imported", body = crate::error::ApiError)
    )
)]
pub async fn import_subscriptions(
    State(state): State<AppState>,
    Path(owner): Path<String>,
    Json(records): Json<Vec<SubscriptionRecord>>,
) -> Response {
    match state.archiver.import_subscriptions(&owner, records).await {
        Ok(ids) => (StatusCode::CREATED, Json(ImportResponse { ids })).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /parsers - Registered source types
#[utoipa::path(
    get,
    path = "/parsers",
    tag = "subscriptions",
    responses(
        (status = 200, description = "Source types, sorted by name", body = Vec<ParserInfo>)
    )
)]
pub async fn list_parsers(State(state): State<AppState>) -> impl IntoResponse {
    let parsers: Vec<ParserInfo> = state
        .archiver
        .registry()
        .types()
        .map(|t| ParserInfo {
            name: t.name.clone(),
            display_name: t.display_name.clone(),
        })
        .collect();
    (StatusCode::OK, Json(parsers))
}
