//! Published feed handler.

use crate::api::AppState;
use crate::publish::RSS_CONTENT_TYPE;
use crate::types::SubscriptionId;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};

/// GET /podcast/:owner/:id - RSS 2.0 document of a subscription
#[utoipa::path(
    get,
    path = "/podcast/{owner}/{id}",
    tag = "feeds",
    params(
        ("owner" = String, Path, description = "Owner identity"),
        ("id" = i64, Path, description = "Subscription ID")
    ),
    responses(
        (status = 200, description = "RSS 2.0 document", content_type = "application/rss+xml", body = String),
        (status = 404, description = "Subscription not found", body = crate::error::ApiError)
    )
)]
pub async fn podcast_feed(
    State(state): State<AppState>,
    Path((owner, id)): Path<(String, i64)>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    let self_url = self_url(&headers, &uri, &state.config.storage.public_base_url);

    match state
        .archiver
        .render_feed(&owner, SubscriptionId(id), &self_url)
        .await
    {
        Ok(xml) => (StatusCode::OK, [(header::CONTENT_TYPE, RSS_CONTENT_TYPE)], xml).into_response(),
        Err(e) => {
            tracing::debug!(subscription_id = %id, owner = %owner, error = %e, "feed not served");
            e.into_response()
        }
    }
}

/// The URL the feed was requested at.
///
/// Built from the Host header (and `X-Forwarded-Proto` behind a proxy);
/// without a Host header the public base URL stands in.
fn self_url(headers: &HeaderMap, uri: &Uri, public_base_url: &str) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok());

    match host {
        Some(host) => {
            let scheme = headers
                .get("x-forwarded-proto")
                .and_then(|value| value.to_str().ok())
                .unwrap_or("http");
            format!("{}://{}{}", scheme, host, uri.path())
        }
        None => format!("{}{}", public_base_url.trim_end_matches('/'), uri.path()),
    }
}
