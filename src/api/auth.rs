//! Authentication for the REST API
//!
//! Two independent secrets guard the API:
//! - `api.api_key`: the subscription management endpoints require a matching
//!   `X-Api-Key` header when it is set
//! - `tasks.task_api_key`: every `/internal/*` task invocation must carry it
//!   in its form body; when it is unset all task invocations are refused

use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Middleware that checks for a valid API key in the X-Api-Key header
///
/// Returns 401 Unauthorized if the key is missing or does not match, and
/// the response of the next handler otherwise. With no key configured every
/// request passes through.
///
/// # Examples
///
/// ```no_run
/// use axum::{Router, middleware};
/// use podcast_archiver::api::auth::require_api_key;
///
/// let api_key = Some("secret-key-123".to_string());
/// let router: Router = Router::new()
///     .layer(middleware::from_fn_with_state(
///         api_key,
///         require_api_key
///     ));
/// ```
pub async fn require_api_key(
    State(expected_api_key): State<Option<String>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected_key) = expected_api_key else {
        return next.run(request).await;
    };

    let api_key_header = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok());

    match api_key_header {
        Some(provided_key)
            if constant_time_eq(provided_key.as_bytes(), expected_key.as_bytes()) =>
        {
            next.run(request).await
        }
        Some(_) => unauthorized_response("Invalid API key"),
        None => unauthorized_response("Missing X-Api-Key header"),
    }
}

/// Whether a task invocation carries the configured task key.
///
/// An unconfigured key matches nothing.
pub fn task_key_matches(expected: Option<&str>, provided: Option<&str>) -> bool {
    match (expected, provided) {
        (Some(expected), Some(provided)) => {
            constant_time_eq(provided.as_bytes(), expected.as_bytes())
        }
        _ => false,
    }
}

/// Constant-time byte comparison to prevent timing side-channel attacks.
/// Always compares all bytes regardless of where the first mismatch occurs.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// 401 Unauthorized with a JSON error body
pub(crate) fn unauthorized_response(message: &str) -> Response {
    let body = Json(json!({
        "error": {
            "code": "unauthorized",
            "message": message
        }
    }));

    (StatusCode::UNAUTHORIZED, body).into_response()
}
