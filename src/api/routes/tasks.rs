//! Task invocation handlers.

use crate::api::AppState;
use crate::api::auth::{task_key_matches, unauthorized_response};
use crate::tasks::{Task, TaskForm};
use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// POST /internal/:task - Run one step of the task chain
///
/// The task is accepted for background execution; continuations are handed
/// to the configured dispatcher when it finishes.
#[utoipa::path(
    post,
    path = "/internal/{task}",
    tag = "tasks",
    params(
        ("task" = String, Path, description = "Task endpoint: start-cycle, queue-owners, queue-subscriptions, sync-subscription or archive-subscription")
    ),
    request_body(content = TaskForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Task accepted", body = String),
        (status = 400, description = "Missing owner or id", body = crate::error::ApiError),
        (status = 401, description = "Missing or wrong task key"),
        (status = 404, description = "Unknown task endpoint", body = crate::error::ApiError),
        (status = 503, description = "Shutting down", body = crate::error::ApiError)
    )
)]
pub async fn invoke_task(
    State(state): State<AppState>,
    Path(endpoint): Path<String>,
    Form(form): Form<TaskForm>,
) -> Response {
    let expected = state.config.tasks.task_api_key.as_deref();
    if !task_key_matches(expected, form.api_key.as_deref()) {
        tracing::warn!(endpoint = %endpoint, "task invocation with invalid key");
        return unauthorized_response("Invalid task key");
    }

    let task = match Task::from_form(&endpoint, &form) {
        Ok(task) => task,
        Err(e) => return e.into_response(),
    };

    tracing::debug!(task = %task, "task invoked");
    match state.archiver.submit_task(task).await {
        Ok(()) => (StatusCode::OK, "Ok").into_response(),
        Err(e) => e.into_response(),
    }
}
