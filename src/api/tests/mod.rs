use super::*;
use crate::service::test_helpers::{TEST_TASK_KEY, create_test_archiver_with, test_config};
use axum::body::Body;
use axum::extract::Request;
use axum::http::{StatusCode, header};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;


const API_KEY: &str = "management-key";

/// Archiver with default test config, wrapped in Arc
async fn create_test_archiver() -> (Arc<PodcastArchiver>, TempDir) {
    create_test_archiver_configured(|_| {}).await
}

/// Archiver with test config adjusted by `adjust`
async fn create_test_archiver_configured(
    adjust: impl FnOnce(&mut Config),
) -> (Arc<PodcastArchiver>, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&temp_dir);
    adjust(&mut config);
    (Arc::new(create_test_archiver_with(config).await), temp_dir)
}

fn app(archiver: &Arc<PodcastArchiver>) -> Router {
    create_router(archiver.clone(), archiver.get_config())
}

/// Send `request` through a fresh router; returns status, content type and body
async fn send(
    archiver: &Arc<PodcastArchiver>,
    request: Request<Body>,
) -> (StatusCode, Option<String>, Vec<u8>) {
    let response = app(archiver).oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_string());
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, content_type, body.to_vec())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn form_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn api_server_stops_on_shutdown_signal() {
    let (archiver, _temp_dir) = create_test_archiver_configured(|config| {
        config.api.bind_address = "127.0.0.1:0".parse().unwrap(); // Port 0 = OS assigns a free port
    })
    .await;
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(start_api_server(
        archiver.clone(),
        archiver.get_config(),
        async move {
            let _ = stop_rx.await;
        },
    ));

    tokio::time::sleep(Duration::from_millis(100)).await;
    stop_tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn spawned_api_server_follows_archiver_shutdown() {
    let (archiver, _temp_dir) = create_test_archiver_configured(|config| {
        config.api.bind_address = "127.0.0.1:0".parse().unwrap();
    })
    .await;

    let handle = archiver.spawn_api_server();
    tokio::time::sleep(Duration::from_millis(100)).await;
    archiver.shutdown().await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn cors_headers_when_enabled() {
    let (archiver, _temp_dir) = create_test_archiver().await;

    let response = app(&archiver)
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("Origin", "http://localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
}

#[tokio::test]
async fn no_cors_headers_when_disabled() {
    let (archiver, _temp_dir) = create_test_archiver_configured(|config| {
        config.api.cors_enabled = false;
    })
    .await;

    let response = app(&archiver)
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("Origin", "http://localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(
        !response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn unknown_route_is_404() {
    let (archiver, _temp_dir) = create_test_archiver().await;

    let (status, _, _) = send(&archiver, get("/downloads")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
