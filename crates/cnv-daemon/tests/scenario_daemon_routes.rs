//! In-process router tests via `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tokio::sync::mpsc;
use tower::ServiceExt;

use cnv_daemon::routes::build_router;
use cnv_daemon::AppState;
use cnv_model::RepositoryEvent;

fn state_with_queue(capacity: usize) -> (Arc<AppState>, mpsc::Receiver<RepositoryEvent>) {
    let (tx, rx) = mpsc::channel(capacity);
    let state = AppState::new("conveyor/test".into(), "cafe1234".into(), tx);
    (state, rx)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn healthz_reports_service_identity() {
    let (state, _rx) = state_with_queue(8);
    let app = build_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["service"], "conveyor");
}

#[tokio::test]
async fn status_carries_config_hash_and_counters() {
    let (state, _rx) = state_with_queue(8);
    let app = build_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["config_hash"], "cafe1234");
    assert_eq!(body["events_accepted"], 0);
    assert_eq!(body["events_dropped_self"], 0);
}

#[tokio::test]
async fn malformed_event_envelope_is_unprocessable() {
    let (state, _rx) = state_with_queue(8);
    let app = build_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/events")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"entityType": "Submission"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
