// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP gateway tests driving the router in-process.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use jobflow_core::{
    ActivityOptions, EmbeddedEngine, JobService, OrchestrationService, ReconcilerConfig,
    RetryPolicy, SumNumbersActivity,
};
use jobflow_server::router;
use serde_json::{Value, json};
use tower::ServiceExt;

async fn test_app() -> (Router, EmbeddedEngine) {
    let engine = EmbeddedEngine::new(
        Arc::new(SumNumbersActivity::new()),
        ActivityOptions::new(RetryPolicy::fixed(3, Duration::from_millis(10)).unwrap()),
    );
    engine.connect().await.unwrap();

    let service = JobService::new(Arc::new(engine.clone()), &ReconcilerConfig::default());
    (router(Arc::new(service)), engine)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_job(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/jobs")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn wait_for_terminal(app: &Router, job_id: &str) -> Value {
    for _ in 0..200 {
        let (status, body) = send(app, get(&format!("/jobs/{}", job_id))).await;
        assert_eq!(status, StatusCode::OK);
        if body["status"] != "RUNNING" {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} did not finish", job_id);
}

#[tokio::test]
async fn test_health() {
    let (app, _) = test_app().await;

    let (status, body) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_submit_and_poll_to_completion() {
    let (app, _) = test_app().await;

    let (status, body) = send(&app, post_job(json!({"input": {"numbers": [1, 2, 3]}}))).await;
    assert_eq!(status, StatusCode::OK);
    let job_id = body["job_id"].as_str().unwrap().to_string();
    assert!(job_id.starts_with("job-"));

    let body = wait_for_terminal(&app, &job_id).await;
    assert_eq!(
        body,
        json!({
            "job_id": job_id,
            "status": "COMPLETED",
            "progress": {"stage": "completed", "attempt": 1},
            "result": 6,
            "error": null,
        })
    );
}

#[tokio::test]
async fn test_fail_first_attempt_option() {
    let (app, _) = test_app().await;

    let (status, body) = send(
        &app,
        post_job(json!({
            "input": {"numbers": [5, 5]},
            "options": {"fail_first_attempt": true}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let body = wait_for_terminal(&app, body["job_id"].as_str().unwrap()).await;
    assert_eq!(body["status"], "COMPLETED");
    assert_eq!(body["progress"]["attempt"], 2);
    assert_eq!(body["result"], 10);
}

#[tokio::test]
async fn test_empty_numbers_is_bad_request() {
    let (app, engine) = test_app().await;

    let (status, body) = send(&app, post_job(json!({"input": {"numbers": []}}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_input");
    assert_eq!(engine.instance_count(), 0);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let (app, engine) = test_app().await;

    let (status, body) = send(&app, post_job(json!({"input": {"numbers": "1,2,3"}}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_input");
    assert_eq!(engine.instance_count(), 0);
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let (app, _) = test_app().await;

    let (status, body) = send(&app, get("/jobs/job-unknown")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_closed_engine_is_service_unavailable() {
    let (app, engine) = test_app().await;
    engine.close().await;

    let (status, body) = send(&app, post_job(json!({"input": {"numbers": [1]}}))).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "engine_unavailable");
}
