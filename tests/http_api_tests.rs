//! HTTP API tests
//!
//! Drives the axum router in-process with `tower::ServiceExt::oneshot`.

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use bookgate::config::{AppConfig, CorsMode};
use bookgate::error::http_mapper::ErrorResponse;
use bookgate::gateway::AccessGateway;
use bookgate::transport::{AppState, router};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> Router {
    let config = AppConfig::default();
    let gateway = Arc::new(AccessGateway::from_config(&config).unwrap());
    let state = AppState::new(gateway, config.session.clone(), (&config.server).into());
    router(state, CorsMode::Disabled)
}

fn request(
    method: &str,
    uri: &str,
    user: Option<(&str, &str)>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((user_id, role)) = user {
        builder = builder.header("x-user-id", user_id).header("x-user-role", role);
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

const READER: Option<(&str, &str)> = Some(("u1", "reader"));
const LIBRARIAN: Option<(&str, &str)> = Some(("lib1", "librarian"));

async fn submit(app: &Router) -> String {
    let (status, body) = send(
        app,
        request(
            "POST",
            "/api/book-access/request",
            READER,
            Some(json!({"bookId": "b1", "reason": "coursework"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

fn error_code(body: &Value) -> String {
    let error: ErrorResponse = serde_json::from_value(body.clone()).unwrap();
    error.code
}

// ============================================================================
// Health and identity
// ============================================================================

#[tokio::test]
async fn test_health() {
    let app = app();
    let (status, body) = send(&app, request("GET", "/health", None, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["name"], "bookgate");
}

#[tokio::test]
async fn test_missing_identity_is_unauthorized() {
    let app = app();
    let (status, body) = send(&app, request("GET", "/api/notifications", None, None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "UNAUTHENTICATED");
}

#[tokio::test]
async fn test_unknown_role_is_bad_request() {
    let app = app();
    let (status, body) = send(
        &app,
        request("GET", "/api/notifications", Some(("u1", "janitor")), None),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "INVALID_IDENTITY");
}

// ============================================================================
// Request lifecycle
// ============================================================================

#[tokio::test]
async fn test_full_approval_flow() {
    let app = app();

    let (_, body) = send(&app, request("GET", "/api/books/b1/access", READER, None)).await;
    assert_eq!(body["decision"], "SHOW_REQUEST_FORM");

    let id = submit(&app).await;

    let (status, body) = send(
        &app,
        request("GET", "/api/book-access/requests", LIBRARIAN, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["status"], "PENDING");
    assert_eq!(body[0]["userId"], "u1");

    let (status, body) = send(
        &app,
        request(
            "POST",
            &format!("/api/book-access/process/{}", id),
            LIBRARIAN,
            Some(json!({"approved": true})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "APPROVED");
    assert_eq!(body["resolvedBy"], "lib1");

    let (_, body) = send(&app, request("GET", "/api/books/b1/access", READER, None)).await;
    assert_eq!(body["decision"], "PROCEED_TO_READ");

    let (_, body) = send(
        &app,
        request("GET", "/api/book-access/check/u1/b1", READER, None),
    )
    .await;
    assert_eq!(body["hasAccess"], true);

    let (_, body) = send(
        &app,
        request("GET", "/api/notifications/unread-count", READER, None),
    )
    .await;
    assert_eq!(body["count"], 1);

    let (_, body) = send(&app, request("GET", "/api/notifications", READER, None)).await;
    assert_eq!(body[0]["type"], "APPROVAL");
    assert_eq!(body[0]["isRead"], false);
    assert_eq!(body[0]["related"]["bookId"], "b1");
    let notification_id = body[0]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        request(
            "POST",
            &format!("/api/notifications/{}/read", notification_id),
            READER,
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isRead"], true);

    let (_, body) = send(
        &app,
        request("GET", "/api/notifications?unread=true", READER, None),
    )
    .await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_submission_conflicts() {
    let app = app();
    submit(&app).await;

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/book-access/request",
            READER,
            Some(json!({"bookId": "b1", "reason": "again"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "DUPLICATE_REQUEST");
}

#[tokio::test]
async fn test_blank_reason_is_validation_error() {
    let app = app();
    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/book-access/request",
            READER,
            Some(json!({"bookId": "b1", "reason": "  "})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_rejection_without_reason() {
    let app = app();
    let id = submit(&app).await;

    let (status, body) = send(
        &app,
        request(
            "POST",
            &format!("/api/book-access/process/{}", id),
            LIBRARIAN,
            Some(json!({"approved": false, "rejectionReason": ""})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");

    let (status, body) = send(
        &app,
        request(
            "POST",
            &format!("/api/book-access/process/{}", id),
            LIBRARIAN,
            Some(json!({"approved": false, "rejectionReason": "out of stock"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "REJECTED");
    assert_eq!(body["rejectionReason"], "out of stock");

    let (status, body) = send(
        &app,
        request(
            "POST",
            &format!("/api/book-access/process/{}", id),
            LIBRARIAN,
            Some(json!({"approved": true})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "ALREADY_RESOLVED");
}

#[tokio::test]
async fn test_reader_cannot_process() {
    let app = app();
    let id = submit(&app).await;

    let (status, body) = send(
        &app,
        request(
            "POST",
            &format!("/api/book-access/process/{}", id),
            READER,
            Some(json!({"approved": true})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "FORBIDDEN");
}

#[tokio::test]
async fn test_malformed_ids_and_bodies() {
    let app = app();

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/book-access/process/not-a-uuid",
            LIBRARIAN,
            Some(json!({"approved": true})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "BAD_REQUEST");

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/book-access/request",
            READER,
            Some(json!({"reason": "no book"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "BAD_REQUEST");

    let (status, _) = send(
        &app,
        request(
            "POST",
            &format!("/api/book-access/process/{}", uuid::Uuid::new_v4()),
            LIBRARIAN,
            Some(json!({"approved": true})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_endpoint_counts_calls() {
    let app = app();
    submit(&app).await;
    send(&app, request("GET", "/api/book-access/requests", READER, None)).await;

    let (status, body) = send(&app, request("GET", "/api/metrics", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalCalls"], 2);
    assert_eq!(body["totalErrors"], 1);
}
