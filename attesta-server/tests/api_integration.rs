//! API integration tests for attesta-server.
//!
//! These tests drive the router with real HTTP requests: ledger create/list/get,
//! the refusal of every update and delete, auto-audit on attachment upload,
//! capture field validation on owning records, and caller authentication.

use std::time::{SystemTime, UNIX_EPOCH};

use attesta_server::{create_router_with_state, AppState, Config};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Map, Value};
use tower::ServiceExt;

/// Helper to create a multipart body with a single file part
fn create_upload_multipart(content: &[u8], filename: &str, mime: &str) -> (String, Vec<u8>) {
    let boundary = "----TestBoundary7MA4YWxkTrZu0gW";
    let mut body = Vec::new();

    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", mime).as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(b"\r\n");

    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

    (format!("multipart/form-data; boundary={}", boundary), body)
}

/// Build the test app, keeping the state for storage-level assertions
fn create_test_app_with(config: Config) -> (Router, AppState) {
    let state = AppState::in_memory(&config);
    (create_router_with_state(state.clone(), &config), state)
}

fn create_test_app() -> (Router, AppState) {
    create_test_app_with(Config::default())
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, json)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn lot_entry() -> Value {
    json!({
        "attachmentId": 999,
        "capturedAt": "2026-02-17T10:00:00Z",
        "capturedByName": "Test User",
        "barcode": "LOT-2026-A001",
        "imageHash": "abc123",
        "captureIndex": 1
    })
}

// ============================================================================
// Health & Readiness Tests
// ============================================================================

#[tokio::test]
async fn test_health_reports_memory_ledger() {
    let (app, _) = create_test_app();

    let (status, json) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["ledger_persistent"], false);
    assert_eq!(json["service"], "attesta-server");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_ready_endpoint_returns_ok() {
    let (app, _) = create_test_app();

    let (status, json) = send(&app, get("/ready")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ready"], true);
}

// ============================================================================
// Audit Ledger Tests
// ============================================================================

#[tokio::test]
async fn test_create_fills_server_timestamp() {
    let (app, _) = create_test_app();

    let (status, created) = send(
        &app,
        json_request("POST", "/api/capture-audit", lot_entry()),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(created["id"].as_i64().is_some());
    assert_eq!(created["attachmentId"], 999);
    assert_eq!(created["barcode"], "LOT-2026-A001");
    assert_eq!(created["imageHash"], "abc123");
    assert_eq!(created["captureIndex"], 1);
    assert_eq!(created["action"], "CAPTURE");
    assert_eq!(created["metadata"], json!({}));
    assert!(!created["serverTimestamp"].as_str().unwrap().is_empty());

    let id = created["id"].as_i64().unwrap();
    let (status, fetched) = send(&app, get(&format!("/api/capture-audit/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn test_list_pages_filters_and_meta() {
    let (app, _) = create_test_app();

    for i in 1..=3 {
        let mut entry = lot_entry();
        entry["captureIndex"] = json!(i);
        entry["attachmentId"] = json!(1000 + i);
        send(&app, json_request("POST", "/api/capture-audit", entry)).await;
    }

    let (status, page) = send(&app, get("/api/capture-audit?pageSize=2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["data"].as_array().unwrap().len(), 2);
    assert_eq!(
        page["meta"],
        json!({"count": 3, "page": 1, "pageSize": 2, "totalPage": 2})
    );

    let (_, page) = send(&app, get("/api/capture-audit?sort=captureIndex")).await;
    let indexes: Vec<_> = page["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["captureIndex"].as_i64().unwrap())
        .collect();
    assert_eq!(indexes, vec![1, 2, 3]);

    let (_, page) = send(&app, get("/api/capture-audit?attachmentId=1002")).await;
    assert_eq!(page["meta"]["count"], 1);
    assert_eq!(page["data"][0]["captureIndex"], 2);

    let (status, _) = send(&app, get("/api/capture-audit?sort=imageHash")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_unknown_entry_is_404() {
    let (app, _) = create_test_app();

    let (status, json) = send(&app, get("/api/capture-audit/4242")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_update_and_delete_are_compliance_violations() {
    let (app, _) = create_test_app();
    let (_, created) = send(
        &app,
        json_request("POST", "/api/capture-audit", lot_entry()),
    )
    .await;
    let uri = format!("/api/capture-audit/{}", created["id"]);

    for method in ["PUT", "PATCH"] {
        let (status, json) = send(
            &app,
            json_request(method, &uri, json!({"imageHash": "tampered"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{method}");
        assert_eq!(json["code"], "COMPLIANCE_VIOLATION");
        assert!(json["error"]
            .as_str()
            .unwrap()
            .starts_with("21 CFR Part 11 compliance violation"));
    }

    let (status, json) = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri(&uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "COMPLIANCE_VIOLATION");

    let (_, fetched) = send(&app, get(&uri)).await;
    assert_eq!(fetched["imageHash"], "abc123");
}

#[tokio::test]
async fn test_storage_layer_refuses_direct_writes() {
    let (app, state) = create_test_app();
    let (_, created) = send(
        &app,
        json_request("POST", "/api/capture-audit", lot_entry()),
    )
    .await;
    let id = created["id"].as_i64().unwrap();

    let mut changes = Map::new();
    changes.insert("imageHash".into(), json!("tampered"));
    let err = state.ledger.update(id, changes).await.unwrap_err();
    assert!(err.to_string().contains("[imageHash]"));

    let err = state.ledger.delete(id).await.unwrap_err();
    assert!(err
        .to_string()
        .starts_with("21 CFR Part 11 compliance violation"));

    let entry = state.ledger.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(entry.image_hash.as_deref(), Some("abc123"));
}

// ============================================================================
// Attachment & Auto-Audit Tests
// ============================================================================

#[tokio::test]
async fn test_capture_upload_creates_auto_audit_entry() {
    let (app, _) = create_test_app();
    let content = b"\xFF\xD8\xFF\xE0 jpeg bytes";
    let (content_type, body) =
        create_upload_multipart(content, "capture_1771322400000_1.jpg", "image/jpeg");

    let (status, stored) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/attachments")
            .header("Content-Type", content_type)
            .body(Body::from(body))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(stored["filename"], "capture_1771322400000_1.jpg");
    let attachment_id = stored["id"].as_i64().unwrap();

    let (_, page) = send(
        &app,
        get(&format!("/api/capture-audit?attachmentId={attachment_id}")),
    )
    .await;
    assert_eq!(page["meta"]["count"], 1);
    let entry = &page["data"][0];
    assert_eq!(entry["action"], "CAPTURE_AUTO");
    assert_eq!(entry["capturedByName"], "System (auto-audit)");
    assert_eq!(entry["metadata"]["autoCreated"], true);
    assert_eq!(entry["metadata"]["size"], content.len());

    let response = app
        .clone()
        .oneshot(get(&format!("/api/attachments/{attachment_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/jpeg");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], content);
}

#[tokio::test]
async fn test_non_capture_upload_is_not_audited() {
    let (app, _) = create_test_app();
    let (content_type, body) = create_upload_multipart(b"%PDF-1.7", "report.pdf", "application/pdf");

    let (status, _) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/attachments")
            .header("Content-Type", content_type)
            .body(Body::from(body))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, page) = send(&app, get("/api/capture-audit")).await;
    assert_eq!(page["meta"]["count"], 0);
}

#[tokio::test]
async fn test_upload_rejects_unsupported_type() {
    let (app, _) = create_test_app();
    let (content_type, body) = create_upload_multipart(b"<html>", "capture_1_1.html", "text/html");

    let (status, json) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/attachments")
            .header("Content-Type", content_type)
            .body(Body::from(body))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_INPUT");
}

// ============================================================================
// Capture Field Tests
// ============================================================================

fn captures(n: usize) -> Value {
    Value::Array(
        (1..=n)
            .map(|i| {
                json!({
                    "url": format!("/api/attachments/{i}"),
                    "meta": {"timestamp": "2026-02-17T10:00:00Z", "captureIndex": i}
                })
            })
            .collect(),
    )
}

#[tokio::test]
async fn test_capture_field_limits_on_save() {
    let (app, _) = create_test_app_with(Config {
        capture_fields: vec![("inspections".into(), "photos".into())],
        default_max_captures: 2,
        ..Default::default()
    });

    let (status, record) = send(
        &app,
        json_request("POST", "/api/records/inspections", json!({"photos": captures(2)})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = record["id"].as_i64().unwrap();

    let (status, json) = send(
        &app,
        json_request(
            "PATCH",
            &format!("/api/records/inspections/{id}"),
            json!({"photos": captures(3)}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(
        json["error"],
        "capture field \"photos\": maximum 2 captures allowed, got 3"
    );

    let (_, stored) = send(&app, get(&format!("/api/records/inspections/{id}"))).await;
    assert_eq!(stored["photos"].as_array().unwrap().len(), 2);
}

// ============================================================================
// Authentication Tests
// ============================================================================

fn token(secret: &str, sub: i64, nickname: &str) -> String {
    let exp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
        + 600;
    encode(
        &Header::default(),
        &json!({"sub": sub, "nickname": nickname, "exp": exp}),
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

#[tokio::test]
async fn test_auth_required_when_configured() {
    let (app, _) = create_test_app_with(Config {
        jwt_secret: Some("integration-secret".into()),
        ..Default::default()
    });

    let (status, json) = send(&app, get("/api/capture-audit")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "AUTH_MISSING_TOKEN");

    let request = Request::builder()
        .method("POST")
        .uri("/api/capture-audit")
        .header("Content-Type", "application/json")
        .header(
            "Authorization",
            format!("Bearer {}", token("integration-secret", 12, "QA Inspector")),
        )
        .body(Body::from(json!({"imageHash": "abc123"}).to_string()))
        .unwrap();
    let (status, created) = send(&app, request).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["capturedById"], 12);
    assert_eq!(created["capturedByName"], "QA Inspector");

    let request = Request::builder()
        .uri("/api/capture-audit")
        .header(
            "Authorization",
            format!("Bearer {}", token("wrong-secret", 12, "QA")),
        )
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "AUTH_INVALID_TOKEN");
}

// ============================================================================
// OpenAPI Tests
// ============================================================================

#[tokio::test]
async fn test_openapi_spec_endpoint() {
    let (app, _) = create_test_app();

    let (status, json) = send(&app, get("/api-docs/openapi.json")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["info"]["title"], "Attesta - Capture Audit API");
    assert!(json["paths"]["/api/capture-audit"].is_object());
}
