//! Error body rendering: `details` only outside production.

mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn development_errors_include_details() {
    let app = TestApp::start().await;

    let (status, body) = app.post("/api/chat", json!({ "message": "hi" })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Document path or document IDs are required");
    assert!(body["details"].as_str().unwrap().contains("Invalid request"));
}

#[tokio::test]
async fn production_errors_hide_details() {
    let app = TestApp::with_env(&[("APP_ENV", "production")]).await;

    let (status, body) = app.post("/api/chat", json!({ "message": "hi" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Document path or document IDs are required");
    assert!(body.get("details").is_none(), "{}", body);

    let (status, body) = app.delete("/api/documents/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.get("details").is_none(), "{}", body);
}

#[tokio::test]
async fn production_keeps_the_error_kind() {
    let app = TestApp::with_env(&[("APP_ENV", "production"), ("CLAUDE_API_KEY", "")]).await;
    std::fs::create_dir_all(&app.config.temp_dir).unwrap();
    std::fs::write(app.scratch_file("doc.pdf"), b"%PDF").unwrap();

    let (status, body) = app
        .post("/api/chat", json!({ "message": "hi", "documentPath": "temp/doc.pdf" }))
        .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["kind"], "CONFIGURATION_ERROR");
    assert!(body.get("details").is_none());
}
