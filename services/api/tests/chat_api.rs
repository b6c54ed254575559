//! Chat turns end to end: the mock server plays both the download host and
//! the Claude messages API.

mod common;

use axum::http::StatusCode;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::{claude_reply, TestApp};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Match, Mock, Request, ResponseTemplate};

const FILE_ID: &str = "1AbCdEfGhIjKlMnOpQrStUvWxYz";
const PDF: &[u8] = b"%PDF-1.4\n1 0 obj <<>> endobj\n%%EOF";

fn drive_url() -> String {
    format!("https://drive.google.com/file/d/{}/view?usp=sharing", FILE_ID)
}

/// Matches a messages call whose last turn is the document followed by `question`.
struct InlineTurn {
    question: &'static str,
    data: String,
}

impl Match for InlineTurn {
    fn matches(&self, request: &Request) -> bool {
        let Ok(body) = request.body_json::<Value>() else {
            return false;
        };
        let Some(last) = body["messages"].as_array().and_then(|m| m.last()) else {
            return false;
        };
        let blocks = &last["content"];
        last["role"] == "user"
            && blocks[0]["type"] == "document"
            && blocks[0]["source"]["type"] == "base64"
            && blocks[0]["source"]["media_type"] == "application/pdf"
            && blocks[0]["source"]["data"] == self.data.as_str()
            && blocks[1]["type"] == "text"
            && blocks[1]["text"] == self.question
    }
}

async fn mount_drive(app: &TestApp, expected_downloads: u64) {
    Mock::given(method("GET"))
        .and(path("/uc"))
        .and(query_param("id", FILE_ID))
        .and(query_param("export", "download"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(PDF.to_vec()))
        .expect(expected_downloads)
        .mount(&app.server)
        .await;
}

async fn mount_claude(app: &TestApp, texts: &[&str]) {
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(claude_reply(texts)))
        .mount(&app.server)
        .await;
}

async fn claude_calls(app: &TestApp) -> Vec<Value> {
    app.server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == "/v1/messages")
        .map(|r| r.body_json::<Value>().unwrap())
        .collect()
}

#[tokio::test]
async fn first_inline_turn_downloads_and_attaches_the_document() {
    let app = TestApp::start().await;
    let id = app.create_document("Annual report", &drive_url()).await;
    mount_drive(&app, 1).await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(InlineTurn {
            question: "О чём этот документ?",
            data: STANDARD.encode(PDF),
        })
        .respond_with(
            ResponseTemplate::new(200).set_body_json(claude_reply(&["Краткое", "содержание"])),
        )
        .expect(1)
        .mount(&app.server)
        .await;

    let (status, body) = app
        .post(
            "/api/chat",
            json!({ "message": "О чём этот документ?", "documentIds": [id] }),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["response"], "Краткое\nсодержание");
    assert_eq!(
        std::fs::read(app.scratch_file(&format!("{}.pdf", FILE_ID))).unwrap(),
        PDF
    );

    let calls = claude_calls(&app).await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0]["messages"].as_array().unwrap().len(), 1);
    assert_eq!(calls[0]["temperature"], 0.3);
    assert_eq!(calls[0]["max_tokens"], 4000);
    assert_eq!(calls[0]["model"], "claude-3-haiku-20240307");
}

#[tokio::test]
async fn follow_up_turn_reuses_the_copy_and_keeps_history_as_text() {
    let app = TestApp::start().await;
    let id = app.create_document("Annual report", &drive_url()).await;
    mount_drive(&app, 1).await;
    mount_claude(&app, &["ответ"]).await;

    let (status, _) = app
        .post("/api/chat", json!({ "message": "first", "documentIds": [id] }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .post(
            "/api/chat",
            json!({
                "message": "second",
                "documentIds": [id],
                "model": "claude-3-5-sonnet-20241022",
                "chatHistory": [
                    { "role": "user", "content": "first", "timestamp": "2024-05-01T10:00:00Z" },
                    { "role": "assistant", "content": "ответ" }
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let calls = claude_calls(&app).await;
    let messages = calls[1]["messages"].as_array().unwrap();
    assert_eq!(calls[1]["model"], "claude-3-5-sonnet-20241022");
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0], json!({ "role": "user", "content": "first" }));
    assert_eq!(messages[1], json!({ "role": "assistant", "content": "ответ" }));
    assert_eq!(messages[2]["content"][0]["type"], "document");
    assert_eq!(messages[2]["content"][1]["text"], "second");
}

#[tokio::test]
async fn document_path_uses_an_existing_scratch_file() {
    let app = TestApp::start().await;
    std::fs::create_dir_all(&app.config.temp_dir).unwrap();
    std::fs::write(app.scratch_file("uploaded.pdf"), PDF).unwrap();
    mount_claude(&app, &["ok"]).await;

    let (status, body) = app
        .post(
            "/api/chat",
            json!({ "message": "hi", "relativeDocumentPath": "temp/uploaded.pdf" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let calls = claude_calls(&app).await;
    assert_eq!(
        calls[0]["messages"][0]["content"][0]["source"]["data"],
        STANDARD.encode(PDF)
    );

    let (status, _) = app
        .post("/api/chat", json!({ "message": "hi", "documentPath": "temp/missing.pdf" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn url_mode_sends_long_instructions_once() {
    let app = TestApp::with_env(&[("CHAT_MODE", "url")]).await;
    let a = app.create_document("Alpha", "https://example.com/alpha.pdf").await;
    let b = app.create_document("Beta", "https://example.com/beta.pdf").await;
    mount_claude(&app, &["ok"]).await;

    let (status, _) = app
        .post("/api/chat", json!({ "message": "compare", "documentIds": [a, b] }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .post(
            "/api/chat",
            json!({
                "message": "more",
                "documentIds": [a, b],
                "chatHistory": [
                    { "role": "user", "content": "compare" },
                    { "role": "assistant", "content": "ok" }
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let calls = claude_calls(&app).await;
    let first = calls[0]["system"].as_str().unwrap();
    assert!(first.contains("1. **Alpha**: https://example.com/alpha.pdf"));
    assert!(first.contains("2. **Beta**: https://example.com/beta.pdf"));
    assert!(first.contains("## Инструкции по анализу:"));
    assert_eq!(calls[0]["messages"], json!([{ "role": "user", "content": "compare" }]));

    let second = calls[1]["system"].as_str().unwrap();
    assert!(second.starts_with("Вы помогаете анализировать документы"));
    assert!(!second.contains("## Инструкции по анализу:"));
    assert_eq!(calls[1]["messages"].as_array().unwrap().len(), 3);

    // No download happens in url mode.
    assert!(!app.config.temp_dir.exists());
}

#[tokio::test]
async fn missing_api_key_is_a_configuration_error() {
    let app = TestApp::with_env(&[("CLAUDE_API_KEY", "")]).await;
    std::fs::create_dir_all(&app.config.temp_dir).unwrap();
    std::fs::write(app.scratch_file("doc.pdf"), PDF).unwrap();

    let (status, body) = app
        .post("/api/chat", json!({ "message": "hi", "documentPath": "temp/doc.pdf" }))
        .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["kind"], "CONFIGURATION_ERROR");
    assert!(claude_calls(&app).await.is_empty());
}

#[tokio::test]
async fn provider_failures_are_classified() {
    let app = TestApp::start().await;
    std::fs::create_dir_all(&app.config.temp_dir).unwrap();
    std::fs::write(app.scratch_file("doc.pdf"), PDF).unwrap();
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "type": "error",
            "error": { "type": "rate_limit_error", "message": "slow down" }
        })))
        .mount(&app.server)
        .await;

    let (status, body) = app
        .post("/api/chat", json!({ "message": "hi", "documentPath": "temp/doc.pdf" }))
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "RATE_LIMIT_ERROR");
    assert_eq!(body["error"], "Превышен лимит запросов к ИИ. Попробуйте через минуту.");
}

#[tokio::test]
async fn oversized_document_maps_to_document_too_large() {
    let app = TestApp::start().await;
    std::fs::create_dir_all(&app.config.temp_dir).unwrap();
    std::fs::write(app.scratch_file("doc.pdf"), PDF).unwrap();
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "type": "error",
            "error": { "type": "invalid_request_error", "message": "prompt is too long: 250000 tokens > 200000 maximum" }
        })))
        .mount(&app.server)
        .await;

    let (status, body) = app
        .post("/api/chat", json!({ "message": "hi", "documentPath": "temp/doc.pdf" }))
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "DOCUMENT_TOO_LARGE_ERROR");
}

#[tokio::test]
async fn failed_download_is_retried_on_the_next_turn() {
    let app = TestApp::start().await;
    let id = app.create_document("Private", &drive_url()).await;
    Mock::given(method("GET"))
        .and(path("/uc"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&app.server)
        .await;

    for _ in 0..2 {
        let (status, _) = app
            .post("/api/chat", json!({ "message": "hi", "documentIds": [id] }))
            .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }
    assert!(!app.scratch_file(&format!("{}.pdf", FILE_ID)).exists());
    assert!(claude_calls(&app).await.is_empty());
}

#[tokio::test]
async fn exhausted_budget_skips_the_provider_call() {
    let app = TestApp::with_env(&[("CHAT_BUDGET_SECS", "0")]).await;
    std::fs::create_dir_all(&app.config.temp_dir).unwrap();
    std::fs::write(app.scratch_file("doc.pdf"), PDF).unwrap();
    mount_claude(&app, &["never"]).await;

    let (status, body) = app
        .post("/api/chat", json!({ "message": "hi", "documentPath": "temp/doc.pdf" }))
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "TIMEOUT_ERROR");
    assert!(claude_calls(&app).await.is_empty());
}

#[tokio::test]
async fn invalid_chat_requests() {
    let app = TestApp::start().await;
    let no_id = app.create_document("Plain", "https://example.com/a.pdf").await;

    let (status, _) = app
        .post("/api/chat", json!({ "message": "  ", "documentIds": [no_id] }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.post("/api/chat", json!({ "message": "hi" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post("/api/chat", json!({ "message": "hi", "documentIds": ["missing"] }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .post("/api/chat", json!({ "message": "hi", "documentIds": [no_id] }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/chat",
            json!({ "message": "hi", "documentIds": [no_id], "mode": "carrier-pigeon" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reset_deletes_the_local_copy() {
    let app = TestApp::start().await;
    let id = app.create_document("Annual report", &drive_url()).await;
    mount_drive(&app, 2).await;
    mount_claude(&app, &["ok"]).await;

    app.post("/api/chat", json!({ "message": "hi", "documentIds": [id] }))
        .await;
    let copy = app.scratch_file(&format!("{}.pdf", FILE_ID));
    assert!(copy.exists());

    let (status, body) = app.post("/api/chat/reset", json!({ "documentId": id })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);
    assert!(!copy.exists());

    let (_, body) = app.post("/api/chat/reset", json!({ "documentId": id })).await;
    assert_eq!(body["deleted"], false);

    // The next turn starts over with a fresh download.
    let (status, _) = app
        .post("/api/chat", json!({ "message": "again", "documentIds": [id] }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(copy.exists());

    let (status, _) = app.post("/api/chat/reset", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn switching_or_closing_drops_the_copy() {
    let app = TestApp::start().await;
    let id = app.create_document("Annual report", &drive_url()).await;
    mount_drive(&app, 2).await;
    mount_claude(&app, &["ok"]).await;
    let copy = app.scratch_file(&format!("{}.pdf", FILE_ID));

    app.post("/api/chat", json!({ "message": "hi", "documentIds": [id] }))
        .await;
    let (status, body) = app
        .post(
            "/api/chat/reset",
            json!({ "documentId": id, "reason": "switch", "nextDocumentId": id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], false);
    assert!(copy.exists());

    let (_, body) = app
        .post(
            "/api/chat/reset",
            json!({ "documentId": id, "reason": "switch", "nextDocumentId": "other" }),
        )
        .await;
    assert_eq!(body["deleted"], true);
    assert!(!copy.exists());

    app.post("/api/chat", json!({ "message": "hi", "documentIds": [id] }))
        .await;
    let (_, body) = app
        .post("/api/chat/reset", json!({ "documentId": id, "reason": "close" }))
        .await;
    assert_eq!(body["deleted"], true);
    assert!(!copy.exists());

    let (status, _) = app
        .post("/api/chat/reset", json!({ "documentId": id, "reason": "switch" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn inline_mode_takes_a_single_document() {
    let app = TestApp::start().await;
    let a = app.create_document("Alpha", &drive_url()).await;
    let b = app.create_document("Beta", "https://example.com/beta.pdf").await;

    let (status, body) = app
        .post("/api/chat", json!({ "message": "hi", "documentIds": [a, b] }))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Inline mode takes exactly one document; use url mode for several"
    );
    assert!(claude_calls(&app).await.is_empty());
}
