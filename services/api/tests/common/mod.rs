//! Common test utilities: an app wired to a temp directory and a mock
//! server standing in for both the download host and the Claude API.

#![allow(dead_code)]

use api_lib::{
    adapters::{ClaudeAdapter, JsonFileStore, ScratchDir},
    config::Config,
    web::{api_router, state::AppState},
};
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::MockServer;

pub struct TestApp {
    pub dir: TempDir,
    pub server: MockServer,
    pub config: Arc<Config>,
    router: Router,
}

impl TestApp {
    /// Inline mode with an API key configured.
    pub async fn start() -> Self {
        Self::with_env(&[]).await
    }

    /// Starts the app with extra environment overrides on top of the test defaults.
    pub async fn with_env(overrides: &[(&str, &str)]) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let server = MockServer::start().await;

        let mut vars: HashMap<String, String> = HashMap::new();
        vars.insert(
            "DATABASE_PATH".into(),
            dir.path().join("database.json").display().to_string(),
        );
        vars.insert("TEMP_DIR".into(), dir.path().join("temp").display().to_string());
        vars.insert("CLAUDE_API_KEY".into(), "test-key".into());
        vars.insert("CLAUDE_API_BASE_URL".into(), format!("{}/v1", server.uri()));
        vars.insert("DRIVE_DOWNLOAD_BASE_URL".into(), server.uri());
        for (key, value) in overrides {
            vars.insert(key.to_string(), value.to_string());
        }
        let config = Arc::new(Config::from_lookup(|key| vars.get(key).cloned()).expect("config"));

        let client = reqwest::Client::new();
        let state = Arc::new(AppState {
            store: Arc::new(JsonFileStore::new(config.database_path.clone())),
            artifacts: Arc::new(ScratchDir::new(config.temp_dir.clone(), client.clone())),
            completion: Arc::new(ClaudeAdapter::new(
                client,
                config.claude_api_key.clone(),
                config.claude_api_base_url.clone(),
                config.claude_model.clone(),
            )),
            config: config.clone(),
        });

        Self {
            dir,
            server,
            config,
            router: api_router(state),
        }
    }

    pub fn scratch_file(&self, name: &str) -> PathBuf {
        self.config.temp_dir.join(name)
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        (status, extract_json(response).await)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(get_request(uri)).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(json_request("POST", uri, body)).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(json_request("PUT", uri, body)).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method("DELETE")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Registers a document and returns its id.
    pub async fn create_document(&self, title: &str, url: &str) -> String {
        let (status, body) = self
            .post("/api/documents", json!({ "title": title, "url": url }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_str().unwrap().to_string()
    }
}

/// Extract JSON body from response
pub async fn extract_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

/// A Claude reply carrying the given text blocks.
pub fn claude_reply(texts: &[&str]) -> Value {
    let content: Vec<Value> = texts
        .iter()
        .map(|t| json!({ "type": "text", "text": t }))
        .collect();
    json!({
        "id": "msg_test",
        "type": "message",
        "role": "assistant",
        "content": content,
        "usage": { "input_tokens": 10, "output_tokens": 5 }
    })
}
