//! services/api/src/adapters/claude.rs
//!
//! This module contains the adapter for the Anthropic Messages API.
//! It implements the `CompletionService` port from the `core` crate.

use async_trait::async_trait;
use docchat_core::assembler::{CompletionRequest, ContentBlock, MessageContent, RequestMessage};
use docchat_core::completion::{CompletionError, MAX_OUTPUT_TOKENS, TEMPERATURE};
use docchat_core::ports::CompletionService;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

const ANTHROPIC_VERSION: &str = "2023-06-01";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `CompletionService` using Claude.
#[derive(Clone)]
pub struct ClaudeAdapter {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    default_model: String,
}

impl ClaudeAdapter {
    /// Creates a new `ClaudeAdapter`. A missing key is not an error until the
    /// first completion is attempted.
    pub fn new(
        client: reqwest::Client,
        api_key: Option<String>,
        base_url: impl Into<String>,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_model: default_model.into(),
        }
    }

    fn request_body(&self, request: &CompletionRequest) -> Value {
        let model = request.model.as_deref().unwrap_or(&self.default_model);
        json!({
            "model": model,
            "max_tokens": MAX_OUTPUT_TOKENS,
            "temperature": TEMPERATURE,
            "system": request.system,
            "messages": request.messages.iter().map(message_json).collect::<Vec<_>>(),
        })
    }
}

fn message_json(message: &RequestMessage) -> Value {
    let content = match &message.content {
        MessageContent::Text(text) => Value::String(text.clone()),
        MessageContent::Blocks(blocks) => Value::Array(blocks.iter().map(block_json).collect()),
    };
    json!({ "role": message.role.as_str(), "content": content })
}

fn block_json(block: &ContentBlock) -> Value {
    match block {
        ContentBlock::Document { media_type, data } => json!({
            "type": "document",
            "source": { "type": "base64", "media_type": media_type, "data": data },
        }),
        ContentBlock::Text(text) => json!({ "type": "text", "text": text }),
    }
}

//=========================================================================================
// Response Structs
//=========================================================================================

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

/// Joins the text blocks of a reply in order, skipping everything else.
fn reply_text(blocks: Vec<ResponseBlock>) -> String {
    blocks
        .into_iter()
        .filter(|block| block.block_type == "text")
        .filter_map(|block| block.text)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Turns an error response into taxonomy input: `"<type words> <message>"`,
/// e.g. `rate_limit_error` becomes `rate limit error`.
fn describe_error_body(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => format!(
            "{} {}",
            envelope.error.error_type.replace('_', " "),
            envelope.error.message
        ),
        Err(_) => format!("Claude API Error: {} {}", status, body),
    }
}

fn transport_error(err: reqwest::Error) -> CompletionError {
    if err.is_timeout() {
        CompletionError::Timeout
    } else if err.is_connect() || err.is_request() {
        CompletionError::Network
    } else {
        CompletionError::classify(&err.to_string())
    }
}

//=========================================================================================
// `CompletionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl CompletionService for ClaudeAdapter {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            error!("CLAUDE_API_KEY not found in environment variables");
            CompletionError::Configuration
        })?;

        let body = self.request_body(request);
        info!(
            model = %body["model"].as_str().unwrap_or_default(),
            messages = request.messages.len(),
            "Sending messages to Claude"
        );

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;

        match status.as_u16() {
            401 => {
                error!(status = %status, "Claude API rejected the credential");
                return Err(CompletionError::Configuration);
            }
            429 => return Err(CompletionError::RateLimit),
            _ => {}
        }
        if !status.is_success() {
            let description = describe_error_body(status, &text);
            error!(status = %status, "Claude API call failed: {}", description);
            return Err(CompletionError::classify(&description));
        }

        let parsed: MessagesResponse = serde_json::from_str(&text)
            .map_err(|e| CompletionError::Unknown(format!("Failed to parse Claude response: {}", e)))?;
        if let Some(usage) = &parsed.usage {
            info!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "Claude API usage"
            );
        }
        Ok(reply_text(parsed.content))
    }
}
