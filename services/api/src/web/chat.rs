//! services/api/src/web/chat.rs
//!
//! One chat turn per request. The client sends the whole history with every
//! turn; the handler rebuilds a `ChatSession` from it, makes sure the document
//! bytes are on hand, then asks the completion service for the next reply.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use docchat_core::assembler::{build_request, Attachment, ChatMode};
use docchat_core::completion::RequestBudget;
use docchat_core::domain::{ChatMessage, FileReference, Role};
use docchat_core::resolver::{artifact_file_name, build_download_url_with_base, extract_file_reference};
use docchat_core::session::{ChatSession, Effect, SessionEvent};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChatTurn {
    pub role: ChatRole,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<ChatTurn> for ChatMessage {
    fn from(turn: ChatTurn) -> Self {
        ChatMessage {
            role: match turn.role {
                ChatRole::User => Role::User,
                ChatRole::Assistant => Role::Assistant,
            },
            content: turn.content,
            timestamp: turn.timestamp,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    /// A file already in the scratch directory, as returned by download-external.
    #[serde(default, alias = "relativeDocumentPath")]
    pub document_path: Option<String>,
    #[serde(default)]
    pub document_ids: Vec<String>,
    #[serde(default)]
    pub chat_history: Vec<ChatTurn>,
    pub model: Option<String>,
    /// `inline` or `url`; falls back to the configured mode.
    pub mode: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ChatResponse {
    pub response: String,
}

/// Why the client is ending the current chat.
#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResetReason {
    /// "Clear chat": the same document stays selected.
    #[default]
    Reset,
    /// Another document was picked; needs `nextDocumentId`.
    Switch,
    /// The chat view went away.
    Close,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetChatRequest {
    pub document_id: Option<String>,
    #[serde(default, alias = "relativeDocumentPath")]
    pub document_path: Option<String>,
    #[serde(default)]
    pub reason: ResetReason,
    pub next_document_id: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ResetChatResponse {
    pub message: String,
    pub deleted: bool,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /chat - Answer one question about the selected document(s)
#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Assistant reply", body = ChatResponse),
        (status = 400, description = "Missing message or document"),
        (status = 404, description = "Document or local copy not found"),
        (status = 502, description = "Download or AI provider failure"),
        (status = 503, description = "AI provider not configured")
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let budget = RequestBudget::start(state.config.chat_budget);

    let question = req.message.trim().to_string();
    if question.is_empty() {
        return Err(ApiError::validation("Message is required"));
    }
    let document_path = non_blank(req.document_path);
    let document_ids: Vec<String> = req
        .document_ids
        .into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect();
    if document_path.is_none() && document_ids.is_empty() {
        return Err(ApiError::validation(
            "Document path or document IDs are required",
        ));
    }
    let mode = match req.mode.as_deref() {
        Some(mode) => mode.parse::<ChatMode>().map_err(ApiError::validation)?,
        None => state.config.chat_mode,
    };
    let history: Vec<ChatMessage> = req.chat_history.into_iter().map(Into::into).collect();

    info!(?mode, turns = history.len(), "Chat turn received");
    let turn = Turn {
        state: &state,
        budget: &budget,
        question,
        model: req.model,
    };
    let response = match mode {
        ChatMode::Inline => turn.inline(document_path, &document_ids, history).await?,
        ChatMode::UrlReference => turn.url_reference(&document_ids, history).await?,
    };

    info!(elapsed_ms = budget.elapsed().as_millis() as u64, "Chat turn answered");
    Ok(Json(ChatResponse { response }))
}

/// POST /chat/reset - Drop the local copy backing a chat session
#[utoipa::path(
    post,
    path = "/api/chat/reset",
    request_body = ResetChatRequest,
    responses(
        (status = 200, description = "Session reset", body = ResetChatResponse),
        (status = 400, description = "Neither documentId nor documentPath given"),
        (status = 404, description = "Document not found")
    )
)]
pub async fn reset_chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetChatRequest>,
) -> Result<Json<ResetChatResponse>, ApiError> {
    let event = match req.reason {
        ResetReason::Reset => SessionEvent::Reset,
        ResetReason::Close => SessionEvent::Close,
        ResetReason::Switch => SessionEvent::SelectDocument(
            non_blank(req.next_document_id)
                .ok_or_else(|| ApiError::validation("nextDocumentId is required to switch"))?,
        ),
    };
    let (session_id, artifact) = match (non_blank(req.document_id), non_blank(req.document_path)) {
        (_, Some(relative)) => {
            let path = state.artifacts.resolve(&relative)?;
            (relative, Some(path))
        }
        (Some(id), None) => {
            let document = state
                .store
                .read()
                .await
                .find_document(&id)
                .cloned()
                .ok_or_else(|| ApiError::not_found("Document not found"))?;
            let path = match extract_file_reference(&document.url) {
                Some(reference) => Some(state.artifacts.resolve(&artifact_file_name(&reference))?),
                None => None,
            };
            (id, path)
        }
        (None, None) => {
            return Err(ApiError::validation("documentId or documentPath is required"));
        }
    };

    let cached = match artifact {
        Some(path) if state.artifacts.exists(&path).await => Some(path),
        _ => None,
    };
    let mut session = ChatSession::resume(session_id, Vec::new(), cached);
    let effects = session.apply(event)?;
    let deleted = !effects.is_empty();
    run_effects(&state, effects).await;
    info!(reason = ?req.reason, deleted, "Chat session ended");

    Ok(Json(ResetChatResponse {
        message: "Chat session reset".to_string(),
        deleted,
    }))
}

async fn run_effects(state: &AppState, effects: Vec<Effect>) {
    for effect in effects {
        match effect {
            Effect::DeleteArtifact(path) => state.artifacts.delete(&path).await,
        }
    }
}

//=========================================================================================
// Turn orchestration
//=========================================================================================

struct Turn<'a> {
    state: &'a AppState,
    budget: &'a RequestBudget,
    question: String,
    model: Option<String>,
}

impl Turn<'_> {
    async fn inline(
        self,
        document_path: Option<String>,
        document_ids: &[String],
        history: Vec<ChatMessage>,
    ) -> Result<String, ApiError> {
        if document_path.is_none() && document_ids.len() > 1 {
            return Err(ApiError::validation(
                "Inline mode takes exactly one document; use url mode for several",
            ));
        }
        let mut session = match (document_path, document_ids.first()) {
            (Some(relative), _) => {
                let path = self.state.artifacts.resolve(&relative)?;
                if !self.state.artifacts.exists(&path).await {
                    return Err(ApiError::not_found(format!(
                        "Document file not found: {}",
                        relative
                    )));
                }
                ChatSession::resume(relative, history, Some(path))
            }
            (None, Some(id)) => {
                let document = self
                    .state
                    .store
                    .read()
                    .await
                    .find_document(id)
                    .cloned()
                    .ok_or_else(|| ApiError::not_found("Document not found"))?;
                let reference = extract_file_reference(&document.url).ok_or_else(|| {
                    ApiError::validation(format!(
                        "Cannot extract a file id from '{}'",
                        document.url
                    ))
                })?;
                let path = self.state.artifacts.resolve(&artifact_file_name(&reference))?;
                let cached = self.state.artifacts.exists(&path).await.then_some(path);
                let mut session = ChatSession::resume(document.id, history, cached);
                self.ensure_artifact(&mut session, &reference).await?;
                session
            }
            (None, None) => {
                return Err(ApiError::validation(
                    "Document path or document IDs are required",
                ))
            }
        };

        let path: PathBuf = session
            .artifact()
            .path()
            .map(|p| p.to_path_buf())
            .ok_or_else(|| ApiError::Internal("document copy is not ready".to_string()))?;
        let data = self.state.artifacts.read_as_encoded_bytes(&path).await?;
        debug!(path = %path.display(), encoded_len = data.len(), "Document attached inline");

        self.send(&mut session, Attachment::Inline { data: &data }).await
    }

    async fn url_reference(
        self,
        document_ids: &[String],
        history: Vec<ChatMessage>,
    ) -> Result<String, ApiError> {
        if document_ids.is_empty() {
            return Err(ApiError::validation(
                "Document IDs are required in url mode",
            ));
        }
        let store = self.state.store.read().await;
        let documents = document_ids
            .iter()
            .map(|id| {
                store
                    .find_document(id)
                    .cloned()
                    .ok_or_else(|| ApiError::not_found(format!("Document not found: {}", id)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut session = ChatSession::resume(document_ids.join(","), history, None);
        self.send(&mut session, Attachment::References(&documents)).await
    }

    /// Downloads the document unless a copy is already on disk. A failed
    /// download leaves the session without a copy so the next turn retries.
    async fn ensure_artifact(
        &self,
        session: &mut ChatSession,
        reference: &FileReference,
    ) -> Result<(), ApiError> {
        if session.artifact().path().is_some() {
            debug!(file_id = %reference, "Reusing local document copy");
            return Ok(());
        }

        session.apply(SessionEvent::DownloadStarted)?;
        let url = build_download_url_with_base(&self.state.config.drive_download_base_url, reference);
        match self
            .state
            .artifacts
            .download(&url, &artifact_file_name(reference))
            .await
        {
            Ok(path) => {
                session.apply(SessionEvent::DownloadSucceeded(path))?;
                Ok(())
            }
            Err(e) => {
                session.apply(SessionEvent::DownloadFailed)?;
                warn!(file_id = %reference, "Document download failed: {}", e);
                Err(e.into())
            }
        }
    }

    async fn send(
        self,
        session: &mut ChatSession,
        attachment: Attachment<'_>,
    ) -> Result<String, ApiError> {
        session.apply(SessionEvent::SendStarted(self.question.clone()))?;

        let outcome = match self.budget.ensure_headroom() {
            Ok(()) => {
                let request =
                    build_request(attachment, &self.question, session.prior_turns(), self.model);
                self.state.completion.complete(&request).await
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(reply) => {
                session.apply(SessionEvent::ReplyReceived(reply.clone()))?;
                debug!(
                    document = session.document_id().unwrap_or_default(),
                    turns = session.history().len(),
                    "Reply recorded"
                );
                Ok(reply)
            }
            Err(e) => {
                session.apply(SessionEvent::SendFailed)?;
                warn!(kind = e.kind(), "Chat turn failed: {}", e);
                Err(e.into())
            }
        }
    }
}
