//! services/api/src/web/documents.rs
//!
//! CRUD endpoints for registered document links.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use docchat_core::domain::{Document, Store};
use docchat_core::ports::{update_with, PortError};
use docchat_core::resolver::{artifact_file_name, extract_file_reference};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    pub id: String,
    pub title: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Document> for DocumentResponse {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id,
            title: doc.title,
            url: doc.url,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateDocumentRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateDocumentRequest {
    pub title: Option<String>,
    pub url: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct DocumentIdQuery {
    pub id: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

fn validate_url(url: &str) -> Result<(), ApiError> {
    url::Url::parse(url)
        .map(|_| ())
        .map_err(|e| ApiError::validation(format!("Invalid document URL '{}': {}", url, e)))
}

fn required_id(query: DocumentIdQuery) -> Result<String, ApiError> {
    query
        .id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::validation("Document ID is required"))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /documents - List all documents
#[utoipa::path(
    get,
    path = "/api/documents",
    responses((status = 200, description = "All documents", body = [DocumentResponse]))
)]
pub async fn list_documents(State(state): State<Arc<AppState>>) -> Json<Vec<DocumentResponse>> {
    let store = state.store.read().await;
    Json(store.documents.into_iter().map(Into::into).collect())
}

/// POST /documents - Register a new document link
#[utoipa::path(
    post,
    path = "/api/documents",
    request_body = CreateDocumentRequest,
    responses(
        (status = 201, description = "Document created", body = DocumentResponse),
        (status = 400, description = "Missing title/url or malformed url"),
        (status = 409, description = "A document with this url already exists")
    )
)]
pub async fn create_document(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateDocumentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = req.title.trim().to_string();
    let url = req.url.trim().to_string();
    if title.is_empty() || url.is_empty() {
        return Err(ApiError::validation("Title and URL are required"));
    }
    validate_url(&url)?;

    let document = update_with(state.store.as_ref(), move |store: &mut Store| {
        if store.documents.iter().any(|doc| doc.url == url) {
            return Err(PortError::Conflict(
                "Document with this URL already exists".to_string(),
            ));
        }
        let now = Utc::now();
        let document = Document {
            id: Uuid::now_v7().to_string(),
            title,
            url,
            created_at: now,
            updated_at: now,
        };
        store.documents.push(document.clone());
        Ok(document)
    })
    .await?;

    info!(id = %document.id, "Document created");
    Ok((StatusCode::CREATED, Json(DocumentResponse::from(document))))
}

/// PUT /documents/{id} - Update a document's title and/or url
#[utoipa::path(
    put,
    path = "/api/documents/{id}",
    request_body = UpdateDocumentRequest,
    params(("id" = String, Path, description = "Document id")),
    responses(
        (status = 200, description = "Document updated", body = DocumentResponse),
        (status = 400, description = "Nothing to update"),
        (status = 404, description = "Document not found"),
        (status = 409, description = "Another document already uses this url")
    )
)]
pub async fn update_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateDocumentRequest>,
) -> Result<Json<DocumentResponse>, ApiError> {
    apply_update(&state, id, req).await
}

/// PUT /documents?id= - Same as the path form
#[utoipa::path(
    put,
    path = "/api/documents",
    request_body = UpdateDocumentRequest,
    params(DocumentIdQuery),
    responses((status = 200, description = "Document updated", body = DocumentResponse))
)]
pub async fn update_document_by_query(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DocumentIdQuery>,
    Json(req): Json<UpdateDocumentRequest>,
) -> Result<Json<DocumentResponse>, ApiError> {
    let id = required_id(query)?;
    apply_update(&state, id, req).await
}

async fn apply_update(
    state: &AppState,
    id: String,
    req: UpdateDocumentRequest,
) -> Result<Json<DocumentResponse>, ApiError> {
    let title = req.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
    let url = req.url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty());
    if title.is_none() && url.is_none() {
        return Err(ApiError::validation(
            "At least one field (title or url) must be provided for update",
        ));
    }
    if let Some(url) = &url {
        validate_url(url)?;
    }

    let updated = update_with(state.store.as_ref(), move |store: &mut Store| {
        if let Some(url) = &url {
            if store.documents.iter().any(|doc| &doc.url == url && doc.id != id) {
                return Err(PortError::Conflict(
                    "Another document with this URL already exists".to_string(),
                ));
            }
        }
        let doc = store
            .documents
            .iter_mut()
            .find(|doc| doc.id == id)
            .ok_or_else(|| PortError::NotFound("Document not found".to_string()))?;
        if let Some(title) = title {
            doc.title = title;
        }
        if let Some(url) = url {
            doc.url = url;
        }
        doc.updated_at = Utc::now();
        Ok(doc.clone())
    })
    .await?;

    Ok(Json(updated.into()))
}

/// DELETE /documents/{id} - Remove a document
#[utoipa::path(
    delete,
    path = "/api/documents/{id}",
    params(("id" = String, Path, description = "Document id")),
    responses(
        (status = 200, description = "Document deleted", body = MessageResponse),
        (status = 404, description = "Document not found")
    )
)]
pub async fn delete_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    apply_delete(&state, id).await
}

/// DELETE /documents?id= - Same as the path form
#[utoipa::path(
    delete,
    path = "/api/documents",
    params(DocumentIdQuery),
    responses((status = 200, description = "Document deleted", body = MessageResponse))
)]
pub async fn delete_document_by_query(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DocumentIdQuery>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = required_id(query)?;
    apply_delete(&state, id).await
}

async fn apply_delete(state: &AppState, id: String) -> Result<Json<MessageResponse>, ApiError> {
    let removed = update_with(state.store.as_ref(), move |store: &mut Store| {
        let position = store
            .documents
            .iter()
            .position(|doc| doc.id == id)
            .ok_or_else(|| PortError::NotFound("Document not found or already deleted".to_string()))?;
        Ok(store.documents.remove(position))
    })
    .await?;

    // The local copy has nothing left to back.
    if let Some(reference) = extract_file_reference(&removed.url) {
        if let Ok(path) = state.artifacts.resolve(&artifact_file_name(&reference)) {
            state.artifacts.delete(&path).await;
        }
    }

    info!(id = %removed.id, "Document deleted");
    Ok(Json(MessageResponse {
        message: "Document deleted successfully".to_string(),
    }))
}
