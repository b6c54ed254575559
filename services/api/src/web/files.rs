//! services/api/src/web/files.rs
//!
//! Scratch-directory helpers: ensure it exists, pull a remote file into it,
//! check for a file and delete one.

use axum::{extract::State, Json};
use docchat_core::resolver::sanitize_file_name;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct EnsureDirResponse {
    pub message: String,
    pub path: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    #[serde(default)]
    pub file_url: String,
    #[serde(default)]
    pub file_name: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub message: String,
    /// `<scratch dir>/<file>`; pass it back as `documentPath` when chatting.
    pub file_path: String,
    pub absolute_path: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FilePathRequest {
    #[serde(default, alias = "filePath")]
    pub relative_file_path: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckFileResponse {
    pub exists: bool,
    pub file_path: String,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFileResponse {
    pub message: String,
    pub file_path: String,
}

fn scratch_relative(state: &AppState, file_name: &str) -> String {
    let dir = state
        .config
        .temp_dir
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("temp");
    format!("{}/{}", dir, file_name)
}

fn required_path(req: FilePathRequest) -> Result<String, ApiError> {
    let path = req.relative_file_path.trim().to_string();
    if path.is_empty() {
        return Err(ApiError::validation("relativeFilePath is required"));
    }
    Ok(path)
}

//=========================================================================================
// Handlers
//=========================================================================================

#[utoipa::path(
    post,
    path = "/api/files/ensure-temp-dir",
    responses((status = 200, description = "Scratch directory exists", body = EnsureDirResponse))
)]
pub async fn ensure_temp_dir(
    State(state): State<Arc<AppState>>,
) -> Result<Json<EnsureDirResponse>, ApiError> {
    let path = state.artifacts.ensure_scratch_dir().await?;
    Ok(Json(EnsureDirResponse {
        message: "Temp directory ensured".to_string(),
        path: path.display().to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/files/download-external",
    request_body = DownloadRequest,
    responses(
        (status = 200, description = "Document downloaded", body = DownloadResponse),
        (status = 400, description = "fileUrl or fileName missing"),
        (status = 502, description = "Remote fetch failed")
    )
)]
pub async fn download_external(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DownloadRequest>,
) -> Result<Json<DownloadResponse>, ApiError> {
    if req.file_url.trim().is_empty() || req.file_name.trim().is_empty() {
        return Err(ApiError::validation("fileUrl and fileName are required"));
    }
    let file_name = sanitize_file_name(req.file_name.trim());
    let local = state
        .artifacts
        .download(req.file_url.trim(), &file_name)
        .await?;
    info!(url = %req.file_url, file = %file_name, "External document stored");

    Ok(Json(DownloadResponse {
        message: "Document downloaded successfully".to_string(),
        file_path: scratch_relative(&state, &file_name),
        absolute_path: local.display().to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/files/check",
    request_body = FilePathRequest,
    responses((status = 200, description = "Existence report", body = CheckFileResponse))
)]
pub async fn check_file(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FilePathRequest>,
) -> Result<Json<CheckFileResponse>, ApiError> {
    let relative = required_path(req)?;
    let exists = match state.artifacts.resolve(&relative) {
        Ok(path) => state.artifacts.exists(&path).await,
        Err(_) => false,
    };
    let message = if exists {
        "File exists"
    } else {
        "File not found or not accessible"
    };
    Ok(Json(CheckFileResponse {
        exists,
        file_path: relative,
        message: message.to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/files/delete",
    request_body = FilePathRequest,
    responses((status = 200, description = "File removed or already absent", body = DeleteFileResponse))
)]
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FilePathRequest>,
) -> Result<Json<DeleteFileResponse>, ApiError> {
    let relative = required_path(req)?;
    let path = state.artifacts.resolve(&relative)?;
    let message = if state.artifacts.exists(&path).await {
        state.artifacts.delete(&path).await;
        "File deleted successfully"
    } else {
        "File not found or already deleted"
    };
    Ok(Json(DeleteFileResponse {
        message: message.to_string(),
        file_path: relative,
    }))
}
