//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how it is
//! rendered at the HTTP boundary as `{error, details?}`.

use crate::config::ConfigError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use docchat_core::completion::CompletionError;
use docchat_core::ports::PortError;
use docchat_core::session::SessionError;
use serde::Serialize;
use tracing::error;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Port(PortError::Validation(message.into()))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::Port(PortError::NotFound(message.into()))
    }
}

impl From<CompletionError> for ApiError {
    fn from(err: CompletionError) -> Self {
        ApiError::Port(PortError::Completion(err))
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        ApiError::Port(err.into())
    }
}

/// Body of every error response. A copy rides along in the response
/// extensions so `web::middleware::redact_error_details` can re-render it.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, kind) = match &self {
            ApiError::Port(PortError::Validation(msg)) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            ApiError::Port(PortError::NotFound(msg)) => (StatusCode::NOT_FOUND, msg.clone(), None),
            ApiError::Port(PortError::Conflict(msg)) => (StatusCode::CONFLICT, msg.clone(), None),
            ApiError::Port(PortError::Unauthorized) => (
                StatusCode::UNAUTHORIZED,
                "Invalid login or password".to_string(),
                None,
            ),
            ApiError::Port(PortError::DownloadFailed(_)) => (
                StatusCode::BAD_GATEWAY,
                "Не удалось скачать документ".to_string(),
                None,
            ),
            ApiError::Port(PortError::Completion(err)) => {
                let status = match err {
                    CompletionError::Configuration => StatusCode::SERVICE_UNAVAILABLE,
                    _ => StatusCode::BAD_GATEWAY,
                };
                (status, err.user_message(), Some(err.kind()))
            }
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Произошла внутренняя ошибка сервера.".to_string(),
                None,
            ),
        };

        if status.is_server_error() {
            error!(status = %status, "Request failed: {}", self);
        }

        let body = ErrorBody {
            error: message,
            kind,
            details: Some(self.to_string()),
        };
        let mut response = (status, Json(body.clone())).into_response();
        response.extensions_mut().insert(body);
        response
    }
}
