//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification.

use utoipa::OpenApi;

use crate::web::{chat, documents, files, settings, users};

#[derive(OpenApi)]
#[openapi(
    paths(
        documents::list_documents,
        documents::create_document,
        documents::update_document,
        documents::update_document_by_query,
        documents::delete_document,
        documents::delete_document_by_query,
        files::ensure_temp_dir,
        files::download_external,
        files::check_file,
        files::delete_file,
        chat::chat,
        chat::reset_chat,
        users::list_users,
        users::create_user,
        users::login,
        settings::get_settings,
        settings::update_settings,
    ),
    components(
        schemas(
            documents::DocumentResponse,
            documents::CreateDocumentRequest,
            documents::UpdateDocumentRequest,
            documents::MessageResponse,
            files::EnsureDirResponse,
            files::DownloadRequest,
            files::DownloadResponse,
            files::FilePathRequest,
            files::CheckFileResponse,
            files::DeleteFileResponse,
            chat::ChatRole,
            chat::ChatTurn,
            chat::ChatRequest,
            chat::ChatResponse,
            chat::ResetReason,
            chat::ResetChatRequest,
            chat::ResetChatResponse,
            users::CreateUserRequest,
            users::LoginRequest,
            users::UserResponse,
            users::LoginResponse,
            settings::SettingsDto,
        )
    ),
    tags(
        (name = "Document Chat API", description = "Document registry, scratch files, accounts and chat over PDF documents.")
    )
)]
pub struct ApiDoc;
