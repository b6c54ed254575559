pub mod chat;
pub mod documents;
pub mod files;
pub mod middleware;
pub mod rest;
pub mod settings;
pub mod state;
pub mod users;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use state::AppState;

/// Request bodies carry whole documents in places, so the limit is generous.
pub const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Builds every `/api` route over the shared state. CORS and Swagger UI are
/// layered on by the binary.
pub fn api_router(state: Arc<AppState>) -> Router {
    let documents = Router::new()
        .route(
            "/documents",
            get(documents::list_documents)
                .post(documents::create_document)
                .put(documents::update_document_by_query)
                .delete(documents::delete_document_by_query),
        )
        .route(
            "/documents/{id}",
            put(documents::update_document).delete(documents::delete_document),
        );

    let files = Router::new()
        .route("/files/ensure-temp-dir", post(files::ensure_temp_dir))
        .route("/files/download-external", post(files::download_external))
        .route("/files/check", post(files::check_file))
        .route("/files/delete", post(files::delete_file));

    let chat = Router::new()
        .route("/chat", post(chat::chat))
        .route("/chat/reset", post(chat::reset_chat));

    let accounts = Router::new()
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/login", post(users::login))
        .route(
            "/settings",
            get(settings::get_settings).put(settings::update_settings),
        );

    let api = Router::new()
        .merge(documents)
        .merge(files)
        .merge(chat)
        .merge(accounts);

    Router::new()
        .nest("/api", api)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::redact_error_details,
        ))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
