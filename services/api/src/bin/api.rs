//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{ClaudeAdapter, JsonFileStore, ScratchDir},
    config::Config,
    error::ApiError,
    web::{api_router, rest::ApiDoc, state::AppState},
};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Initialize Service Adapters ---
    let http_client = reqwest::Client::builder()
        .timeout(config.chat_budget)
        .build()
        .map_err(|e| ApiError::Internal(format!("Failed to build HTTP client: {}", e)))?;

    let store = Arc::new(JsonFileStore::new(config.database_path.clone()));
    info!(path = %config.database_path.display(), "Using JSON store");

    let artifacts = Arc::new(ScratchDir::new(config.temp_dir.clone(), http_client.clone()));

    if config.claude_api_key.is_none() {
        warn!("CLAUDE_API_KEY is not set; chat requests will fail until it is configured");
    }
    let completion = Arc::new(ClaudeAdapter::new(
        http_client,
        config.claude_api_key.clone(),
        config.claude_api_base_url.clone(),
        config.claude_model.clone(),
    ));

    // --- 3. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        store,
        artifacts,
        completion,
        config: config.clone(),
    });

    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS_ORIGIN '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 4. Create the Web Router ---
    let app = Router::new()
        .merge(api_router(app_state).layer(cors))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
