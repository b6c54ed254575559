//! services/api/src/web/middleware.rs
//!
//! Response middleware shared by every `/api` route.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::error::ErrorBody;
use crate::web::state::AppState;

/// Strips `details` from error bodies when the service runs in production.
///
/// Errors rendered by `ApiError` leave their body in the response extensions;
/// anything else passes through untouched.
pub async fn redact_error_details(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let mut response = next.run(req).await;
    if !state.config.production {
        return response;
    }

    match response.extensions_mut().remove::<ErrorBody>() {
        Some(body) => {
            let status = response.status();
            (status, Json(ErrorBody { details: None, ..body })).into_response()
        }
        None => response,
    }
}
