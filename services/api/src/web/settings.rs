//! services/api/src/web/settings.rs

use axum::{extract::State, Json};
use docchat_core::domain::{Settings, Store};
use docchat_core::ports::update_with;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::adapters::json_store::{parse_theme, theme_name};
use crate::error::ApiError;
use crate::web::state::AppState;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct SettingsDto {
    /// `light`, `dark` or `system`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
}

impl From<Settings> for SettingsDto {
    fn from(settings: Settings) -> Self {
        Self {
            theme: settings.theme.map(|t| theme_name(t).to_string()),
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/settings",
    responses((status = 200, description = "Current settings", body = SettingsDto))
)]
pub async fn get_settings(State(state): State<Arc<AppState>>) -> Json<SettingsDto> {
    Json(state.store.read().await.settings.into())
}

/// PUT /settings - Replace the settings object
#[utoipa::path(
    put,
    path = "/api/settings",
    request_body = SettingsDto,
    responses(
        (status = 200, description = "Settings replaced", body = SettingsDto),
        (status = 400, description = "Unknown theme")
    )
)]
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SettingsDto>,
) -> Result<Json<SettingsDto>, ApiError> {
    let theme = match req.theme.as_deref() {
        None => None,
        Some(name) => Some(
            parse_theme(name)
                .ok_or_else(|| ApiError::validation(format!("Unknown theme '{}'", name)))?,
        ),
    };

    let settings = update_with(state.store.as_ref(), move |store: &mut Store| {
        store.settings = Settings { theme };
        Ok(store.settings.clone())
    })
    .await?;

    Ok(Json(settings.into()))
}
