//! services/api/src/web/users.rs
//!
//! User listing, account creation and login against the stored credentials.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use docchat_core::domain::{PublicUser, Store, User};
use docchat_core::ports::{update_with, PortError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::password::{hash_password, verify_password};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
    pub full_name: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub password: String,
}

/// A user as exposed over the API. Never carries the password.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub login: String,
    pub is_admin: bool,
    pub email: String,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        let user = PublicUser::from(user);
        Self {
            id: user.id,
            login: user.login,
            is_admin: user.is_admin,
            email: user.email,
            full_name: user.full_name,
            created_at: user.created_at,
            last_login: user.last_login,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub message: String,
    pub user: UserResponse,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /users - List users without their passwords
#[utoipa::path(
    get,
    path = "/api/users",
    responses((status = 200, description = "All users", body = [UserResponse]))
)]
pub async fn list_users(State(state): State<Arc<AppState>>) -> Json<Vec<UserResponse>> {
    let store = state.store.read().await;
    Json(store.users.into_iter().map(Into::into).collect())
}

/// POST /users - Create a new account
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Login, password or email missing"),
        (status = 409, description = "Login or email already taken")
    )
)]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let login = req.login.trim().to_string();
    let email = req.email.trim().to_string();
    if login.is_empty() || req.password.is_empty() || email.is_empty() {
        return Err(ApiError::validation("Login, password, and email are required"));
    }

    // 1. Hash the password
    let password = hash_password(&req.password)?;

    // 2. Insert unless the login or email is taken
    let now = Utc::now();
    let user = User {
        id: Uuid::now_v7().to_string(),
        login,
        password,
        is_admin: req.is_admin,
        email,
        full_name: req.full_name.unwrap_or_default(),
        created_at: now,
        last_login: now,
    };
    let created = update_with(state.store.as_ref(), move |store: &mut Store| {
        if store
            .users
            .iter()
            .any(|u| u.login == user.login || u.email == user.email)
        {
            return Err(PortError::Conflict(
                "User with this login or email already exists".to_string(),
            ));
        }
        store.users.push(user.clone());
        Ok(user)
    })
    .await?;

    info!(login = %created.login, "User created");
    Ok((StatusCode::CREATED, Json(UserResponse::from(created))))
}

/// POST /users/login - Check credentials and record the login time
#[utoipa::path(
    post,
    path = "/api/users/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Login or password missing"),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if req.login.is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("Login and password are required"));
    }

    // 1. Verify against the stored credential
    let store = state.store.read().await;
    let verified = store
        .find_user_by_login(&req.login)
        .is_some_and(|user| verify_password(&req.password, &user.password));
    if !verified {
        warn!(login = %req.login, "Rejected login attempt");
        return Err(PortError::Unauthorized.into());
    }

    // 2. Record the login
    let login = req.login.clone();
    let user = update_with(state.store.as_ref(), move |store: &mut Store| {
        let user = store
            .users
            .iter_mut()
            .find(|u| u.login == login)
            .ok_or(PortError::Unauthorized)?;
        user.last_login = Utc::now();
        Ok(user.clone())
    })
    .await?;

    Ok(Json(LoginResponse {
        message: "Login successful".to_string(),
        user: user.into(),
    }))
}
