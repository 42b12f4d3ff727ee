//! Identity Endpoints
//!
//! Registration and login are public; `/me` requires a bearer token.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;

use crate::{
    auth::AuthUser,
    error::ApiError,
    services::AuthResponse,
    types::User,
    AppState,
};

// ============ Request Types ============

/// 회원가입 요청
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    /// "seller" | "buyer"
    pub role: String,
}

/// 로그인 요청
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

// ============ Handlers ============

/// POST /api/register
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(req) = payload?;
    let session = state
        .identity
        .register(&req.email, &req.password, &req.name, &req.role)
        .await?;

    Ok(Json(session))
}

/// POST /api/login
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(req) = payload?;
    let session = state.identity.login(&req.email, &req.password).await?;
    Ok(Json(session))
}

/// GET /api/me
pub async fn me(State(state): State<AppState>, caller: AuthUser) -> Result<Json<User>, ApiError> {
    let user = state.identity.me(caller.user_id).await?;
    Ok(Json(user))
}
