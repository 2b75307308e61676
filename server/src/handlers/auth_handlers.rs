use axum::{
    extract::{Json, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Extension,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::jwt::TokenKind;
use crate::db;
use crate::error::AppError;
use crate::middleware::auth_middleware::{extract_token, TOKEN_COOKIE};
use crate::models::user::AuthUser;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LoginPayload {
    pub username: String,
    pub password: String,
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid credentials".into())
}

fn cookie_header(value: String) -> Result<HeaderValue, AppError> {
    value
        .parse()
        .map_err(|_| AppError::Internal("invalid cookie header".into()))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<Response, AppError> {
    let user = db::find_user(&state.pool, &payload.username)
        .await?
        .ok_or_else(invalid_credentials)?;

    let is_valid_password =
        bcrypt::verify(&payload.password, &user.password_hash).map_err(|_| invalid_credentials())?;
    if !is_valid_password {
        return Err(invalid_credentials());
    }

    let access_token = state.jwt.issue(&user.username, TokenKind::Access)?;
    let refresh_token = state.jwt.issue(&user.username, TokenKind::Refresh)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        cookie_header(format!(
            "{TOKEN_COOKIE}={access_token}; HttpOnly; Path=/; Max-Age={}",
            state.jwt.access_ttl().as_secs()
        ))?,
    );

    info!(user = %user.username, "login succeeded");

    let body = Json(json!({
        "access_token": access_token,
        "refresh_token": refresh_token,
        "token_type": "Bearer",
    }));

    Ok((headers, body).into_response())
}

/// Exchanges a refresh token (Bearer header) for a new access token.
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let token = extract_token(&headers, None)
        .ok_or_else(|| AppError::Unauthorized("Missing refresh token".into()))?;
    let claims = state.jwt.verify(&token, TokenKind::Refresh)?;

    let access_token = state.jwt.issue(&claims.sub, TokenKind::Access)?;
    Ok(Json(json!({ "access_token": access_token })))
}

pub async fn me(Extension(user): Extension<AuthUser>) -> Json<AuthUser> {
    Json(user)
}

pub async fn logout() -> Result<Response, AppError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        cookie_header(format!("{TOKEN_COOKIE}=; HttpOnly; Path=/; Max-Age=0"))?,
    );

    let body = Json(json!({
        "message": "logged out successfully"
    }));

    Ok((headers, body).into_response())
}
