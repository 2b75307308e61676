use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_cookies::Cookies;
use tracing::{debug, warn};

use crate::db;
use crate::error::AppError;
use crate::handlers::jwt::TokenKind;
use crate::models::user::AuthUser;
use crate::state::AppState;

pub const TOKEN_COOKIE: &str = "axtoken";

/// Token from `Authorization: Bearer ...`, falling back to the `axtoken` cookie.
pub fn extract_token(headers: &HeaderMap, cookies: Option<&Cookies>) -> Option<String> {
    let from_header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    from_header.or_else(|| {
        cookies
            .and_then(|c| c.get(TOKEN_COOKIE))
            .map(|c| c.value().to_string())
            .filter(|t| !t.is_empty())
    })
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = extract_token(req.headers(), req.extensions().get::<Cookies>());

    match authenticate(&state, token).await {
        Ok(user) => {
            debug!(user = %user.username, path = %req.uri().path(), "authenticated");
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(e) => {
            warn!(path = %req.uri().path(), error = %e, "rejected unauthenticated request");
            e.into_response()
        }
    }
}

async fn authenticate(state: &AppState, token: Option<String>) -> Result<AuthUser, AppError> {
    let token = token.ok_or_else(|| AppError::Unauthorized("Missing or invalid token".into()))?;

    let claims = state.jwt.verify(&token, TokenKind::Access)?;

    let user = db::find_user(&state.pool, &claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

    Ok(AuthUser {
        id: user.id,
        username: user.username,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn reads_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(extract_token(&headers, None).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn ignores_other_schemes() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic YWRtaW46cGFzc3dvcmQ="));
        assert!(extract_token(&headers, None).is_none());
    }

    #[test]
    fn missing_everything_yields_none() {
        assert!(extract_token(&HeaderMap::new(), None).is_none());
    }
}
