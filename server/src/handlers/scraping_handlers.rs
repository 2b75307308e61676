use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use serde_json::json;

use crate::error::AppError;
use crate::models::user::AuthUser;
use crate::scrape_job::ScrapeStatus;
use crate::state::AppState;

/// POST /api/v1/scraping/trigger
pub async fn trigger_scraping(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state.scrape.trigger(&user.username).await;
    if !outcome.accepted {
        return Err(AppError::Conflict(
            "Scraping is already running, try again later".into(),
        ));
    }

    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "Scraping started",
            "status": outcome.status,
        })),
    ))
}

/// GET /api/v1/scraping/status
pub async fn scraping_status(State(state): State<AppState>) -> Json<ScrapeStatus> {
    Json(state.scrape.status().await)
}
