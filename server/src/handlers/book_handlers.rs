use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::catalog::{self, DEFAULT_TOP_RATED_LIMIT};
use crate::db;
use crate::error::{AppError, Result};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub title: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PriceRangeQuery {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct TopRatedQuery {
    pub limit: Option<usize>,
}

pub async fn home() -> &'static str {
    "Welcome to the books API."
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let database = if db::ping(&state.pool).await {
        "ok"
    } else {
        "unavailable"
    };

    Json(json!({
        "status": "Ok",
        "database": database,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Not Found",
            "message": "The requested route does not exist",
        })),
    )
}

pub async fn list_books(State(state): State<AppState>) -> Result<Json<Value>> {
    let books = state.catalog.books().await?;
    Ok(Json(json!(books.as_slice())))
}

pub async fn get_book(State(state): State<AppState>, Path(id): Path<u32>) -> Result<Json<Value>> {
    let books = state.catalog.books().await?;
    let book = catalog::find_by_id(&books, id)
        .ok_or_else(|| AppError::NotFound("Book not found".into()))?;
    Ok(Json(json!(book)))
}

pub async fn search_books(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Value>> {
    let books = state.catalog.books().await?;
    let results = catalog::search(&books, query.title.as_deref(), query.category.as_deref());
    Ok(Json(json!(results)))
}

pub async fn categories(State(state): State<AppState>) -> Result<Json<Value>> {
    let books = state.catalog.books().await?;
    let categories = catalog::categories(&books);
    Ok(Json(json!({
        "total": categories.len(),
        "categories": categories,
    })))
}

pub async fn top_rated(
    State(state): State<AppState>,
    Query(query): Query<TopRatedQuery>,
) -> Result<Json<Value>> {
    let books = state.catalog.books().await?;
    let limit = query.limit.unwrap_or(DEFAULT_TOP_RATED_LIMIT);
    Ok(Json(json!(catalog::top_rated(&books, limit))))
}

pub async fn price_range(
    State(state): State<AppState>,
    Query(query): Query<PriceRangeQuery>,
) -> Result<Json<Value>> {
    let books = state.catalog.books().await?;
    let results = catalog::price_range(&books, query.min, query.max)?;
    Ok(Json(json!(results)))
}

pub async fn stats_overview(State(state): State<AppState>) -> Result<Json<Value>> {
    let books = state.catalog.books().await?;
    Ok(Json(json!(catalog::overview(books.iter()))))
}

pub async fn stats_categories(State(state): State<AppState>) -> Result<Json<Value>> {
    let books = state.catalog.books().await?;
    Ok(Json(json!(catalog::category_stats(&books))))
}
