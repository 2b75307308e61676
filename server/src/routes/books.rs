use axum::{middleware::from_fn_with_state, routing::get, Router};

use crate::handlers::book_handlers::{
    categories, get_book, list_books, price_range, search_books, stats_categories,
    stats_overview, top_rated,
};
use crate::middleware::auth_middleware::auth_middleware;
use crate::state::AppState;

/// Everything under `/books`, `/categories` and `/stats`. Token required.
pub fn book_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/books", get(list_books))
        .route("/books/search", get(search_books))
        .route("/books/top-rated", get(top_rated))
        .route("/books/price-range", get(price_range))
        .route("/books/{id}", get(get_book))
        .route("/categories", get(categories))
        .route("/stats/overview", get(stats_overview))
        .route("/stats/categories", get(stats_categories))
        .layer(from_fn_with_state(state, auth_middleware))
}
