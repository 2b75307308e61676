use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use crate::handlers::scraping_handlers::{scraping_status, trigger_scraping};
use crate::middleware::auth_middleware::auth_middleware;
use crate::state::AppState;

pub fn scraping_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/trigger", post(trigger_scraping))
        .route("/status", get(scraping_status))
        .layer(from_fn_with_state(state, auth_middleware))
}
