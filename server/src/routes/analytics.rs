use axum::{middleware::from_fn_with_state, routing::get, Router};

use crate::handlers::analytics_handlers::analytics;
use crate::middleware::auth_middleware::auth_middleware;
use crate::state::AppState;

pub fn analytics_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/analytics", get(analytics))
        .layer(from_fn_with_state(state, auth_middleware))
}
