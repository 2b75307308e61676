use axum::{middleware::from_fn_with_state, routing::{get, post}, Router};

use crate::handlers::auth_handlers::{login, logout, me, refresh};
use crate::middleware::auth_middleware::auth_middleware;
use crate::state::AppState;

pub fn auth_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/me", get(me))
        .layer(from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .merge(protected)
}
