use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::get,
    Router,
};
use tower_cookies::CookieManagerLayer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::handlers::book_handlers::{health, home, not_found};
use crate::middleware::metrics::track_metrics;
use crate::routes::{
    analytics::analytics_routes, auth::auth_routes, books::book_routes,
    scraping::scraping_routes,
};
use crate::state::AppState;

/// Assembles the full API. `client_url` enables credentialed CORS for that origin.
pub fn build_router(state: AppState, client_url: Option<&str>) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .nest("/auth", auth_routes(state.clone()))
        .nest("/scraping", scraping_routes(state.clone()))
        .merge(book_routes(state.clone()))
        .merge(analytics_routes(state.clone()));

    let app = Router::new()
        .route("/", get(home))
        .nest("/api/v1", api)
        .fallback(not_found)
        .layer(from_fn_with_state(state.clone(), track_metrics))
        .layer(CookieManagerLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    match client_url.map(|url| url.parse::<HeaderValue>()) {
        Some(Ok(origin)) => app.layer(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([Method::POST, Method::GET, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::COOKIE, header::AUTHORIZATION])
                .allow_credentials(true),
        ),
        Some(Err(_)) => {
            warn!("CLIENT_URL is not a valid origin, CORS disabled");
            app
        }
        None => app,
    }
}
