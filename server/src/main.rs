use std::sync::Arc;

use anyhow::Context;
use books_server::{
    app::build_router,
    catalog::Catalog,
    config::Config,
    db,
    handlers::jwt::JwtService,
    scrape_job::ScrapeJobController,
    scrape_task::BooksScraperTask,
    state::AppState,
};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,books_server=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = db::init_db(&config.database_url)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_url))?;

    let jwt = JwtService::new(
        &config.jwt_secret,
        config.access_token_ttl,
        config.refresh_token_ttl,
    );
    let catalog = Catalog::new(&config.books_path);
    let scrape = ScrapeJobController::with_max_run_duration(
        Arc::new(BooksScraperTask::new(config.scrape_settings())),
        config.scrape_timeout,
    );

    let state = AppState::new(pool, jwt, catalog, scrape);
    let app = build_router(state, config.client_url.as_deref());

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, books = %config.books_path.display(), "server listening");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
