use sqlx::SqlitePool;
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::handlers::jwt::JwtService;
use crate::middleware::metrics::ApiMetrics;
use crate::scrape_job::ScrapeJobController;

// Everything handlers share; cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtService>,
    pub catalog: Arc<Catalog>,
    pub scrape: ScrapeJobController,
    pub metrics: Arc<ApiMetrics>,
}

impl AppState {
    pub fn new(
        pool: SqlitePool,
        jwt: JwtService,
        catalog: Catalog,
        scrape: ScrapeJobController,
    ) -> Self {
        AppState {
            pool,
            jwt: Arc::new(jwt),
            catalog: Arc::new(catalog),
            scrape,
            metrics: Arc::new(ApiMetrics::default()),
        }
    }
}
