use std::path::PathBuf;

use async_trait::async_trait;
use books_scraper::{utils, BooksScraper, CatalogSnapshot, ScrapeError};
use tracing::info;

use crate::scrape_job::{ScrapeReport, ScraperTask};

#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    pub base_url: String,
    pub output: PathBuf,
    pub concurrency: usize,
    pub max_pages: Option<usize>,
}

/// Production scrape: crawl the catalogue and replace the books file.
pub struct BooksScraperTask {
    settings: ScrapeSettings,
}

impl BooksScraperTask {
    pub fn new(settings: ScrapeSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl ScraperTask for BooksScraperTask {
    async fn run(&self) -> Result<ScrapeReport, ScrapeError> {
        let settings = &self.settings;
        let scraper = BooksScraper::new(&settings.base_url, settings.concurrency, settings.max_pages)?;

        let books = scraper.scrape().await?;
        info!(books = books.len(), output = %settings.output.display(), "saving scraped books");

        let snapshot = CatalogSnapshot::new(scraper.base_url().as_str(), books);
        utils::save_json(&snapshot, &settings.output).await?;

        Ok(ScrapeReport {
            output: settings.output.clone(),
        })
    }
}
