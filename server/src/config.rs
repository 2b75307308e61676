use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::{env, path::PathBuf, time::Duration};
use uuid::Uuid;

use crate::scrape_task::ScrapeSettings;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub client_url: Option<String>,
    pub jwt_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub books_path: PathBuf,
    pub scrape_base_url: String,
    pub scrape_concurrency: usize,
    pub scrape_max_pages: Option<usize>,
    pub scrape_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                tracing::warn!("JWT_SECRET not set, tokens will not survive a restart");
                format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
            }
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://users.db".to_string()),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string()),
            client_url: env::var("CLIENT_URL").ok(),
            jwt_secret,
            access_token_ttl: Duration::from_secs(
                parse_var("ACCESS_TOKEN_TTL_MINUTES", 15u64)? * 60,
            ),
            refresh_token_ttl: Duration::from_secs(
                parse_var("REFRESH_TOKEN_TTL_DAYS", 30u64)? * 24 * 60 * 60,
            ),
            books_path: env::var("BOOKS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/books.json")),
            scrape_base_url: env::var("SCRAPE_BASE_URL")
                .unwrap_or_else(|_| "https://books.toscrape.com/".to_string()),
            scrape_concurrency: parse_var("SCRAPE_CONCURRENCY", 5usize)?,
            scrape_max_pages: env::var("SCRAPE_MAX_PAGES")
                .ok()
                .map(|v| v.parse())
                .transpose()
                .context("SCRAPE_MAX_PAGES must be a valid number")?,
            scrape_timeout: Duration::from_secs(parse_var("SCRAPE_TIMEOUT_SECS", 3600u64)?),
        })
    }

    pub fn scrape_settings(&self) -> ScrapeSettings {
        ScrapeSettings {
            base_url: self.scrape_base_url.clone(),
            output: self.books_path.clone(),
            concurrency: self.scrape_concurrency,
            max_pages: self.scrape_max_pages,
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("{name} must be a valid number")),
        Err(_) => Ok(default),
    }
}
