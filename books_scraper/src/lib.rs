pub mod error;
pub mod scraper;
pub mod utils;

pub use error::ScrapeError;
pub use scraper::BooksScraper;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Book {
    pub id: u32,
    pub title: String,
    pub category: String,
    pub price: f64,
    pub rating: u8,
    pub in_stock: bool,
    pub product_url: String,
    pub image_url: Option<String>,
}

/// The document a scrape writes to disk: one catalogue crawl.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CatalogSnapshot {
    pub scraped_at: DateTime<Utc>,
    pub source: String,
    pub books: Vec<Book>,
}

impl CatalogSnapshot {
    pub fn new(source: impl Into<String>, books: Vec<Book>) -> Self {
        Self {
            scraped_at: Utc::now(),
            source: source.into(),
            books,
        }
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}

/// Coerces a display price such as `£51.77`, `Â£51.77` or `51,77` into a number.
pub fn parse_price(raw: &str) -> Option<f64> {
    let mut cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();

    if cleaned.contains(',') && !cleaned.contains('.') {
        cleaned = cleaned.replace(',', ".");
    } else if cleaned.contains(',') {
        cleaned = cleaned.replace(',', "");
    }

    cleaned.parse::<f64>().ok().filter(|p| p.is_finite())
}

/// Maps the `star-rating` class word to a 0..=5 score.
pub fn parse_rating(word: &str) -> u8 {
    match word.to_ascii_lowercase().as_str() {
        "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        _ => 0,
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
