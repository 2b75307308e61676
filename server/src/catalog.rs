//! Read side of the scraped books: a cached view of the scraper's output file
//! plus the queries behind the books and stats endpoints.

use std::{
    collections::{BTreeMap, BTreeSet},
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
    time::SystemTime,
};

use books_scraper::{utils, Book, ScrapeError};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{AppError, Result};

pub const DEFAULT_TOP_RATED_LIMIT: usize = 10;

/// File identity used to notice that a scrape replaced the output.
#[derive(Debug, Clone, Copy, PartialEq)]
struct FileStamp {
    modified: SystemTime,
    len: u64,
}

struct Cached {
    stamp: FileStamp,
    books: Arc<Vec<Book>>,
}

pub struct Catalog {
    path: PathBuf,
    cache: RwLock<Option<Cached>>,
}

impl Catalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current books, reloaded when the output file changed on disk.
    pub async fn books(&self) -> Result<Arc<Vec<Book>>> {
        let metadata = match tokio::fs::metadata(&self.path).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %self.path.display(), "books file not found, catalog is empty");
                return Ok(Arc::new(Vec::new()));
            }
            Err(e) => return Err(ScrapeError::from(e).into()),
        };
        let stamp = FileStamp {
            modified: metadata.modified().map_err(ScrapeError::from)?,
            len: metadata.len(),
        };

        if let Some(cached) = self.cache.read().await.as_ref() {
            if cached.stamp == stamp {
                return Ok(Arc::clone(&cached.books));
            }
        }

        let books = Arc::new(utils::load_books(&self.path).await?);
        debug!(books = books.len(), path = %self.path.display(), "catalog reloaded");

        *self.cache.write().await = Some(Cached {
            stamp,
            books: Arc::clone(&books),
        });
        Ok(books)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub total_books: usize,
    pub average_price: f64,
    pub rating_distribution: BTreeMap<u8, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStats {
    pub category: String,
    #[serde(flatten)]
    pub stats: Stats,
}

pub fn find_by_id(books: &[Book], id: u32) -> Option<&Book> {
    books.iter().find(|b| b.id == id)
}

/// Case-insensitive substring match on title and category; empty filters match everything.
pub fn search<'a>(books: &'a [Book], title: Option<&str>, category: Option<&str>) -> Vec<&'a Book> {
    let title = title.map(str::trim).filter(|t| !t.is_empty()).map(str::to_lowercase);
    let category = category
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_lowercase);

    books
        .iter()
        .filter(|b| {
            title
                .as_deref()
                .map_or(true, |t| b.title.to_lowercase().contains(t))
        })
        .filter(|b| {
            category
                .as_deref()
                .map_or(true, |c| b.category.to_lowercase().contains(c))
        })
        .collect()
}

pub fn categories(books: &[Book]) -> Vec<String> {
    books
        .iter()
        .map(|b| b.category.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Books priced within `[min, max]`. At least one bound is required.
pub fn price_range(books: &[Book], min: Option<f64>, max: Option<f64>) -> Result<Vec<&Book>> {
    if min.is_none() && max.is_none() {
        return Err(AppError::BadRequest(
            "at least one of 'min' or 'max' must be provided".into(),
        ));
    }
    if let (Some(lo), Some(hi)) = (min, max) {
        if lo > hi {
            return Err(AppError::BadRequest("'min' must not exceed 'max'".into()));
        }
    }

    Ok(books
        .iter()
        .filter(|b| min.map_or(true, |lo| b.price >= lo))
        .filter(|b| max.map_or(true, |hi| b.price <= hi))
        .collect())
}

/// Books carrying the highest rating present, ordered by title.
pub fn top_rated(books: &[Book], limit: usize) -> Vec<&Book> {
    let Some(best) = books.iter().map(|b| b.rating).max() else {
        return Vec::new();
    };

    let mut top: Vec<&Book> = books.iter().filter(|b| b.rating == best).collect();
    top.sort_by(|a, b| a.title.cmp(&b.title));
    top.truncate(limit);
    top
}

pub fn overview<'a>(books: impl IntoIterator<Item = &'a Book>) -> Stats {
    let mut total_books = 0;
    let mut price_sum = 0.0;
    let mut rating_distribution = BTreeMap::new();

    for book in books {
        total_books += 1;
        price_sum += book.price;
        *rating_distribution.entry(book.rating).or_insert(0) += 1;
    }

    let average_price = if total_books == 0 {
        0.0
    } else {
        (price_sum / total_books as f64 * 100.0).round() / 100.0
    };

    Stats {
        total_books,
        average_price,
        rating_distribution,
    }
}

pub fn category_stats(books: &[Book]) -> Vec<CategoryStats> {
    let mut by_category: BTreeMap<&str, Vec<&Book>> = BTreeMap::new();
    for book in books {
        by_category.entry(book.category.as_str()).or_default().push(book);
    }

    by_category
        .into_iter()
        .map(|(category, books)| CategoryStats {
            category: category.to_string(),
            stats: overview(books),
        })
        .collect()
}
