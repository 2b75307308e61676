pub mod analytics;
pub mod auth;
pub mod books;
pub mod scraping;
