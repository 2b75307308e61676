pub mod analytics_handlers;
pub mod auth_handlers;
pub mod book_handlers;
pub mod jwt;
pub mod scraping_handlers;
