pub mod app;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod scrape_job;
pub mod scrape_task;
pub mod state;
