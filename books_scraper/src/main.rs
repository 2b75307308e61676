use books_scraper::{utils, BooksScraper, CatalogSnapshot};
use clap::Parser;
use dotenv::dotenv;
use std::{path::PathBuf, process::ExitCode};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Catalogue home page to start from
    #[arg(short, long, default_value = "https://books.toscrape.com/")]
    base_url: String,

    /// Where to write the scraped books (JSON)
    #[arg(short, long, default_value = "data/books.json")]
    output: PathBuf,

    /// Number of categories scraped concurrently
    #[arg(short, long, default_value_t = 5)]
    concurrent: usize,

    /// Maximum listing pages per category (all pages when omitted)
    #[arg(short, long)]
    max_pages: Option<usize>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,books_scraper=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    match run(&args).await {
        Ok(count) => {
            tracing::info!(books = count, output = %args.output.display(), "scrape finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "scrape failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> books_scraper::error::Result<usize> {
    let scraper = BooksScraper::new(&args.base_url, args.concurrent, args.max_pages)?;
    let books = scraper.scrape().await?;

    let snapshot = CatalogSnapshot::new(scraper.base_url().as_str(), books);
    utils::save_json(&snapshot, &args.output).await?;

    Ok(snapshot.len())
}
