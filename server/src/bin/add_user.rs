use anyhow::Context;
use books_server::db;
use clap::Parser;

/// Creates an API user in the users database.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long)]
    username: String,

    #[arg(short, long)]
    password: String,

    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://users.db")]
    database_url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .init();

    let args = Args::parse();

    let pool = db::init_db(&args.database_url)
        .await
        .with_context(|| format!("Failed to open database {}", args.database_url))?;

    let user = db::create_user(&pool, &args.username, &args.password)
        .await
        .context("Failed to create user")?;

    tracing::info!(id = user.id, username = %user.username, "user created");
    Ok(())
}
