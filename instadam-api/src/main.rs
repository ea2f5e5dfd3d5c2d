use instadam_api::config::Config;
use instadam_api::db;
use instadam_api::routes;
use instadam_api::storage::ImageStore;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "instadam-api", about = "InstaDam image annotation API server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run migrations and start the HTTP server (default)
    Serve,
    /// Run migrations and seed the default admin user
    #[command(name = "init-db")]
    InitDb,
    /// Truncate every application table
    #[command(name = "clear-tables")]
    ClearTables,
    /// Drop every application table and the migration history
    #[command(name = "clear-db")]
    ClearDb,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let cfg = Config::from_env();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(cfg).await,
        Commands::InitDb => {
            let pool = db::connect(&cfg).await?;
            db::migrate(&pool).await?;
            if !db::seed_admin(&pool, &cfg.admin_password).await? {
                tracing::info!("Users already present, default admin not created");
            }
            Ok(())
        }
        Commands::ClearTables => {
            let pool = db::connect(&cfg).await?;
            db::clear_tables(&pool).await
        }
        Commands::ClearDb => {
            let pool = db::connect(&cfg).await?;
            db::drop_all(&pool).await
        }
    }
}

async fn serve(cfg: Config) -> Result<()> {
    let pool = db::connect(&cfg).await?;
    db::migrate(&pool).await?;
    db::seed_admin(&pool, &cfg.admin_password).await?;

    tokio::fs::create_dir_all(&cfg.storage_dir).await?;

    let app_state = routes::AppState {
        db: pool,
        jwt_secret: cfg.jwt_secret.clone(),
        jwt_expiry_hours: cfg.jwt_expiry_hours,
        store: ImageStore::new(&cfg.storage_dir, &cfg.storage_url),
        max_upload_bytes: cfg.max_upload_mb * 1024 * 1024,
    };

    let app = routes::app(app_state);

    let addr = format!("{}:{}", cfg.listen_host, cfg.listen_port);
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
