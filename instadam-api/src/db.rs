use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::auth;
use crate::config::Config;

pub type Db = PgPool;

/// Application tables in dependency order (children first).
pub const TABLES: &[&str] = &[
    "message_receivers",
    "messages",
    "annotations",
    "labels",
    "images",
    "project_permissions",
    "projects",
    "revoked_tokens",
    "users",
];

pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@default.com";

pub async fn connect(cfg: &Config) -> anyhow::Result<Db> {
    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_max_conn)
        .connect(&cfg.database_url)
        .await?;
    tracing::info!("Connected to database");
    Ok(pool)
}

pub async fn migrate(pool: &Db) -> anyhow::Result<()> {
    sqlx::migrate::Migrator::new(std::path::Path::new("./migrations"))
        .await?
        .run(pool)
        .await?;
    tracing::info!("Migrations applied");
    Ok(())
}

/// Seed the default admin if the users table is empty. Returns whether a user was created.
pub async fn seed_admin(pool: &Db, password: &str) -> anyhow::Result<bool> {
    let user_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    if user_count.0 > 0 {
        return Ok(false);
    }

    let password_hash = auth::hash_password(password)?;
    sqlx::query(
        "INSERT INTO users (username, email, password_hash, privileges) VALUES ($1, $2, $3, 'admin')",
    )
    .bind(DEFAULT_ADMIN_USERNAME)
    .bind(DEFAULT_ADMIN_EMAIL)
    .bind(&password_hash)
    .execute(pool)
    .await?;
    tracing::info!("Seeded default admin user: {DEFAULT_ADMIN_USERNAME}");
    Ok(true)
}

pub async fn clear_tables(pool: &Db) -> anyhow::Result<()> {
    let sql = format!("TRUNCATE TABLE {} RESTART IDENTITY CASCADE", TABLES.join(", "));
    sqlx::query(&sql).execute(pool).await?;
    for table in TABLES {
        tracing::info!("Cleared table {table}");
    }
    Ok(())
}

pub async fn drop_all(pool: &Db) -> anyhow::Result<()> {
    for table in TABLES.iter().chain(std::iter::once(&"_sqlx_migrations")) {
        sqlx::query(&format!("DROP TABLE IF EXISTS {table} CASCADE"))
            .execute(pool)
            .await?;
        tracing::info!("Dropped table {table}");
    }
    Ok(())
}
