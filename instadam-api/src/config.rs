#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub listen_host: String,
    pub listen_port: u16,
    pub db_max_conn: u32,
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub storage_dir: String,
    pub storage_url: String,
    pub max_upload_mb: usize,
    pub admin_password: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://postgres@localhost/instadam".into()),
            listen_host: std::env::var("LISTEN_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            listen_port: std::env::var("LISTEN_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            db_max_conn: std::env::var("DB_MAX_CONN")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(10),
            jwt_secret: std::env::var("JWT_SECRET").unwrap_or_else(|_| {
                tracing::warn!("JWT_SECRET not set, using an insecure development secret");
                "instadam-dev-secret".into()
            }),
            // Two weeks
            jwt_expiry_hours: std::env::var("JWT_EXPIRY_HOURS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(336),
            storage_dir: std::env::var("STATIC_STORAGE_DIR")
                .unwrap_or_else(|_| "static-dir".into()),
            // Served under `/<storage_url>`, so it can never be empty.
            storage_url: std::env::var("STATIC_STORAGE_URL")
                .ok()
                .map(|u| u.trim_matches('/').to_string())
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| "static".into()),
            max_upload_mb: std::env::var("MAX_UPLOAD_MB")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(64),
            admin_password: std::env::var("ADMIN_PASSWORD")
                .unwrap_or_else(|_| "AdminPassword0".into()),
        }
    }
}
