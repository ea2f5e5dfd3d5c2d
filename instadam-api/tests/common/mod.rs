#![allow(dead_code)]

use std::io::Cursor;

use axum::{body::Body, http::Request, Router};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tempfile::TempDir;
use tower::ServiceExt;

use instadam_api::auth;
use instadam_api::db;
use instadam_api::routes::{self, AppState};
use instadam_api::storage::ImageStore;

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "AdminPassword0";
pub const USER_PASSWORD: &str = "UserPassword1";
pub const STORAGE_URL: &str = "static";

const BOUNDARY: &str = "instadam-test-boundary";

pub struct TestApp {
    pub router: Router,
    pub pool: PgPool,
    pub storage: TempDir,
}

/// Connect, migrate, wipe every table, seed the default admin and build the
/// full router over a throwaway storage directory.
pub async fn setup() -> TestApp {
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for integration tests");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to test database");

    db::migrate(&pool).await.expect("Failed to run migrations");

    cleanup(&pool).await;

    db::seed_admin(&pool, ADMIN_PASSWORD)
        .await
        .expect("Failed to seed admin user");

    let storage = tempfile::tempdir().expect("Failed to create storage dir");

    let app_state = AppState {
        db: pool.clone(),
        jwt_secret: "test-jwt-secret".to_string(),
        jwt_expiry_hours: 24,
        store: ImageStore::new(storage.path(), STORAGE_URL),
        max_upload_bytes: 16 * 1024 * 1024,
    };

    TestApp {
        router: routes::app(app_state),
        pool,
        storage,
    }
}

pub async fn cleanup(pool: &PgPool) {
    db::clear_tables(pool).await.expect("Failed to truncate tables");
}

/// Insert a user directly and return its id.
pub async fn create_user(pool: &PgPool, username: &str, privileges: &str) -> i32 {
    let password_hash = auth::hash_password(USER_PASSWORD).expect("Failed to hash password");
    let row: (i32,) = sqlx::query_as(
        "INSERT INTO users (username, email, password_hash, privileges) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(username)
    .bind(format!("{username}@test.local"))
    .bind(&password_hash)
    .bind(privileges)
    .fetch_one(pool)
    .await
    .expect("Failed to seed user");
    row.0
}

pub async fn user_id(pool: &PgPool, username: &str) -> i32 {
    let row: (i32,) = sqlx::query_as("SELECT id FROM users WHERE username = $1")
        .bind(username)
        .fetch_one(pool)
        .await
        .expect("User should exist");
    row.0
}

/// Grant `access_type` on a project without going through the API.
pub async fn grant(pool: &PgPool, user_id: i32, project_id: i32, access_type: &str) {
    sqlx::query(
        r#"INSERT INTO project_permissions (user_id, project_id, access_type) VALUES ($1, $2, $3)
           ON CONFLICT (user_id, project_id) DO UPDATE SET access_type = EXCLUDED.access_type"#,
    )
    .bind(user_id)
    .bind(project_id)
    .bind(access_type)
    .execute(pool)
    .await
    .expect("Failed to grant permission");
}

/// Send a request without credentials and return (status, body_json)
pub async fn request(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (u16, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    send(router, builder, body).await
}

/// Send a request with a JWT Bearer token and return (status, body_json)
pub async fn request_with_token(
    router: &Router,
    method: &str,
    uri: &str,
    token: &str,
    body: Option<Value>,
) -> (u16, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json");
    send(router, builder, body).await
}

async fn send(
    router: &Router,
    builder: axum::http::request::Builder,
    body: Option<Value>,
) -> (u16, Value) {
    let body = match body {
        Some(json) => Body::from(serde_json::to_string(&json).unwrap()),
        None => Body::empty(),
    };
    let response = router.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    read_response(response).await
}

async fn read_response(response: axum::response::Response) -> (u16, Value) {
    let status = response.status().as_u16();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();

    let json: Value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    (status, json)
}

pub async fn login(router: &Router, username: &str, password: &str) -> String {
    let (status, json) = request(
        router,
        "POST",
        "/login",
        Some(json!({ "username": username, "password": password })),
    )
    .await;
    assert_eq!(status, 201, "Login for {username} should succeed: {json}");
    json["access_token"].as_str().unwrap().to_string()
}

pub async fn login_admin(router: &Router) -> String {
    login(router, ADMIN_USERNAME, ADMIN_PASSWORD).await
}

/// Seed a user with the shared test password and log them in.
pub async fn user_with_token(app: &TestApp, username: &str, privileges: &str) -> (i32, String) {
    let id = create_user(&app.pool, username, privileges).await;
    let token = login(&app.router, username, USER_PASSWORD).await;
    (id, token)
}

pub async fn create_project(router: &Router, token: &str, name: &str) -> i32 {
    let (status, json) = request_with_token(
        router,
        "POST",
        "/project",
        token,
        Some(json!({ "project_name": name })),
    )
    .await;
    assert_eq!(status, 201, "Project creation should succeed: {json}");
    json["project_id"].as_i64().unwrap() as i32
}

pub async fn create_label(router: &Router, token: &str, project_id: i32, text: &str) -> i32 {
    let (status, json) = request_with_token(
        router,
        "POST",
        &format!("/project/{project_id}/labels"),
        token,
        Some(json!({ "label_text": text, "label_color": "#00FF00" })),
    )
    .await;
    assert_eq!(status, 200, "Label creation should succeed: {json}");
    json["label_id"].as_i64().unwrap() as i32
}

/// POST a single-file multipart body.
pub async fn upload_file(
    router: &Router,
    uri: &str,
    token: &str,
    field: &str,
    file_name: &str,
    data: &[u8],
) -> (u16, Value) {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();

    let response = router.clone().oneshot(req).await.unwrap();
    read_response(response).await
}

/// Upload a generated PNG and return the new image's id.
pub async fn upload_png(app: &TestApp, token: &str, project_id: i32, w: u32, h: u32) -> i32 {
    let (status, json) = upload_file(
        &app.router,
        &format!("/image/upload/{project_id}"),
        token,
        "image",
        "sample.png",
        &png_bytes(w, h),
    )
    .await;
    assert_eq!(status, 200, "Upload should succeed: {json}");

    let row: (i32,) = sqlx::query_as("SELECT MAX(id) FROM images WHERE project_id = $1")
        .bind(project_id)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    row.0
}

pub fn png_bytes(w: u32, h: u32) -> Vec<u8> {
    let img = image::RgbaImage::new(w, h);
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    buf.into_inner()
}
