use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, post},
    Extension, Json, Router,
};

use crate::auth::{create_token, hash_password, verify_password, CurrentUser};
use crate::errors::{is_unique_violation, AppError, MsgResponse};
use crate::models::{LoginRequest, RegisterRequest, TokenResponse, User};
use crate::routes::{AppState, JsonBody};
use crate::validation::{validate_email, validate_password, validate_username};

/// Public routes (no auth required)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
}

/// Protected routes (auth required)
pub fn protected_router() -> Router<AppState> {
    Router::new().route("/logout", delete(logout))
}

#[utoipa::path(
    post, path = "/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 201, body = TokenResponse),
        (status = 400, body = MsgResponse),
        (status = 401, body = MsgResponse),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<LoginRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
        .bind(&input.username)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::unauthorized("Invalid username or password"))?;

    if !verify_password(&input.password, &user.password_hash)? {
        return Err(AppError::unauthorized("Invalid username or password"));
    }

    let access_token = create_token(&user, &state.jwt_secret, state.jwt_expiry_hours)?;
    tracing::info!("User {} logged in", user.username);

    Ok((StatusCode::CREATED, Json(TokenResponse { access_token })))
}

#[utoipa::path(
    post, path = "/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, body = TokenResponse),
        (status = 400, description = "Invalid username, email or password", body = MsgResponse),
        (status = 401, description = "Username or email already registered", body = MsgResponse),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), AppError> {
    validate_username(&input.username)?;
    validate_email(&input.email)?;
    validate_password(&input.password)?;

    let password_hash = hash_password(&input.password)?;

    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (username, email, password_hash) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(&input.username)
    .bind(&input.email)
    .bind(&password_hash)
    .fetch_one(&state.db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e, "users_username_key") || is_unique_violation(&e, "users_email_key") {
            AppError::unauthorized(format!("User {} already exists", input.username))
        } else {
            AppError::from(e)
        }
    })?;

    tracing::info!("Registered user {}", user.username);

    let access_token = create_token(&user, &state.jwt_secret, state.jwt_expiry_hours)?;
    Ok((StatusCode::CREATED, Json(TokenResponse { access_token })))
}

#[utoipa::path(
    delete, path = "/logout",
    tag = "Auth",
    responses(
        (status = 200, body = MsgResponse),
        (status = 401, body = MsgResponse),
    ),
    security(("bearer" = []))
)]
pub async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<MsgResponse>, AppError> {
    sqlx::query("INSERT INTO revoked_tokens (jti) VALUES ($1) ON CONFLICT (jti) DO NOTHING")
        .bind(&current.jti)
        .execute(&state.db)
        .await?;

    tracing::info!("User {} logged out", current.username);
    Ok(MsgResponse::new("Logged out"))
}
