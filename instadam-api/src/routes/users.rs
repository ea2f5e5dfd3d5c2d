use axum::{
    extract::{Query, State},
    routing::{get, put},
    Extension, Json, Router,
};

use crate::auth::{hash_password, require_admin, verify_password, CurrentUser};
use crate::errors::{is_unique_violation, AppError, MsgResponse};
use crate::models::{
    ChangePrivilegeRequest, Privilege, UpdateProfileRequest, User, UserResponse, UserSearchQuery,
    UserSearchResponse, UserSummary,
};
use crate::routes::{AppState, JsonBody};
use crate::validation::{validate_email, validate_password, validate_username};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/search", get(search))
        .route("/user/privilege/", put(change_privilege))
        .route("/user/", get(me).put(update_profile))
}

#[utoipa::path(
    get, path = "/users/search",
    tag = "Users",
    params(UserSearchQuery),
    responses(
        (status = 200, body = UserSearchResponse),
        (status = 400, body = MsgResponse),
        (status = 401, body = MsgResponse),
    ),
    security(("bearer" = []))
)]
pub async fn search(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(q): Query<UserSearchQuery>,
) -> Result<Json<UserSearchResponse>, AppError> {
    require_admin(&current)?;

    let needle = q
        .q
        .ok_or_else(|| AppError::bad_request("Missing query parameter q"))?;

    let rows = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE username ILIKE '%' || $1 || '%' OR email ILIKE '%' || $1 || '%' ORDER BY id",
    )
    .bind(&needle)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(UserSearchResponse {
        users: rows.into_iter().map(UserSummary::from).collect(),
    }))
}

#[utoipa::path(
    put, path = "/user/privilege/",
    tag = "Users",
    request_body = ChangePrivilegeRequest,
    responses(
        (status = 200, body = MsgResponse),
        (status = 400, body = MsgResponse),
        (status = 401, body = MsgResponse),
    ),
    security(("bearer" = []))
)]
pub async fn change_privilege(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    JsonBody(input): JsonBody<ChangePrivilegeRequest>,
) -> Result<Json<MsgResponse>, AppError> {
    require_admin(&current)?;

    let privilege = Privilege::parse(&input.privilege)
        .ok_or_else(|| AppError::bad_request(format!("Invalid privilege {}", input.privilege)))?;

    let result = sqlx::query("UPDATE users SET privileges = $1, updated_at = now() WHERE username = $2")
        .bind(privilege.as_str())
        .bind(&input.username)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::bad_request(format!("User {} not found", input.username)));
    }

    tracing::info!(
        "{} set privilege of {} to {}",
        current.username,
        input.username,
        privilege.as_str()
    );
    Ok(MsgResponse::new(format!(
        "Privilege updated to {} successfully",
        privilege.as_str()
    )))
}

#[utoipa::path(
    get, path = "/user/",
    tag = "Users",
    responses(
        (status = 200, body = UserResponse),
        (status = 401, body = MsgResponse),
    ),
    security(("bearer" = []))
)]
pub async fn me(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<UserResponse>, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(current.id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::unauthorized("User not found"))?;

    Ok(Json(user.into()))
}

#[utoipa::path(
    put, path = "/user/",
    tag = "Users",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, body = MsgResponse),
        (status = 400, body = MsgResponse),
        (status = 401, description = "Wrong current password", body = MsgResponse),
    ),
    security(("bearer" = []))
)]
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    JsonBody(input): JsonBody<UpdateProfileRequest>,
) -> Result<Json<MsgResponse>, AppError> {
    let existing = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(current.id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::unauthorized("User not found"))?;

    if !verify_password(&input.current_password, &existing.password_hash)? {
        return Err(AppError::unauthorized("Current password is incorrect"));
    }

    if let Some(ref username) = input.username {
        validate_username(username)?;
    }
    if let Some(ref email) = input.email {
        validate_email(email)?;
    }
    let password_hash = match input.password {
        Some(ref p) => {
            validate_password(p)?;
            hash_password(p)?
        }
        None => existing.password_hash,
    };

    let updated = sqlx::query_as::<_, User>(
        r#"UPDATE users SET username = $2, email = $3, password_hash = $4, updated_at = now()
           WHERE id = $1
           RETURNING *"#,
    )
    .bind(current.id)
    .bind(input.username.as_deref().unwrap_or(&existing.username))
    .bind(input.email.as_deref().unwrap_or(&existing.email))
    .bind(&password_hash)
    .fetch_one(&state.db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e, "users_username_key") {
            AppError::bad_request("Username already taken")
        } else if is_unique_violation(&e, "users_email_key") {
            AppError::bad_request("Email already taken")
        } else {
            AppError::from(e)
        }
    })?;

    tracing::info!("User {} updated their profile", updated.username);
    Ok(MsgResponse::new("User info updated successfully"))
}
