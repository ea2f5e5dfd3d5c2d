use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};

use crate::auth::{require_admin, CurrentUser};
use crate::errors::{is_unique_violation, AppError, MsgResponse};
use crate::models::{
    AccessType, CreateProject, CreateProjectResponse, Project, ProjectListEntry, ProjectMember,
    RevokePermissionRequest, UpdatePermissionRequest, User, UserSummary,
};
use crate::routes::access::{find_permission, require_write_access};
use crate::routes::{AppState, JsonBody};

const MAX_PROJECT_NAME_LEN: usize = 64;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/project", post(create))
        .route("/projects", get(list))
        .route("/project/{project_id}", delete(delete_project))
        .route("/project/{project_id}/users", get(list_users))
        .route(
            "/project/{project_id}/permissions",
            axum::routing::put(update_permission).delete(revoke_permission),
        )
}

#[utoipa::path(
    post, path = "/project",
    tag = "Projects",
    request_body = CreateProject,
    responses(
        (status = 201, body = CreateProjectResponse),
        (status = 400, body = MsgResponse),
        (status = 401, body = MsgResponse),
    ),
    security(("bearer" = []))
)]
pub async fn create(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    JsonBody(input): JsonBody<CreateProject>,
) -> Result<(StatusCode, Json<CreateProjectResponse>), AppError> {
    require_admin(&current)?;

    let name = input.project_name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("Project name must be specified."));
    }
    if name.chars().count() > MAX_PROJECT_NAME_LEN {
        return Err(AppError::bad_request(format!(
            "Project name must be at most {MAX_PROJECT_NAME_LEN} characters"
        )));
    }

    let mut tx = state.db.begin().await?;

    let project = sqlx::query_as::<_, Project>(
        "INSERT INTO projects (project_name, created_by) VALUES ($1, $2) RETURNING *",
    )
    .bind(name)
    .bind(current.id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e, "projects_project_name_key") {
            AppError::bad_request(format!("Project {name} already exists"))
        } else {
            AppError::from(e)
        }
    })?;

    sqlx::query("INSERT INTO project_permissions (user_id, project_id, access_type) VALUES ($1, $2, 'rw')")
        .bind(current.id)
        .bind(project.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!("{} created project {} ({})", current.username, project.project_name, project.id);

    Ok((
        StatusCode::CREATED,
        Json(CreateProjectResponse {
            project_id: project.id,
            created_by: project.created_by,
            created_at: project.created_at,
        }),
    ))
}

#[utoipa::path(
    get, path = "/projects",
    tag = "Projects",
    responses(
        (status = 200, body = Vec<ProjectListEntry>),
    ),
    security(("bearer" = []))
)]
pub async fn list(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Vec<ProjectListEntry>>, AppError> {
    let rows = sqlx::query_as::<_, ProjectListEntry>(
        r#"SELECT p.id, p.project_name AS name, p.created_at, (pp.access_type = 'rw') AS is_admin
           FROM projects p
           JOIN project_permissions pp ON pp.project_id = p.id
           WHERE pp.user_id = $1
           ORDER BY p.id"#,
    )
    .bind(current.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(rows))
}

#[utoipa::path(
    delete, path = "/project/{project_id}",
    tag = "Projects",
    params(("project_id" = i32, Path, description = "Project ID")),
    responses(
        (status = 200, body = MsgResponse),
        (status = 401, body = MsgResponse),
    ),
    security(("bearer" = []))
)]
pub async fn delete_project(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(project_id): Path<i32>,
) -> Result<Json<MsgResponse>, AppError> {
    require_write_access(&state.db, &current, project_id).await?;

    sqlx::query("DELETE FROM projects WHERE id = $1")
        .bind(project_id)
        .execute(&state.db)
        .await?;

    state.store.remove_project_dir(project_id).await?;

    tracing::info!("{} deleted project {project_id}", current.username);
    Ok(MsgResponse::new(format!("Project {project_id} deleted successfully")))
}

#[derive(sqlx::FromRow)]
struct MemberRow {
    access_type: String,
    username: String,
    email: String,
    created_at: DateTime<Utc>,
    privileges: String,
}

#[utoipa::path(
    get, path = "/project/{project_id}/users",
    tag = "Projects",
    params(("project_id" = i32, Path, description = "Project ID")),
    responses(
        (status = 200, body = Vec<ProjectMember>),
        (status = 401, body = MsgResponse),
    ),
    security(("bearer" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(project_id): Path<i32>,
) -> Result<Json<Vec<ProjectMember>>, AppError> {
    require_write_access(&state.db, &current, project_id).await?;

    let rows = sqlx::query_as::<_, MemberRow>(
        r#"SELECT pp.access_type, u.username, u.email, u.created_at, u.privileges
           FROM project_permissions pp
           JOIN users u ON u.id = pp.user_id
           WHERE pp.project_id = $1
           ORDER BY u.id"#,
    )
    .bind(project_id)
    .fetch_all(&state.db)
    .await?;

    let members = rows
        .into_iter()
        .map(|r| ProjectMember {
            access_type: r.access_type,
            user: UserSummary {
                username: r.username,
                email: r.email,
                created_at: r.created_at,
                privileges: r.privileges,
            },
        })
        .collect();

    Ok(Json(members))
}

async fn find_user_by_name(state: &AppState, username: &str) -> Result<User, AppError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::bad_request(format!("User {username} not found")))
}

#[utoipa::path(
    put, path = "/project/{project_id}/permissions",
    tag = "Projects",
    params(("project_id" = i32, Path, description = "Project ID")),
    request_body = UpdatePermissionRequest,
    responses(
        (status = 200, body = MsgResponse),
        (status = 400, body = MsgResponse),
        (status = 401, body = MsgResponse),
    ),
    security(("bearer" = []))
)]
pub async fn update_permission(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(project_id): Path<i32>,
    JsonBody(input): JsonBody<UpdatePermissionRequest>,
) -> Result<Json<MsgResponse>, AppError> {
    require_write_access(&state.db, &current, project_id).await?;

    let access = AccessType::parse(&input.access_type)
        .ok_or_else(|| AppError::bad_request("Not able to interpret access_type."))?;
    let user = find_user_by_name(&state, &input.username).await?;

    let msg = match find_permission(&state.db, user.id, project_id).await? {
        Some(existing) if existing.access() == Some(access) => "Permission already existed",
        Some(existing) => {
            sqlx::query("UPDATE project_permissions SET access_type = $1 WHERE id = $2")
                .bind(access.as_str())
                .bind(existing.id)
                .execute(&state.db)
                .await?;
            "Permission updated successfully"
        }
        None => {
            // A concurrent request may have added the row since the lookup.
            sqlx::query(
                r#"INSERT INTO project_permissions (user_id, project_id, access_type)
                   VALUES ($1, $2, $3)
                   ON CONFLICT (user_id, project_id) DO UPDATE
                   SET access_type = EXCLUDED.access_type"#,
            )
            .bind(user.id)
            .bind(project_id)
            .bind(access.as_str())
            .execute(&state.db)
            .await?;
            "Permission added successfully"
        }
    };

    tracing::info!(
        "{} set {} access on project {project_id} for {}",
        current.username,
        access.as_str(),
        user.username
    );
    Ok(MsgResponse::new(msg))
}

#[utoipa::path(
    delete, path = "/project/{project_id}/permissions",
    tag = "Projects",
    params(("project_id" = i32, Path, description = "Project ID")),
    request_body = RevokePermissionRequest,
    responses(
        (status = 200, body = MsgResponse),
        (status = 400, body = MsgResponse),
        (status = 401, body = MsgResponse),
    ),
    security(("bearer" = []))
)]
pub async fn revoke_permission(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(project_id): Path<i32>,
    JsonBody(input): JsonBody<RevokePermissionRequest>,
) -> Result<Json<MsgResponse>, AppError> {
    require_write_access(&state.db, &current, project_id).await?;

    let user = find_user_by_name(&state, &input.username).await?;
    if user.id == current.id {
        return Err(AppError::bad_request("Cannot revoke your own permission"));
    }

    let result = sqlx::query("DELETE FROM project_permissions WHERE user_id = $1 AND project_id = $2")
        .bind(user.id)
        .bind(project_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::bad_request(format!(
            "User {} has no permission on this project",
            user.username
        )));
    }

    tracing::info!("{} revoked access to project {project_id} for {}", current.username, user.username);
    Ok(MsgResponse::new("Permission revoked successfully"))
}
